//! Error types for vehicle construction.

use thiserror::Error;

/// Errors raised while setting up a vehicle.
///
/// Stepping a vehicle never fails; only construction validates input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VehicleError {
    /// A tuning parameter violates its allowed range.
    #[error("invalid tuning `{field}` = {value}: {reason}")]
    InvalidTuning {
        /// Name of the offending field.
        field: &'static str,
        /// Value that was supplied.
        value: f32,
        /// What the field must satisfy.
        reason: &'static str,
    },
}

/// Result type for vehicle operations.
pub type Result<T> = std::result::Result<T, VehicleError>;
