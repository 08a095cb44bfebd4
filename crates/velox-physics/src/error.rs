//! Error types for the simulation layer.

use thiserror::Error;
use velox_vehicle::VehicleError;

/// Errors that can occur while building or driving a simulation.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// The loop was used before `init` installed a backend and vehicle.
    #[error("simulation has not been initialized")]
    NotInitialized,

    /// The backend has no chassis body to drive.
    #[error("backend has no chassis body")]
    MissingChassis,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Track geometry cannot be built.
    #[error("invalid track: {0}")]
    InvalidTrack(String),

    /// Vehicle tuning was rejected.
    #[error(transparent)]
    Vehicle(#[from] VehicleError),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
