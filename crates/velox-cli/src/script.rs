//! Drive scripts: a timed sequence of control segments.
//!
//! ```toml
//! [[segment]]
//! duration = 3.0
//! throttle = 1.0
//!
//! [[segment]]
//! duration = 1.5
//! throttle = 0.6
//! steer = 0.8
//!
//! [[segment]]
//! duration = 2.0
//! reset-to-checkpoint = 2
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use velox_vehicle::ControlUpdate;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriveScript {
    #[serde(rename = "segment", default)]
    pub segments: Vec<Segment>,
}

/// Controls held for `duration` seconds. Omitted controls keep the value
/// from the previous segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Segment {
    pub duration: f32,
    pub throttle: Option<f32>,
    pub brake: Option<f32>,
    pub steer: Option<f32>,
    pub handbrake: Option<f32>,
    /// Teleport to this checkpoint when the segment starts.
    pub reset_to_checkpoint: Option<usize>,
}

impl Segment {
    pub fn controls(&self) -> ControlUpdate {
        ControlUpdate {
            throttle: self.throttle,
            brake: self.brake,
            steer: self.steer,
            handbrake: self.handbrake,
        }
    }
}

impl Default for DriveScript {
    /// Ten seconds of full throttle.
    fn default() -> Self {
        Self {
            segments: vec![Segment {
                duration: 10.0,
                throttle: Some(1.0),
                brake: None,
                steer: None,
                handbrake: None,
                reset_to_checkpoint: None,
            }],
        }
    }
}

impl DriveScript {
    pub fn parse(text: &str) -> Result<Self> {
        let script: Self = toml::from_str(text)?;
        script.check()?;
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading drive script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in drive script {}", path.display()))
    }

    pub fn total_duration(&self) -> f32 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    fn check(&self) -> Result<()> {
        if self.segments.is_empty() {
            bail!("drive script has no segments");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if !(segment.duration.is_finite() && segment.duration >= 0.0) {
                bail!("segment {}: duration must be non-negative", i + 1);
            }
            let inputs = [
                ("throttle", segment.throttle, 0.0),
                ("brake", segment.brake, 0.0),
                ("handbrake", segment.handbrake, 0.0),
                ("steer", segment.steer, -1.0),
            ];
            for (name, value, min) in inputs {
                if let Some(v) = value {
                    if !(min..=1.0).contains(&v) {
                        bail!("segment {}: {} {} out of range [{}, 1]", i + 1, name, v, min);
                    }
                }
            }
        }
        Ok(())
    }
}
