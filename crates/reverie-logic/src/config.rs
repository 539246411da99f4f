//! Environment configuration.
//!
//! `EnvConfig` carries everything the batch controller needs besides its
//! data: batch size, angle encoding width, randomized start/end flags, the
//! shuffle seed and the simulated camera. All fields have defaults so a
//! partial JSON document is enough.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Simulated camera used to derive the horizontal field of view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Image width in pixels (default: 640).
    pub image_w: u32,
    /// Image height in pixels (default: 480).
    pub image_h: u32,
    /// Vertical field of view in degrees (default: 60).
    pub vfov_deg: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            image_w: 640,
            image_h: 480,
            vfov_deg: 60.0,
        }
    }
}

impl CameraConfig {
    /// Vertical field of view in radians.
    pub fn vfov(&self) -> f64 {
        self.vfov_deg.to_radians()
    }

    /// Horizontal field of view in radians, from the aspect ratio.
    pub fn hfov(&self) -> f64 {
        let aspect = self.image_w as f64 / self.image_h as f64;
        2.0 * ((self.vfov() / 2.0).tan() * aspect).atan()
    }
}

/// Batch controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvConfig {
    /// Number of parallel sessions (default: 64).
    pub batch_size: usize,
    /// Width of the angle encoding; a multiple of 4 (default: 4).
    pub angle_feat_size: usize,
    /// Cap on detected objects per observation (default: no cap).
    pub max_objects: Option<usize>,
    /// Seed for dataset shuffling and start/end sampling (default: 0).
    pub seed: u64,
    /// Resample the start viewpoint 3–6 hops from the goal.
    pub multi_startpoints: bool,
    /// Resample the goal among the object's visible viewpoints.
    pub multi_endpoints: bool,
    /// Split label used in log output.
    pub name: Option<String>,
    /// `(index, count)`: keep only the `index`-th of `count` contiguous slices.
    pub data_split: Option<(usize, usize)>,
    pub camera: CameraConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            angle_feat_size: 4,
            max_objects: None,
            seed: 0,
            multi_startpoints: false,
            multi_endpoints: false,
            name: None,
            data_split: None,
            camera: CameraConfig::default(),
        }
    }
}

impl EnvConfig {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate, returning all errors found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.batch_size == 0 {
            errors.push(ConfigError::ZeroBatchSize);
        }
        if self.angle_feat_size == 0 || self.angle_feat_size % 4 != 0 {
            errors.push(ConfigError::InvalidAngleFeatSize(self.angle_feat_size));
        }
        if let Some((index, count)) = self.data_split {
            if count == 0 || index >= count {
                errors.push(ConfigError::InvalidSplit { index, count });
            }
        }
        if self.camera.image_w == 0
            || self.camera.image_h == 0
            || !(self.camera.vfov_deg > 0.0 && self.camera.vfov_deg < 180.0)
        {
            errors.push(ConfigError::InvalidCamera);
        }

        errors
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroBatchSize,
    /// Angle encoding width must be a positive multiple of 4.
    InvalidAngleFeatSize(usize),
    InvalidSplit { index: usize, count: usize },
    /// Zero-sized image or a field of view outside (0, 180) degrees.
    InvalidCamera,
}
