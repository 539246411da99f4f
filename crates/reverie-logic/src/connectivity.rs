//! Per-scene connectivity files.
//!
//! Each scan ships a `{scan}_connectivity.json` array with one record per
//! panorama: its id, a row-major 4x4 camera pose, whether it belongs to the
//! navigation graph, and an `unobstructed` row against every other record.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EnvError;

/// One record of a connectivity file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityNode {
    pub image_id: String,
    pub pose: Vec<f64>,
    pub included: bool,
    pub unobstructed: Vec<bool>,
}

impl ConnectivityNode {
    /// Translation column of the pose matrix.
    pub fn position(&self, scan: &str) -> Result<[f64; 3], EnvError> {
        if self.pose.len() != 16 {
            return Err(EnvError::InvalidPose {
                scan: scan.to_string(),
                viewpoint: self.image_id.clone(),
                len: self.pose.len(),
            });
        }
        Ok([self.pose[3], self.pose[7], self.pose[11]])
    }
}

/// Path of the connectivity file for `scan` under `dir`.
pub fn connectivity_path(dir: &Path, scan: &str) -> std::path::PathBuf {
    dir.join(format!("{}_connectivity.json", scan))
}

/// Parse a connectivity document.
pub fn parse_connectivity(json: &str) -> Result<Vec<ConnectivityNode>, EnvError> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse `{dir}/{scan}_connectivity.json`.
pub fn load_connectivity(dir: &Path, scan: &str) -> Result<Vec<ConnectivityNode>, EnvError> {
    let text = std::fs::read_to_string(connectivity_path(dir, scan))?;
    parse_connectivity(&text)
}
