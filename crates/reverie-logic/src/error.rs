//! Error type shared by every fallible environment operation.
//!
//! Variants fall into three groups: data-integrity faults (corrupt input or
//! caller misuse, treated as fatal by callers), lookup misses at the
//! collaborator boundary (never retried), and parse/IO failures while
//! loading annotation files.

use crate::config::ConfigError;

/// Errors that can occur while loading data, driving sessions or scoring.
#[derive(Debug)]
pub enum EnvError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// `unobstructed[from][to]` is set but `unobstructed[to][from]` is not.
    AsymmetricAdjacency {
        scan: String,
        from: String,
        to: String,
    },
    /// A connectivity node whose pose is not a 4x4 matrix.
    InvalidPose {
        scan: String,
        viewpoint: String,
        len: usize,
    },
    UnknownScan(String),
    UnknownViewpoint {
        scan: String,
        viewpoint: String,
    },
    /// The image feature store has no entry for this location.
    FeatureMissing {
        scan: String,
        viewpoint: String,
    },
    /// A feature array does not cover all discretized views.
    FeatureShape {
        expected: usize,
        found: usize,
    },
    /// The view sweep landed on an unexpected view index.
    ViewIndexMismatch {
        expected: usize,
        found: usize,
    },
    /// A move action referenced a navigable location that does not exist.
    InvalidAction {
        index: usize,
        available: usize,
    },
    /// `state()` or `make_action()` was called before `new_episode()`.
    NoEpisode,
    BatchSizeMismatch {
        expected: usize,
        found: usize,
    },
    /// A predicted trajectory does not start at the ground-truth start.
    UnanchoredTrajectory {
        expected: String,
        found: Option<String>,
    },
    /// No viewpoints are associated with the given `scan_objId` key.
    MissingGoalViewpoints(String),
    NoPath {
        scan: String,
        from: String,
        to: String,
    },
    UnknownInstruction(String),
    /// An episode or ground-truth path with no viewpoints.
    EmptyPath(String),
    /// A bounding box with non-positive width or height.
    DegenerateBox([f32; 4]),
    EmptyDataset,
    InvalidConfig(Vec<ConfigError>),
}

impl From<std::io::Error> for EnvError {
    fn from(e: std::io::Error) -> Self {
        EnvError::Io(e)
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(e: serde_json::Error) -> Self {
        EnvError::Json(e)
    }
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvError::Io(e) => write!(f, "IO error: {}", e),
            EnvError::Json(e) => write!(f, "JSON error: {}", e),
            EnvError::AsymmetricAdjacency { scan, from, to } => write!(
                f,
                "Graph should be undirected: {} sees {} -> {} but not the reverse",
                scan, from, to
            ),
            EnvError::InvalidPose {
                scan,
                viewpoint,
                len,
            } => write!(
                f,
                "Viewpoint {}/{} has a pose of {} values, expected 16",
                scan, viewpoint, len
            ),
            EnvError::UnknownScan(scan) => write!(f, "Unknown scan {}", scan),
            EnvError::UnknownViewpoint { scan, viewpoint } => {
                write!(f, "Unknown viewpoint {} in scan {}", viewpoint, scan)
            }
            EnvError::FeatureMissing { scan, viewpoint } => {
                write!(f, "No image feature for {}_{}", scan, viewpoint)
            }
            EnvError::FeatureShape { expected, found } => write!(
                f,
                "Feature array has {} views, expected {}",
                found, expected
            ),
            EnvError::ViewIndexMismatch { expected, found } => write!(
                f,
                "View sweep expected view index {}, simulator reports {}",
                expected, found
            ),
            EnvError::InvalidAction { index, available } => write!(
                f,
                "Action index {} out of range ({} navigable locations)",
                index, available
            ),
            EnvError::NoEpisode => write!(f, "Simulator has no active episode"),
            EnvError::BatchSizeMismatch { expected, found } => write!(
                f,
                "Batch size mismatch: expected {}, got {}",
                expected, found
            ),
            EnvError::UnanchoredTrajectory { expected, found } => write!(
                f,
                "Result trajectories should include the start position {} (found {:?})",
                expected, found
            ),
            EnvError::MissingGoalViewpoints(key) => {
                write!(f, "No goal viewpoints for object {}", key)
            }
            EnvError::NoPath { scan, from, to } => {
                write!(f, "No path in {} from {} to {}", scan, from, to)
            }
            EnvError::UnknownInstruction(id) => write!(f, "Unknown instruction id {}", id),
            EnvError::EmptyPath(id) => write!(f, "Instruction {} has an empty path", id),
            EnvError::DegenerateBox(b) => write!(
                f,
                "Degenerate bounding box [{}, {}, {}, {}]",
                b[0], b[1], b[2], b[3]
            ),
            EnvError::EmptyDataset => write!(f, "Instruction dataset is empty"),
            EnvError::InvalidConfig(errors) => {
                write!(f, "Invalid environment config: {:?}", errors)
            }
        }
    }
}

impl std::error::Error for EnvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnvError::Io(e) => Some(e),
            EnvError::Json(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_offending_viewpoints() {
        let err = EnvError::AsymmetricAdjacency {
            scan: "X".into(),
            from: "a".into(),
            to: "b".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("undirected"));
        assert!(msg.contains("a -> b"));
    }

    #[test]
    fn io_errors_convert_and_keep_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EnvError = io.into();
        assert!(matches!(err, EnvError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
