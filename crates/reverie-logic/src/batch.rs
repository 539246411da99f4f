//! Fixed-size pool of simulator sessions plus image feature lookup.
//!
//! `EnvBatch` drives N independent sessions in lock-step: one reset triple,
//! one action and one state read per slot. Slots share nothing, so slot `i`
//! is never affected by slot `j`.

use std::collections::HashMap;

use crate::error::EnvError;
use crate::simulator::{Action, SimState, Simulator};

/// Per-view visual descriptors of one panorama, indexed by view index.
pub type ViewFeatures = Vec<Vec<f32>>;

/// Precomputed image features, keyed by location.
pub trait ImageFeatureStore {
    /// Features of all discretized views at (scan, viewpoint).
    fn image_feature(&self, scan: &str, viewpoint: &str) -> Result<ViewFeatures, EnvError>;
}

/// Image features held in memory under `"{scan}_{viewpoint}"`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeatureStore {
    features: HashMap<String, ViewFeatures>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scan: &str, viewpoint: &str, features: ViewFeatures) {
        self.features
            .insert(format!("{}_{}", scan, viewpoint), features);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl ImageFeatureStore for InMemoryFeatureStore {
    fn image_feature(&self, scan: &str, viewpoint: &str) -> Result<ViewFeatures, EnvError> {
        self.features
            .get(&format!("{}_{}", scan, viewpoint))
            .cloned()
            .ok_or_else(|| EnvError::FeatureMissing {
                scan: scan.to_string(),
                viewpoint: viewpoint.to_string(),
            })
    }
}

/// Where a session starts: scan, viewpoint and heading (elevation is 0).
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStart {
    pub scan: String,
    pub viewpoint: String,
    pub heading: f64,
}

/// A batch of simulator sessions with a shared feature store.
pub struct EnvBatch<S, F> {
    sims: Vec<S>,
    feat_db: F,
}

impl<S: Simulator, F: ImageFeatureStore> EnvBatch<S, F> {
    /// One session per slot; the batch size is `sims.len()`.
    pub fn new(sims: Vec<S>, feat_db: F) -> Self {
        Self { sims, feat_db }
    }

    pub fn batch_size(&self) -> usize {
        self.sims.len()
    }

    pub fn feature_store(&self) -> &F {
        &self.feat_db
    }

    fn check_len(&self, found: usize) -> Result<(), EnvError> {
        if found != self.sims.len() {
            return Err(EnvError::BatchSizeMismatch {
                expected: self.sims.len(),
                found,
            });
        }
        Ok(())
    }

    /// Reset every slot.
    pub fn new_episodes(&mut self, starts: &[EpisodeStart]) -> Result<(), EnvError> {
        self.check_len(starts.len())?;
        for (sim, start) in self.sims.iter_mut().zip(starts) {
            sim.new_episode(&start.scan, &start.viewpoint, start.heading, 0.0)?;
        }
        Ok(())
    }

    /// Current state of every slot with the image features of its location.
    pub fn get_states(&self) -> Result<Vec<(ViewFeatures, SimState)>, EnvError> {
        self.sims
            .iter()
            .map(|sim| {
                let state = sim.state()?;
                let feature = self
                    .feat_db
                    .image_feature(&state.scan_id, &state.viewpoint_id)?;
                Ok((feature, state))
            })
            .collect()
    }

    /// Apply one action per slot.
    pub fn make_actions(&mut self, actions: &[Action]) -> Result<(), EnvError> {
        self.check_len(actions.len())?;
        for (sim, action) in self.sims.iter_mut().zip(actions) {
            sim.make_action(action.index, action.heading, action.elevation)?;
        }
        Ok(())
    }
}
