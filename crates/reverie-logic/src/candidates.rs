//! Candidate view resolution with a write-once view cache.
//!
//! For a viewpoint, every navigable neighbour becomes one candidate. A
//! neighbour is usually visible from several of the 36 discretized views;
//! the view that sees it most head-on (smallest angular offset) is the one
//! whose visual feature represents it.
//!
//! The first visit to a (scan, viewpoint) sweeps a dedicated simulator
//! session through all 36 views and caches the orientation-independent
//! part of each candidate. Every call, hit or miss, then renders heading,
//! elevation and fused feature relative to the caller's current view.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::angles::{angle_feature, angular_distance, view_elevation, view_heading, VIEW_COUNT};
use crate::error::EnvError;
use crate::simulator::Simulator;

/// A navigable direction from the current viewpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub scan_id: String,
    /// Target viewpoint.
    pub viewpoint_id: String,
    /// Heading relative to the caller's current view centre.
    pub heading: f64,
    pub elevation: f64,
    /// Heading in the fixed frame of view 0's heading and the horizon.
    pub normalized_heading: f64,
    pub normalized_elevation: f64,
    /// View index whose visual feature represents this candidate.
    pub point_id: usize,
    /// Index into that view's navigable-location list (move action index).
    pub nav_index: usize,
    /// Angular offset from `point_id`'s centre.
    pub distance: f64,
    /// Visual feature of `point_id` followed by the angle encoding.
    pub feature: Vec<f32>,
    pub position: [f64; 3],
}

/// Orientation-independent part of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCandidate {
    pub scan_id: String,
    pub viewpoint_id: String,
    pub normalized_heading: f64,
    pub normalized_elevation: f64,
    pub point_id: usize,
    pub nav_index: usize,
    pub distance: f64,
    pub position: [f64; 3],
}

/// Candidates of one viewpoint, in first-sighting order.
pub type CachedView = Vec<CachedCandidate>;

/// Cache key for a location.
pub fn view_key(scan: &str, viewpoint: &str) -> String {
    format!("{}_{}", scan, viewpoint)
}

/// Process-lifetime store of resolved viewpoints. Entries are written once
/// and never evicted.
#[derive(Debug, Clone, Default)]
pub struct ViewCache {
    entries: HashMap<String, CachedView>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CachedView> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: String, value: CachedView) {
        self.entries.insert(key, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of cached viewpoints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds candidate lists, owning the sweep session and the cache.
pub struct CandidateResolver<S> {
    sim: S,
    cache: ViewCache,
    angle_feat_size: usize,
}

impl<S: Simulator> CandidateResolver<S> {
    /// `sim` is used only for view sweeps and never shared with a batch slot.
    pub fn new(sim: S, angle_feat_size: usize) -> Self {
        Self {
            sim,
            cache: ViewCache::new(),
            angle_feat_size,
        }
    }

    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    /// Candidates at (scan, viewpoint) relative to `view_index`.
    ///
    /// `features` must hold one visual descriptor per discretized view.
    pub fn resolve(
        &mut self,
        features: &[Vec<f32>],
        scan: &str,
        viewpoint: &str,
        view_index: usize,
    ) -> Result<Vec<CandidateEntry>, EnvError> {
        if features.len() < VIEW_COUNT {
            return Err(EnvError::FeatureShape {
                expected: VIEW_COUNT,
                found: features.len(),
            });
        }

        let key = view_key(scan, viewpoint);
        if !self.cache.contains(&key) {
            let view = self.sweep(scan, viewpoint)?;
            log::debug!("View cache miss for {}: {} candidates", key, view.len());
            self.cache.put(key.clone(), view);
        }

        match self.cache.get(&key) {
            Some(view) => Ok(render(view, features, view_index, self.angle_feat_size)),
            None => Ok(Vec::new()),
        }
    }

    /// Rotate through all 36 views and keep, per target viewpoint, the
    /// sighting with the smallest angular offset.
    fn sweep(&mut self, scan: &str, viewpoint: &str) -> Result<CachedView, EnvError> {
        let mut view: CachedView = Vec::new();
        let mut slot: HashMap<String, usize> = HashMap::new();

        for ix in 0..VIEW_COUNT {
            if ix == 0 {
                self.sim
                    .new_episode(scan, viewpoint, 0.0, view_elevation(0))?;
            } else if ix % 12 == 0 {
                self.sim.make_action(0, 1.0, 1.0)?;
            } else {
                self.sim.make_action(0, 1.0, 0.0)?;
            }

            let state = self.sim.state()?;
            if state.view_index != ix {
                return Err(EnvError::ViewIndexMismatch {
                    expected: ix,
                    found: state.view_index,
                });
            }

            for (j, loc) in state.navigable_locations.iter().enumerate().skip(1) {
                let distance = angular_distance(loc.rel_heading, loc.rel_elevation);
                let entry = CachedCandidate {
                    scan_id: scan.to_string(),
                    viewpoint_id: loc.viewpoint_id.clone(),
                    normalized_heading: state.heading + loc.rel_heading,
                    normalized_elevation: state.elevation + loc.rel_elevation,
                    point_id: ix,
                    nav_index: j,
                    distance,
                    position: [loc.x, loc.y, loc.z],
                };
                match slot.get(&loc.viewpoint_id) {
                    Some(&k) if view[k].distance <= distance => {}
                    Some(&k) => view[k] = entry,
                    None => {
                        slot.insert(loc.viewpoint_id.clone(), view.len());
                        view.push(entry);
                    }
                }
            }
        }

        Ok(view)
    }
}

/// Re-orient cached candidates to `view_index` and attach fused features.
fn render(
    view: &CachedView,
    features: &[Vec<f32>],
    view_index: usize,
    angle_feat_size: usize,
) -> Vec<CandidateEntry> {
    let base_heading = view_heading(view_index);
    let base_elevation = view_elevation(view_index);

    view.iter()
        .map(|c| {
            let heading = c.normalized_heading - base_heading;
            let elevation = c.normalized_elevation - base_elevation;
            let mut feature = features[c.point_id].clone();
            feature.extend(angle_feature(heading, elevation, angle_feat_size));
            CandidateEntry {
                scan_id: c.scan_id.clone(),
                viewpoint_id: c.viewpoint_id.clone(),
                heading,
                elevation,
                normalized_heading: c.normalized_heading,
                normalized_elevation: c.normalized_elevation,
                point_id: c.point_id,
                nav_index: c.nav_index,
                distance: c.distance,
                feature,
                position: c.position,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{NavigableLocation, SimState};

    /// Scripted simulator: reports the same raw sightings for every
    /// viewpoint, keyed by view index.
    struct ScriptedSim {
        view_index: usize,
        sightings: HashMap<usize, Vec<(&'static str, f64, f64)>>,
        sweeps: usize,
    }

    impl ScriptedSim {
        fn new(sightings: Vec<(usize, Vec<(&'static str, f64, f64)>)>) -> Self {
            Self {
                view_index: 0,
                sightings: sightings.into_iter().collect(),
                sweeps: 0,
            }
        }
    }

    impl Simulator for ScriptedSim {
        fn new_episode(&mut self, _: &str, _: &str, _: f64, _: f64) -> Result<(), EnvError> {
            self.view_index = 0;
            self.sweeps += 1;
            Ok(())
        }

        fn make_action(&mut self, _: usize, _: f64, _: f64) -> Result<(), EnvError> {
            self.view_index += 1;
            Ok(())
        }

        fn state(&self) -> Result<SimState, EnvError> {
            let mut navigable_locations = vec![NavigableLocation {
                viewpoint_id: "here".into(),
                rel_heading: 0.0,
                rel_elevation: 0.0,
                rel_distance: 0.0,
                x: 0.0,
                y: 0.0,
                z: 0.0,
            }];
            for &(id, h, e) in self.sightings.get(&self.view_index).into_iter().flatten() {
                navigable_locations.push(NavigableLocation {
                    viewpoint_id: id.into(),
                    rel_heading: h,
                    rel_elevation: e,
                    rel_distance: 1.0,
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                });
            }
            Ok(SimState {
                scan_id: "S".into(),
                viewpoint_id: "here".into(),
                heading: view_heading(self.view_index),
                elevation: view_elevation(self.view_index),
                view_index: self.view_index,
                position: [0.0; 3],
                navigable_locations,
            })
        }
    }

    fn features() -> Vec<Vec<f32>> {
        (0..36).map(|i| vec![i as f32]).collect()
    }

    #[test]
    fn smaller_angular_distance_wins() {
        // "t" seen from view 3 at d=0.4 and from view 16 at d=0.1
        let sim = ScriptedSim::new(vec![
            (3, vec![("t", 0.4, 0.0)]),
            (16, vec![("u", 0.2, 0.0), ("t", 0.0, 0.1)]),
            (20, vec![("t", 0.3, 0.0)]),
        ]);
        let mut resolver = CandidateResolver::new(sim, 4);
        let cands = resolver.resolve(&features(), "S", "here", 12).unwrap();

        assert_eq!(cands.len(), 2);
        let t = cands.iter().find(|c| c.viewpoint_id == "t").unwrap();
        assert_eq!(t.point_id, 16);
        assert_eq!(t.nav_index, 2);
        assert!((t.distance - 0.1).abs() < 1e-12);
        assert_eq!(t.feature[0], 16.0);
        assert_eq!(t.feature.len(), 1 + 4);
        // first-sighting order is kept after an overwrite
        assert_eq!(cands[0].viewpoint_id, "t");
    }

    #[test]
    fn equal_distance_keeps_first_sighting() {
        let sim = ScriptedSim::new(vec![
            (2, vec![("t", 0.2, 0.0)]),
            (5, vec![("t", -0.2, 0.0)]),
        ]);
        let mut resolver = CandidateResolver::new(sim, 4);
        let cands = resolver.resolve(&features(), "S", "here", 0).unwrap();
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].point_id, 2);
    }

    #[test]
    fn hit_reproduces_miss_exactly() {
        let sim = ScriptedSim::new(vec![
            (1, vec![("a", 0.25, -0.05)]),
            (27, vec![("b", -0.1, 0.2)]),
        ]);
        let mut resolver = CandidateResolver::new(sim, 8);
        let first = resolver.resolve(&features(), "S", "here", 14).unwrap();
        let second = resolver.resolve(&features(), "S", "here", 14).unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.cache().len(), 1);
        assert_eq!(resolver.sim.sweeps, 1);
    }

    #[test]
    fn reorients_to_caller_view() {
        let sim = ScriptedSim::new(vec![(13, vec![("a", 0.0, 0.0)])]);
        let mut resolver = CandidateResolver::new(sim, 4);

        let from_13 = resolver.resolve(&features(), "S", "here", 13).unwrap();
        assert!(from_13[0].heading.abs() < 1e-12);
        assert!(from_13[0].elevation.abs() < 1e-12);

        let from_12 = resolver.resolve(&features(), "S", "here", 12).unwrap();
        assert!((from_12[0].heading - view_heading(13)).abs() < 1e-12);
        assert_eq!(
            from_12[0].normalized_heading,
            from_13[0].normalized_heading
        );
        // cached normalized values are not touched by reads
        let cached = &resolver.cache().get("S_here").unwrap()[0];
        assert_eq!(cached.normalized_heading, from_13[0].normalized_heading);
    }

    #[test]
    fn no_neighbours_gives_empty_list() {
        let sim = ScriptedSim::new(vec![]);
        let mut resolver = CandidateResolver::new(sim, 4);
        let cands = resolver.resolve(&features(), "S", "here", 0).unwrap();
        assert!(cands.is_empty());
        assert!(resolver.cache().contains("S_here"));
    }

    #[test]
    fn short_feature_array_is_rejected() {
        let sim = ScriptedSim::new(vec![]);
        let mut resolver = CandidateResolver::new(sim, 4);
        let err = resolver
            .resolve(&vec![vec![0.0]; 10], "S", "here", 0)
            .unwrap_err();
        assert!(matches!(
            err,
            EnvError::FeatureShape {
                expected: 36,
                found: 10
            }
        ));
    }

    #[test]
    fn sweep_detects_view_index_drift() {
        struct StuckSim;
        impl Simulator for StuckSim {
            fn new_episode(&mut self, _: &str, _: &str, _: f64, _: f64) -> Result<(), EnvError> {
                Ok(())
            }
            fn make_action(&mut self, _: usize, _: f64, _: f64) -> Result<(), EnvError> {
                Ok(())
            }
            fn state(&self) -> Result<SimState, EnvError> {
                Ok(SimState {
                    scan_id: "S".into(),
                    viewpoint_id: "here".into(),
                    heading: 0.0,
                    elevation: 0.0,
                    view_index: 0,
                    position: [0.0; 3],
                    navigable_locations: vec![],
                })
            }
        }
        let mut resolver = CandidateResolver::new(StuckSim, 4);
        assert!(matches!(
            resolver.resolve(&features(), "S", "here", 0),
            Err(EnvError::ViewIndexMismatch {
                expected: 1,
                found: 0
            })
        ));
    }
}
