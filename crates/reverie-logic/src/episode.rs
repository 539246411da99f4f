//! Instruction dataset, minibatching and observation assembly.
//!
//! `ReverieNavBatch` is the environment the agent talks to. It walks the
//! shuffled instruction dataset in fixed-size minibatches, resets one
//! simulator session per instruction, and after every reset or step turns
//! the raw session states into [`Observation`] records: fused view
//! features, candidates, object features and the shortest distance to the
//! nearest goal viewpoint.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::angles::AngleFeatureTable;
use crate::batch::{EnvBatch, EpisodeStart, ImageFeatureStore};
use crate::candidates::{CandidateEntry, CandidateResolver, ViewCache};
use crate::config::EnvConfig;
use crate::error::EnvError;
use crate::eval::{Evaluator, GroundTruth, MetricSummary, Prediction, ScoredEpisodes};
use crate::objects::{ObjectFeatureSource, ObjectViewpointIndex};
use crate::pathfinding::NavGraphs;
use crate::simulator::{Action, NavigableLocation, Simulator};

/// Randomized start points are drawn from viewpoints whose shortest path to
/// the goal has this many nodes (3 to 6 hops).
pub const START_PATH_NODES: std::ops::RangeInclusive<usize> = 4..=7;

/// Accept an object id written as a JSON string or number.
pub fn deserialize_object_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// One instruction of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeItem {
    pub instr_id: String,
    pub scan: String,
    /// Ground-truth viewpoint sequence; `path[0]` is the start.
    pub path: Vec<String>,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub instruction: String,
    /// Pre-tokenized instruction.
    #[serde(default)]
    pub instr_encoding: Vec<u32>,
    #[serde(default)]
    pub path_id: i64,
    #[serde(
        rename = "objId",
        default,
        deserialize_with = "deserialize_object_id"
    )]
    pub obj_id: Option<String>,
    /// Viewpoints that see the goal object; filled in at load time.
    #[serde(default)]
    pub end_vps: Vec<String>,
}

/// Parse an instruction dataset (a JSON array of items).
pub fn parse_dataset(json: &str) -> Result<Vec<EpisodeItem>, EnvError> {
    Ok(serde_json::from_str(json)?)
}

/// Everything the agent sees for one batch slot at one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub instr_id: String,
    pub scan: String,
    pub viewpoint: String,
    pub view_index: usize,
    pub position: [f64; 3],
    pub heading: f64,
    pub elevation: f64,
    /// Per view: visual feature followed by its angle encoding relative to
    /// the current view.
    pub feature: Vec<Vec<f32>>,
    pub candidate: Vec<CandidateEntry>,
    pub obj_img_fts: Vec<Vec<f32>>,
    pub obj_ang_fts: Vec<Vec<f32>>,
    pub obj_box_fts: Vec<[f32; 3]>,
    pub obj_ids: Vec<String>,
    pub navigable_locations: Vec<NavigableLocation>,
    pub instruction: String,
    pub instr_encoding: Vec<u32>,
    pub gt_path: Vec<String>,
    pub gt_end_vps: Vec<String>,
    pub gt_obj_id: Option<String>,
    pub path_id: i64,
    /// Shortest distance to the nearest goal viewpoint; 0 without a goal
    /// object, infinite when no goal viewpoint is reachable.
    pub distance: f64,
}

/// Resample start and/or end of an item and rebuild its path.
fn randomize_item(
    item: &EpisodeItem,
    graphs: &NavGraphs,
    rng: &mut StdRng,
    multi_startpoints: bool,
    multi_endpoints: bool,
) -> Result<EpisodeItem, EnvError> {
    let scene = graphs.scene(&item.scan)?;
    let (Some(first), Some(last)) = (item.path.first(), item.path.last()) else {
        return Err(EnvError::EmptyPath(item.instr_id.clone()));
    };
    let mut start = first.clone();
    let mut end = last.clone();

    if multi_endpoints && !item.end_vps.is_empty() {
        end = item.end_vps[rng.gen_range(0..item.end_vps.len())].clone();
    }
    if multi_startpoints {
        let candidates: Vec<&str> = scene
            .paths_from(&end)
            .into_iter()
            .filter(|(_, path)| START_PATH_NODES.contains(&path.len()))
            .map(|(vp, _)| vp)
            .collect();
        if !candidates.is_empty() {
            start = candidates[rng.gen_range(0..candidates.len())].to_string();
        }
    }

    let path = scene
        .shortest_path(&start, &end)
        .ok_or_else(|| EnvError::NoPath {
            scan: item.scan.clone(),
            from: start.clone(),
            to: end.clone(),
        })?;
    Ok(EpisodeItem {
        path,
        ..item.clone()
    })
}

/// Batched REVERIE navigation environment.
pub struct ReverieNavBatch<S, F> {
    config: EnvConfig,
    env: EnvBatch<S, F>,
    resolver: CandidateResolver<S>,
    objects: Box<dyn ObjectFeatureSource>,
    graphs: Arc<NavGraphs>,
    obj2vps: ObjectViewpointIndex,
    data: Vec<EpisodeItem>,
    gt_trajs: HashMap<String, GroundTruth>,
    angle_features: AngleFeatureTable,
    ix: usize,
    batch: Vec<EpisodeItem>,
    rng: StdRng,
}

impl<S: Simulator, F: ImageFeatureStore> ReverieNavBatch<S, F> {
    /// Build the environment.
    ///
    /// `make_sim` is called `batch_size + 1` times: one session per slot
    /// and one private session for candidate view sweeps.
    pub fn new(
        config: EnvConfig,
        mut data: Vec<EpisodeItem>,
        graphs: Arc<NavGraphs>,
        obj2vps: ObjectViewpointIndex,
        feat_db: F,
        objects: Box<dyn ObjectFeatureSource>,
        mut make_sim: impl FnMut() -> S,
    ) -> Result<Self, EnvError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(EnvError::InvalidConfig(errors));
        }

        for item in &mut data {
            if item.path.is_empty() {
                return Err(EnvError::EmptyPath(item.instr_id.clone()));
            }
            if let Some(obj_id) = &item.obj_id {
                item.end_vps = obj2vps.goal_viewpoints(&item.scan, obj_id)?.to_vec();
            }
        }

        let gt_trajs = data
            .iter()
            .map(|x| {
                (
                    x.instr_id.clone(),
                    GroundTruth {
                        scan: x.scan.clone(),
                        path: x.path.clone(),
                        obj_id: x.obj_id.clone(),
                    },
                )
            })
            .collect();

        if let Some((index, count)) = config.data_split {
            let per_split = data.len() / count;
            let start = per_split * index;
            let end = if index == count - 1 {
                data.len()
            } else {
                start + per_split
            };
            data = data[start..end].to_vec();
        }
        if data.is_empty() {
            return Err(EnvError::EmptyDataset);
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        data.shuffle(&mut rng);

        let sims = (0..config.batch_size).map(|_| make_sim()).collect();
        let resolver = CandidateResolver::new(make_sim(), config.angle_feat_size);

        log::info!(
            "ReverieNavBatch loaded with {} instructions, using splits: {}",
            data.len(),
            config.name.as_deref().unwrap_or("-")
        );

        Ok(Self {
            angle_features: AngleFeatureTable::new(config.angle_feat_size),
            env: EnvBatch::new(sims, feat_db),
            resolver,
            objects,
            graphs,
            obj2vps,
            data,
            gt_trajs,
            ix: 0,
            batch: Vec::new(),
            rng,
            config,
        })
    }

    /// Number of instructions (after any split).
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn graphs(&self) -> &NavGraphs {
        &self.graphs
    }

    pub fn object_index(&self) -> &ObjectViewpointIndex {
        &self.obj2vps
    }

    /// The current minibatch.
    pub fn batch(&self) -> &[EpisodeItem] {
        &self.batch
    }

    /// Dataset cursor, always in `0..size()`.
    pub fn cursor(&self) -> usize {
        self.ix
    }

    pub fn view_cache(&self) -> &ViewCache {
        self.resolver.cache()
    }

    pub fn ground_truth(&self, instr_id: &str) -> Option<&GroundTruth> {
        self.gt_trajs.get(instr_id)
    }

    /// Take the next `size` items, reshuffling and wrapping around when the
    /// dataset runs out. Randomized start/end sampling applies to the
    /// returned copies only; the current minibatch is left alone until a
    /// reset starts new episodes.
    pub fn next_minibatch(&mut self, size: usize) -> Result<Vec<EpisodeItem>, EnvError> {
        let len = self.data.len();
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            let take = (size - batch.len()).min(len - self.ix);
            batch.extend_from_slice(&self.data[self.ix..self.ix + take]);
            self.ix += take;
            if self.ix == len {
                self.data.shuffle(&mut self.rng);
                self.ix = 0;
            }
        }

        if self.config.multi_startpoints || self.config.multi_endpoints {
            batch = batch
                .iter()
                .map(|item| {
                    randomize_item(
                        item,
                        &self.graphs,
                        &mut self.rng,
                        self.config.multi_startpoints,
                        self.config.multi_endpoints,
                    )
                })
                .collect::<Result<_, _>>()?;
        }

        Ok(batch)
    }

    /// Rewind to the start of the dataset, optionally reshuffling. The next
    /// `reset()` still has to be called.
    pub fn reset_epoch(&mut self, shuffle: bool) {
        if shuffle {
            self.data.shuffle(&mut self.rng);
        }
        self.ix = 0;
    }

    /// Load a new minibatch and start its episodes.
    pub fn reset(&mut self) -> Result<Vec<Observation>, EnvError> {
        self.reset_with(self.config.batch_size)
    }

    /// As [`reset`](Self::reset) with an explicit minibatch size, which must
    /// still match the number of sessions.
    ///
    /// The minibatch only replaces the current one once every session has
    /// started its episode. A failed session reset clears it, so `step`
    /// refuses to run until the next successful reset.
    pub fn reset_with(&mut self, batch_size: usize) -> Result<Vec<Observation>, EnvError> {
        let expected = self.env.batch_size();
        if batch_size != expected {
            return Err(EnvError::BatchSizeMismatch {
                expected,
                found: batch_size,
            });
        }

        let batch = self.next_minibatch(batch_size)?;
        let starts: Vec<EpisodeStart> = batch
            .iter()
            .map(|item| EpisodeStart {
                scan: item.scan.clone(),
                viewpoint: item.path[0].clone(),
                heading: item.heading,
            })
            .collect();
        if let Err(err) = self.env.new_episodes(&starts) {
            self.batch.clear();
            return Err(err);
        }
        self.batch = batch;
        self.get_obs()
    }

    /// Apply one action per slot and observe the new states.
    pub fn step(&mut self, actions: &[Action]) -> Result<Vec<Observation>, EnvError> {
        self.env.make_actions(actions)?;
        self.get_obs()
    }

    /// Score predictions against the recorded ground truth.
    pub fn eval_metrics(
        &self,
        preds: &[Prediction],
    ) -> Result<(MetricSummary, ScoredEpisodes), EnvError> {
        Evaluator::new(&self.graphs, &self.obj2vps).eval_predictions(preds, &self.gt_trajs)
    }

    fn goal_distance(&self, scan: &str, viewpoint: &str, obj_id: Option<&str>) -> Result<f64, EnvError> {
        let Some(obj_id) = obj_id else {
            return Ok(0.0);
        };
        let scene = self.graphs.scene(scan)?;
        let goals = self.obj2vps.goal_viewpoints(scan, obj_id)?;
        Ok(goals
            .iter()
            .filter_map(|vp| scene.distance(viewpoint, vp))
            .fold(f64::INFINITY, f64::min))
    }

    fn get_obs(&mut self) -> Result<Vec<Observation>, EnvError> {
        let states = self.env.get_states()?;
        if states.len() != self.batch.len() {
            return Err(EnvError::BatchSizeMismatch {
                expected: states.len(),
                found: self.batch.len(),
            });
        }
        let mut obs = Vec::with_capacity(states.len());

        for (item, (feature, state)) in self.batch.iter().zip(states) {
            let candidate = self.resolver.resolve(
                &feature,
                &state.scan_id,
                &state.viewpoint_id,
                state.view_index,
            )?;

            let feature: Vec<Vec<f32>> = feature
                .into_iter()
                .zip(self.angle_features.row(state.view_index))
                .map(|(mut visual, angle)| {
                    visual.extend_from_slice(angle);
                    visual
                })
                .collect();

            let objects = self.objects.object_features(
                &state.scan_id,
                &state.viewpoint_id,
                state.heading,
                state.elevation,
                self.config.angle_feat_size,
                self.config.max_objects,
            )?;

            let gt_obj_id = self
                .gt_trajs
                .get(&item.instr_id)
                .and_then(|gt| gt.obj_id.as_deref());
            let distance = self.goal_distance(&state.scan_id, &state.viewpoint_id, gt_obj_id)?;

            obs.push(Observation {
                instr_id: item.instr_id.clone(),
                scan: state.scan_id,
                viewpoint: state.viewpoint_id,
                view_index: state.view_index,
                position: state.position,
                heading: state.heading,
                elevation: state.elevation,
                feature,
                candidate,
                obj_img_fts: objects.img_fts,
                obj_ang_fts: objects.ang_fts,
                obj_box_fts: objects.box_fts,
                obj_ids: objects.obj_ids,
                navigable_locations: state.navigable_locations,
                instruction: item.instruction.clone(),
                instr_encoding: item.instr_encoding.clone(),
                gt_path: item.path.clone(),
                gt_end_vps: item.end_vps.clone(),
                gt_obj_id: item.obj_id.clone(),
                path_id: item.path_id,
                distance,
            });
        }

        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::InMemoryFeatureStore;
    use crate::error::EnvError;
    use crate::objects::{InMemoryObjectDb, LegacyObjectSource};
    use crate::pathfinding::SceneGraph;
    use crate::simulator::GraphSimulator;

    // A -5- B -5- C on a north-south line, D one metre east of A
    fn graphs() -> Arc<NavGraphs> {
        let vps = [
            ("A", [0.0, 0.0, 0.0]),
            ("B", [0.0, 5.0, 0.0]),
            ("C", [0.0, 10.0, 0.0]),
            ("D", [1.0, 0.0, 0.0]),
        ];
        let scene = SceneGraph::from_viewpoints(
            "S",
            &vps.iter()
                .map(|(id, p)| (id.to_string(), *p))
                .collect::<Vec<_>>(),
            &[
                ("A".to_string(), "B".to_string()),
                ("B".to_string(), "C".to_string()),
                ("A".to_string(), "D".to_string()),
            ],
        )
        .unwrap();
        Arc::new(NavGraphs::from_scenes(vec![scene]))
    }

    fn obj2vps() -> ObjectViewpointIndex {
        let mut index = ObjectViewpointIndex::new();
        index.insert("S", "17", "C");
        index.insert("S", "5", "A");
        index.insert("S", "9", "B");
        index.insert("S", "9", "C");
        index.insert("S", "21", "C");
        index.insert("S", "21", "D");
        index
    }

    fn features() -> InMemoryFeatureStore {
        let mut store = InMemoryFeatureStore::new();
        for (i, vp) in ["A", "B", "C", "D"].iter().enumerate() {
            store.insert("S", vp, vec![vec![i as f32, 1.0]; 36]);
        }
        store
    }

    fn item(id: &str, path: &[&str], obj: Option<&str>) -> EpisodeItem {
        EpisodeItem {
            instr_id: id.to_string(),
            scan: "S".to_string(),
            path: path.iter().map(|s| s.to_string()).collect(),
            heading: 0.0,
            instruction: format!("instruction {}", id),
            instr_encoding: vec![1, 2, 3],
            path_id: 7,
            obj_id: obj.map(str::to_string),
            end_vps: Vec::new(),
        }
    }

    fn config(batch_size: usize) -> EnvConfig {
        EnvConfig {
            batch_size,
            ..EnvConfig::default()
        }
    }

    fn build(
        config: EnvConfig,
        data: Vec<EpisodeItem>,
    ) -> Result<ReverieNavBatch<GraphSimulator, InMemoryFeatureStore>, EnvError> {
        let graphs = graphs();
        let camera = config.camera.clone();
        let sim_graphs = graphs.clone();
        ReverieNavBatch::new(
            config,
            data,
            graphs,
            obj2vps(),
            features(),
            Box::new(LegacyObjectSource::new(InMemoryObjectDb::new())),
            move || GraphSimulator::new(sim_graphs.clone(), &camera),
        )
    }

    #[test]
    fn object_ids_accept_strings_and_numbers() {
        let data = parse_dataset(
            r#"[
                {"instr_id": "1_0", "scan": "S", "path": ["A"], "objId": 17},
                {"instr_id": "2_0", "scan": "S", "path": ["A"], "objId": "5"},
                {"instr_id": "3_0", "scan": "S", "path": ["A"], "objId": null},
                {"instr_id": "4_0", "scan": "S", "path": ["A"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(data[0].obj_id.as_deref(), Some("17"));
        assert_eq!(data[1].obj_id.as_deref(), Some("5"));
        assert_eq!(data[2].obj_id, None);
        assert_eq!(data[3].obj_id, None);
        assert!(data[3].end_vps.is_empty());
    }

    #[test]
    fn construction_fills_goal_viewpoints() {
        let env = build(config(1), vec![item("1_0", &["A", "B", "C"], Some("9"))]).unwrap();
        assert_eq!(env.size(), 1);
        assert_eq!(env.data[0].end_vps, vec!["B".to_string(), "C".to_string()]);
        let gt = env.ground_truth("1_0").unwrap();
        assert_eq!(gt.obj_id.as_deref(), Some("9"));
        assert_eq!(gt.path.len(), 3);
    }

    #[test]
    fn construction_rejects_bad_input() {
        assert!(matches!(build(config(1), vec![]), Err(EnvError::EmptyDataset)));
        assert!(matches!(
            build(config(1), vec![item("1_0", &[], None)]),
            Err(EnvError::EmptyPath(_))
        ));
        assert!(matches!(
            build(config(0), vec![item("1_0", &["A"], None)]),
            Err(EnvError::InvalidConfig(_))
        ));
        assert!(matches!(
            build(config(1), vec![item("1_0", &["A"], Some("404"))]),
            Err(EnvError::MissingGoalViewpoints(_))
        ));
    }

    #[test]
    fn split_keeps_one_slice_and_remainder_goes_last() {
        let data: Vec<_> = (0..5)
            .map(|i| item(&format!("{}_0", i), &["A"], None))
            .collect();
        let first = build(
            EnvConfig {
                data_split: Some((0, 2)),
                ..config(1)
            },
            data.clone(),
        )
        .unwrap();
        let last = build(
            EnvConfig {
                data_split: Some((1, 2)),
                ..config(1)
            },
            data,
        )
        .unwrap();
        assert_eq!(first.size(), 2);
        assert_eq!(last.size(), 3);
        // Ground truth covers the whole dataset
        assert!(first.ground_truth("4_0").is_some());
    }

    #[test]
    fn minibatches_wrap_and_stay_full() {
        let data: Vec<_> = (0..3)
            .map(|i| item(&format!("{}_0", i), &["A"], None))
            .collect();
        let mut env = build(config(2), data).unwrap();

        let first: Vec<String> = env
            .next_minibatch(2)
            .unwrap()
            .iter()
            .map(|x| x.instr_id.clone())
            .collect();
        assert_eq!(env.cursor(), 2);
        let second: Vec<String> = env
            .next_minibatch(2)
            .unwrap()
            .iter()
            .map(|x| x.instr_id.clone())
            .collect();
        assert_eq!(second.len(), 2);
        assert_eq!(env.cursor(), 1);

        let mut epoch: Vec<String> = first.into_iter().chain(second.into_iter().take(1)).collect();
        epoch.sort();
        assert_eq!(epoch, vec!["0_0", "1_0", "2_0"]);

        // Larger than the dataset still yields exactly the requested size
        assert_eq!(env.next_minibatch(7).unwrap().len(), 7);
        assert!(env.cursor() < env.size());

        env.reset_epoch(false);
        assert_eq!(env.cursor(), 0);
    }

    #[test]
    fn reset_and_step_observe_goal_distance() {
        let mut env = build(config(1), vec![item("1_0", &["A", "B", "C"], Some("17"))]).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), 1);
        let ob = &obs[0];
        assert_eq!(ob.viewpoint, "A");
        assert_eq!(ob.view_index, 12);
        assert_eq!(ob.feature.len(), 36);
        assert_eq!(ob.feature[0].len(), 2 + 4);
        // The current view sees itself head-on
        assert_eq!(ob.feature[12][2..].to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
        assert!((ob.distance - 10.0).abs() < 1e-9);
        assert_eq!(ob.gt_end_vps, vec!["C".to_string()]);
        assert_eq!(ob.gt_obj_id.as_deref(), Some("17"));
        assert_eq!(ob.instr_encoding, vec![1, 2, 3]);
        assert!(ob.obj_ids.is_empty());
        assert!(ob.candidate.iter().any(|c| c.viewpoint_id == "B"));
        assert!(ob.candidate.iter().any(|c| c.viewpoint_id == "D"));

        let obs = env.step(&[Action::move_to(1)]).unwrap();
        assert_eq!(obs[0].viewpoint, "B");
        assert!((obs[0].distance - 5.0).abs() < 1e-9);
        assert_eq!(env.view_cache().len(), 2);
    }

    #[test]
    fn no_goal_object_means_zero_distance() {
        let mut env = build(config(1), vec![item("1_0", &["A", "B"], None)]).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(obs[0].distance, 0.0);
        assert_eq!(obs[0].gt_obj_id, None);
    }

    #[test]
    fn reset_size_must_match_sessions() {
        let mut env = build(config(2), vec![item("1_0", &["A"], None)]).unwrap();
        assert!(matches!(
            env.reset_with(3),
            Err(EnvError::BatchSizeMismatch {
                expected: 2,
                found: 3
            })
        ));
        assert!(env.step(&[Action::stay()]).is_err());
    }

    #[test]
    fn multi_endpoints_end_at_a_goal_viewpoint() {
        let mut env = build(
            EnvConfig {
                multi_endpoints: true,
                seed: 3,
                ..config(4)
            },
            vec![item("1_0", &["A", "B"], Some("9"))],
        )
        .unwrap();
        for _ in 0..5 {
            for x in env.next_minibatch(4).unwrap() {
                assert_eq!(x.path[0], "A");
                let end = x.path.last().unwrap();
                assert!(end == "B" || end == "C");
            }
        }
        // The stored item is never rewritten
        assert_eq!(env.data[0].path, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn multi_startpoints_start_three_to_six_hops_away() {
        let mut env = build(
            EnvConfig {
                multi_startpoints: true,
                ..config(1)
            },
            vec![item("1_0", &["B", "C"], Some("17"))],
        )
        .unwrap();
        // D is the only viewpoint whose path to C has 4 nodes
        let batch = env.next_minibatch(1).unwrap();
        assert_eq!(batch[0].path, vec!["D", "A", "B", "C"]);
    }

    #[test]
    fn start_is_kept_when_no_viewpoint_is_far_enough() {
        // Every viewpoint is at most 3 nodes from B
        let mut env = build(
            EnvConfig {
                multi_startpoints: true,
                ..config(1)
            },
            vec![item("1_0", &["A", "B"], Some("9"))],
        )
        .unwrap();
        for _ in 0..3 {
            let batch = env.next_minibatch(1).unwrap();
            assert_eq!(batch[0].path, vec!["A", "B"]);
        }

        // No goal object: the endpoint stays put as well
        let mut env = build(
            EnvConfig {
                multi_startpoints: true,
                multi_endpoints: true,
                ..config(1)
            },
            vec![item("1_0", &["A", "B"], None)],
        )
        .unwrap();
        let batch = env.next_minibatch(1).unwrap();
        assert_eq!(batch[0].path, vec!["A", "B"]);
    }

    #[test]
    fn start_is_drawn_from_the_sampled_endpoint() {
        // From the original end B nothing is 4 to 7 nodes away, so only a
        // start drawn around the sampled C or D yields a long enough path
        let mut env = build(
            EnvConfig {
                multi_startpoints: true,
                multi_endpoints: true,
                seed: 11,
                ..config(4)
            },
            vec![item("1_0", &["A", "B"], Some("21"))],
        )
        .unwrap();
        for _ in 0..5 {
            for x in env.next_minibatch(4).unwrap() {
                let end = x.path.last().unwrap();
                assert!(x.end_vps.contains(end));
                assert!(START_PATH_NODES.contains(&x.path.len()));
                assert_ne!(&x.path[0], end);
            }
        }
    }

    #[test]
    fn rejected_reset_keeps_the_running_episodes() {
        let mut env = build(
            config(1),
            vec![item("a", &["A"], None), item("b", &["B"], None)],
        )
        .unwrap();
        let first = env.reset().unwrap();
        let cursor = env.cursor();

        assert!(matches!(
            env.reset_with(2),
            Err(EnvError::BatchSizeMismatch {
                expected: 1,
                found: 2
            })
        ));
        assert_eq!(env.cursor(), cursor);
        assert_eq!(env.batch().len(), 1);

        let obs = env.step(&[Action::stay()]).unwrap();
        assert_eq!(obs[0].instr_id, first[0].instr_id);
        assert_eq!(obs[0].viewpoint, first[0].viewpoint);
        assert_eq!(obs[0].gt_path, first[0].gt_path);
    }

    #[test]
    fn failed_session_reset_blocks_stepping() {
        let mut env = build(
            config(1),
            vec![item("ok", &["A"], None), item("bad", &["Z"], None)],
        )
        .unwrap();
        let mut failed = false;
        for _ in 0..2 {
            match env.reset() {
                Ok(obs) => assert_eq!(obs[0].instr_id, "ok"),
                Err(err) => {
                    assert!(matches!(err, EnvError::UnknownViewpoint { .. }));
                    assert!(env.batch().is_empty());
                    assert!(env.step(&[Action::stay()]).is_err());
                    failed = true;
                }
            }
        }
        assert!(failed);
    }

    #[test]
    fn eval_metrics_use_recorded_ground_truth() {
        let env = build(config(1), vec![item("1_0", &["A", "B", "C"], Some("17"))]).unwrap();
        let preds = vec![Prediction {
            instr_id: "1_0".to_string(),
            trajectory: vec![
                vec!["A".to_string()],
                vec!["B".to_string()],
                vec!["C".to_string()],
            ],
            pred_objid: Some("17".to_string()),
        }];
        let (summary, scores) = env.eval_metrics(&preds).unwrap();
        assert_eq!(summary.sr, 100.0);
        assert_eq!(summary.rgs, 100.0);
        assert_eq!(scores.len(), 1);
    }
}
