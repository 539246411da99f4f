//! Trajectory scoring: navigation success, SPL and object grounding.
//!
//! A trajectory succeeds when it ends at a viewpoint from which the goal
//! object is visible. Path lengths always come from the shortest-distance
//! tables, so a detour between two consecutive recorded viewpoints costs
//! exactly their shortest distance.
//!
//! | Metric | Meaning |
//! |--------|---------|
//! | `sr` | success rate |
//! | `oracle_sr` | any visited viewpoint sees the goal |
//! | `spl` | success weighted by path length |
//! | `rgs` | predicted object id matches |
//! | `rgspl` | `rgs` weighted by path length |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::episode::deserialize_object_id;
use crate::error::EnvError;
use crate::objects::ObjectViewpointIndex;
use crate::pathfinding::{NavGraphs, SceneGraph};

/// Lower bound on the SPL denominator.
pub const SPL_LENGTH_FLOOR: f64 = 0.01;

/// Ground truth of one instruction, recorded before any data split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub scan: String,
    pub path: Vec<String>,
    pub obj_id: Option<String>,
}

/// An agent's result for one instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub instr_id: String,
    /// Path segments, one per action; their concatenation is the trajectory.
    pub trajectory: Vec<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_object_id")]
    pub pred_objid: Option<String>,
}

/// Metrics of one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeScore {
    pub action_steps: usize,
    pub trajectory_steps: usize,
    pub trajectory_lengths: f64,
    pub success: f64,
    pub oracle_success: f64,
    pub spl: f64,
    pub rgs: f64,
    pub rgspl: f64,
}

/// Episode metrics averaged over a set of predictions. Rates are percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub action_steps: f64,
    pub steps: f64,
    pub lengths: f64,
    pub sr: f64,
    pub oracle_sr: f64,
    pub spl: f64,
    pub rgs: f64,
    pub rgspl: f64,
}

/// Per-instruction scores, in prediction order.
pub type ScoredEpisodes = Vec<(String, EpisodeScore)>;

fn path_length(scene: &SceneGraph, path: &[String]) -> Result<f64, EnvError> {
    let mut total = 0.0;
    for pair in path.windows(2) {
        total += scene
            .distance(&pair[0], &pair[1])
            .ok_or_else(|| EnvError::NoPath {
                scan: scene.scan().to_string(),
                from: pair[0].clone(),
                to: pair[1].clone(),
            })?;
    }
    Ok(total)
}

/// Scores trajectories against shortest-path tables and object visibility.
pub struct Evaluator<'a> {
    graphs: &'a NavGraphs,
    obj2vps: &'a ObjectViewpointIndex,
}

impl<'a> Evaluator<'a> {
    pub fn new(graphs: &'a NavGraphs, obj2vps: &'a ObjectViewpointIndex) -> Self {
        Self { graphs, obj2vps }
    }

    /// Score one trajectory.
    ///
    /// The flattened `pred_path` must start at `gt_path[0]`.
    pub fn score_episode(
        &self,
        scan: &str,
        pred_path: &[Vec<String>],
        pred_obj_id: Option<&str>,
        gt_path: &[String],
        gt_obj_id: &str,
    ) -> Result<EpisodeScore, EnvError> {
        let scene = self.graphs.scene(scan)?;
        let path: Vec<String> = pred_path.concat();

        let start = gt_path
            .first()
            .ok_or_else(|| EnvError::EmptyPath(format!("{}_{}", scan, gt_obj_id)))?;
        if path.first() != Some(start) {
            return Err(EnvError::UnanchoredTrajectory {
                expected: start.clone(),
                found: path.first().cloned(),
            });
        }

        let trajectory_lengths = path_length(scene, &path)?;
        let gt_length = path_length(scene, gt_path)?;

        let goal_viewpoints = self.obj2vps.goal_viewpoints(scan, gt_obj_id)?;
        let is_goal = |vp: &String| goal_viewpoints.contains(vp);

        let success = if path.last().is_some_and(is_goal) { 1.0 } else { 0.0 };
        let oracle_success = if path.iter().any(is_goal) { 1.0 } else { 0.0 };
        let rgs = if pred_obj_id == Some(gt_obj_id) { 1.0 } else { 0.0 };
        let denominator = trajectory_lengths.max(gt_length).max(SPL_LENGTH_FLOOR);

        Ok(EpisodeScore {
            action_steps: pred_path.len() - 1,
            trajectory_steps: path.len() - 1,
            trajectory_lengths,
            success,
            oracle_success,
            spl: success * gt_length / denominator,
            rgs,
            rgspl: rgs * gt_length / denominator,
        })
    }

    /// Score every prediction against its recorded ground truth.
    pub fn eval_predictions(
        &self,
        preds: &[Prediction],
        ground_truth: &HashMap<String, GroundTruth>,
    ) -> Result<(MetricSummary, ScoredEpisodes), EnvError> {
        log::info!("eval {} predictions", preds.len());
        let mut scored = Vec::with_capacity(preds.len());
        for pred in preds {
            let gt = ground_truth
                .get(&pred.instr_id)
                .ok_or_else(|| EnvError::UnknownInstruction(pred.instr_id.clone()))?;
            let gt_obj_id = gt.obj_id.as_deref().ok_or_else(|| {
                EnvError::MissingGoalViewpoints(format!("{}_None", gt.scan))
            })?;
            let score = self.score_episode(
                &gt.scan,
                &pred.trajectory,
                pred.pred_objid.as_deref(),
                &gt.path,
                gt_obj_id,
            )?;
            scored.push((pred.instr_id.clone(), score));
        }
        let summary = aggregate(scored.iter().map(|(_, s)| s));
        Ok((summary, scored))
    }
}

/// Average episode scores. Rates are reported as percentages; an empty
/// input gives all zeros.
pub fn aggregate<'s>(scores: impl IntoIterator<Item = &'s EpisodeScore>) -> MetricSummary {
    let mut sum = MetricSummary::default();
    let mut n = 0usize;
    for s in scores {
        sum.action_steps += s.action_steps as f64;
        sum.steps += s.trajectory_steps as f64;
        sum.lengths += s.trajectory_lengths;
        sum.sr += s.success;
        sum.oracle_sr += s.oracle_success;
        sum.spl += s.spl;
        sum.rgs += s.rgs;
        sum.rgspl += s.rgspl;
        n += 1;
    }
    if n == 0 {
        return sum;
    }

    let n = n as f64;
    MetricSummary {
        action_steps: sum.action_steps / n,
        steps: sum.steps / n,
        lengths: sum.lengths / n,
        sr: sum.sr / n * 100.0,
        oracle_sr: sum.oracle_sr / n * 100.0,
        spl: sum.spl / n * 100.0,
        rgs: sum.rgs / n * 100.0,
        rgspl: sum.rgspl / n * 100.0,
    }
}
