//! REVERIE Navigation Headless Harness
//!
//! Drives the full environment against the graph-only simulator and checks
//! graphs, candidates, minibatching, episodes and metrics end to end.
//! Runs entirely in-process: no renderer, no feature files.
//!
//! Usage:
//!   cargo run -p reverie-simtest
//!   cargo run -p reverie-simtest -- --verbose
//!   cargo run -p reverie-simtest -- --connectivity-dir data/connectivity --scan 17DRP5sb8fy

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reverie_logic::angles::{HEADING_COUNT, VIEW_COUNT};
use reverie_logic::batch::{ImageFeatureStore, InMemoryFeatureStore};
use reverie_logic::candidates::CandidateResolver;
use reverie_logic::config::EnvConfig;
use reverie_logic::episode::{EpisodeItem, Observation, ReverieNavBatch, START_PATH_NODES};
use reverie_logic::error::EnvError;
use reverie_logic::eval::Prediction;
use reverie_logic::objects::{
    InMemoryObjectDb, LegacyObjectSource, ObjectDetection, ObjectViewpointIndex,
    VISIBILITY_RADIUS,
};
use reverie_logic::pathfinding::{NavGraphs, SceneGraph};
use reverie_logic::simulator::{Action, GraphSimulator};

const SEED: u64 = 7;
const EPISODES_PER_SCAN: usize = 12;
const BATCH_SIZE: usize = 4;
const MAX_STEPS: usize = 200;
/// Viewpoints checked per scan in the candidate sweep section.
const CANDIDATE_SAMPLE: usize = 40;
const VISUAL_DIM: usize = 8;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

struct Args {
    verbose: bool,
    connectivity_dir: Option<PathBuf>,
    scans: Vec<String>,
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args {
        verbose: false,
        connectivity_dir: None,
        scans: Vec::new(),
    };
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--verbose" => args.verbose = true,
            "--connectivity-dir" => {
                args.connectivity_dir = Some(PathBuf::from(flag_value(&mut it, &arg)?));
            }
            "--scan" => args.scans.push(flag_value(&mut it, &arg)?),
            other => println!("Ignoring unknown argument {}", other),
        }
    }
    Ok(args)
}

fn flag_value(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    match it.next() {
        Some(v) if !v.starts_with("--") => Ok(v),
        _ => Err(format!("{} needs a value", flag)),
    }
}

/// Everything the environment needs, built around one set of graphs.
struct Fixture {
    graphs: Arc<NavGraphs>,
    data: Vec<EpisodeItem>,
    obj2vps: ObjectViewpointIndex,
    objects: InMemoryObjectDb,
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            println!("{}", e);
            std::process::exit(1);
        }
    };
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    println!("=== REVERIE Navigation Harness ===\n");

    let graphs = match &args.connectivity_dir {
        Some(dir) if !args.scans.is_empty() => {
            match NavGraphs::load(dir, args.scans.iter().map(|s| s.as_str())) {
                Ok(g) => g,
                Err(e) => {
                    println!("Failed to load connectivity from {}: {}", dir.display(), e);
                    std::process::exit(1);
                }
            }
        }
        Some(_) => {
            println!("--connectivity-dir needs at least one --scan");
            std::process::exit(1);
        }
        None => match synthetic_graphs() {
            Ok(g) => g,
            Err(e) => {
                println!("Failed to build synthetic scene: {}", e);
                std::process::exit(1);
            }
        },
    };
    let fixture = build_fixture(Arc::new(graphs));
    println!(
        "Scans: {}, episodes: {}\n",
        fixture.graphs.len(),
        fixture.data.len()
    );

    let mut results = Vec::new();

    // 1. Graph symmetry and path sums
    results.extend(validate_graphs(&fixture, args.verbose));

    // 2. Candidate sweeps and the view cache
    results.extend(validate_candidates(&fixture, args.verbose));

    // 3. Minibatch sizing and wrap-around
    results.extend(validate_minibatches(&fixture, args.verbose));

    // 4. Shortest-path agent episodes and metrics
    results.extend(validate_episodes(&fixture, args.verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Fixture ─────────────────────────────────────────────────────────────

/// 6x6 grid, 2 m apart with jittered positions and a few diagonal shortcuts.
fn synthetic_graphs() -> Result<NavGraphs, EnvError> {
    const SIDE: usize = 6;
    let mut rng = StdRng::seed_from_u64(SEED);

    let name = |r: usize, c: usize| format!("vp{:02}", r * SIDE + c);
    let mut viewpoints = Vec::new();
    for r in 0..SIDE {
        for c in 0..SIDE {
            let x = c as f64 * 2.0 + rng.gen_range(-0.3..0.3);
            let y = r as f64 * 2.0 + rng.gen_range(-0.3..0.3);
            let z = rng.gen_range(-0.05..0.05);
            viewpoints.push((name(r, c), [x, y, z]));
        }
    }

    let mut edges = Vec::new();
    for r in 0..SIDE {
        for c in 0..SIDE {
            if c + 1 < SIDE {
                edges.push((name(r, c), name(r, c + 1)));
            }
            if r + 1 < SIDE {
                edges.push((name(r, c), name(r + 1, c)));
            }
            if r + 1 < SIDE && c + 1 < SIDE && rng.gen_bool(0.2) {
                edges.push((name(r, c), name(r + 1, c + 1)));
            }
        }
    }

    let scene = SceneGraph::from_viewpoints("synthetic", &viewpoints, &edges)?;
    Ok(NavGraphs::from_scenes(vec![scene]))
}

/// Sample episodes 3 to 6 hops long; each goal object is visible from its
/// end viewpoint and from close neighbours of it.
fn build_fixture(graphs: Arc<NavGraphs>) -> Fixture {
    let mut rng = StdRng::seed_from_u64(SEED + 1);
    let mut data = Vec::new();
    let mut obj2vps = ObjectViewpointIndex::new();
    let mut objects = InMemoryObjectDb::new();

    for scan in graphs.scans() {
        let Some(scene) = graphs.get(scan) else {
            continue;
        };
        let viewpoints: Vec<&str> = scene.viewpoints().collect();
        if viewpoints.is_empty() {
            continue;
        }

        let mut made = 0;
        for _ in 0..EPISODES_PER_SCAN * 10 {
            if made == EPISODES_PER_SCAN {
                break;
            }
            let end = viewpoints[rng.gen_range(0..viewpoints.len())];
            let starts: Vec<&str> = scene
                .paths_from(end)
                .into_iter()
                .filter(|(_, path)| START_PATH_NODES.contains(&path.len()))
                .map(|(vp, _)| vp)
                .collect();
            if starts.is_empty() {
                continue;
            }
            let start = starts[rng.gen_range(0..starts.len())];
            let Some(path) = scene.shortest_path(start, end) else {
                continue;
            };

            let obj_id = format!("{}", 100 + made);
            obj2vps.insert(scan, &obj_id, end);
            for (vp, weight) in scene.neighbors(end) {
                if weight <= VISIBILITY_RADIUS / 2.0 {
                    obj2vps.insert(scan, &obj_id, vp);
                }
            }
            objects.insert(
                scan,
                end,
                ObjectDetection {
                    obj_id: obj_id.clone(),
                    feature: vec![made as f32; VISUAL_DIM],
                    heading: rng.gen_range(0.0..std::f64::consts::TAU),
                    elevation: 0.0,
                    width: 120.0,
                    height: 90.0,
                },
            );

            data.push(EpisodeItem {
                instr_id: format!("{}_{}", scan, made),
                scan: scan.to_string(),
                path,
                heading: rng.gen_range(0.0..std::f64::consts::TAU),
                instruction: format!("go to object {}", obj_id),
                instr_encoding: vec![made as u32],
                path_id: made as i64,
                obj_id: Some(obj_id),
                end_vps: Vec::new(),
            });
            made += 1;
        }
    }

    Fixture {
        graphs,
        data,
        obj2vps,
        objects,
    }
}

fn features(graphs: &NavGraphs) -> InMemoryFeatureStore {
    let mut store = InMemoryFeatureStore::new();
    for scan in graphs.scans() {
        let Some(scene) = graphs.get(scan) else {
            continue;
        };
        for (i, vp) in scene.viewpoints().enumerate() {
            let views = (0..VIEW_COUNT)
                .map(|v| {
                    (0..VISUAL_DIM)
                        .map(|d| ((i * 31 + v * 7 + d) % 97) as f32 / 97.0)
                        .collect()
                })
                .collect();
            store.insert(scan, vp, views);
        }
    }
    store
}

fn build_env(
    fixture: &Fixture,
    config: EnvConfig,
) -> Result<ReverieNavBatch<GraphSimulator, InMemoryFeatureStore>, EnvError> {
    let camera = config.camera.clone();
    let sim_graphs = fixture.graphs.clone();
    ReverieNavBatch::new(
        config,
        fixture.data.clone(),
        fixture.graphs.clone(),
        fixture.obj2vps.clone(),
        features(&fixture.graphs),
        Box::new(LegacyObjectSource::new(fixture.objects.clone())),
        move || GraphSimulator::new(sim_graphs.clone(), &camera),
    )
}

fn harness_config(batch_size: usize) -> EnvConfig {
    EnvConfig {
        batch_size,
        seed: SEED,
        name: Some("simtest".to_string()),
        ..EnvConfig::default()
    }
}

// ── 1. Graphs ───────────────────────────────────────────────────────────

fn validate_graphs(fixture: &Fixture, verbose: bool) -> Vec<TestResult> {
    println!("--- Graphs ---");
    let mut results = Vec::new();

    let mut asymmetric = 0;
    let mut bad_sums = 0;
    let mut bad_ends = 0;
    let mut pairs = 0;

    for scan in fixture.graphs.scans() {
        let Some(scene) = fixture.graphs.get(scan) else {
            continue;
        };
        let viewpoints: Vec<&str> = scene.viewpoints().collect();
        for &a in &viewpoints {
            for &b in &viewpoints {
                let (Some(ab), Some(ba)) = (scene.distance(a, b), scene.distance(b, a)) else {
                    continue;
                };
                pairs += 1;
                if (ab - ba).abs() > 1e-9 {
                    asymmetric += 1;
                }
                let Some(path) = scene.shortest_path(a, b) else {
                    bad_ends += 1;
                    continue;
                };
                if path.first().map(String::as_str) != Some(a)
                    || path.last().map(String::as_str) != Some(b)
                {
                    bad_ends += 1;
                }
                let sum: f64 = path
                    .windows(2)
                    .map(|w| scene.edge_weight(&w[0], &w[1]).unwrap_or(f64::NAN))
                    .sum();
                if !((sum - ab).abs() < 1e-6) {
                    bad_sums += 1;
                }
            }
        }
        if verbose {
            println!("  {}: {} viewpoints", scan, viewpoints.len());
        }
    }

    results.push(TestResult {
        name: "graph_distance_symmetric".into(),
        passed: asymmetric == 0 && pairs > 0,
        detail: format!("{} reachable pairs, {} asymmetric", pairs, asymmetric),
    });
    results.push(TestResult {
        name: "graph_path_endpoints".into(),
        passed: bad_ends == 0,
        detail: format!("{} paths with wrong endpoints", bad_ends),
    });
    results.push(TestResult {
        name: "graph_path_sums".into(),
        passed: bad_sums == 0,
        detail: format!("{} paths whose edge sum differs from the distance", bad_sums),
    });

    results
}

// ── 2. Candidates ───────────────────────────────────────────────────────

fn validate_candidates(fixture: &Fixture, _verbose: bool) -> Vec<TestResult> {
    println!("--- Candidates ---");
    let mut results = Vec::new();

    let config = harness_config(1);
    let store = features(&fixture.graphs);
    let mut resolver = CandidateResolver::new(
        GraphSimulator::new(fixture.graphs.clone(), &config.camera),
        config.angle_feat_size,
    );

    let mut checked = 0;
    let mut errors = Vec::new();
    let mut duplicated = 0;
    let mut mismatched = 0;
    let mut unstable = 0;

    for scan in fixture.graphs.scans() {
        let Some(scene) = fixture.graphs.get(scan) else {
            continue;
        };
        for vp in scene.viewpoints().take(CANDIDATE_SAMPLE) {
            let feats = match store.image_feature(scan, vp) {
                Ok(f) => f,
                Err(e) => {
                    errors.push(e.to_string());
                    continue;
                }
            };
            let view_index = (checked * 5) % VIEW_COUNT;
            let first = resolver.resolve(&feats, scan, vp, view_index);
            let again = resolver.resolve(&feats, scan, vp, view_index);
            let (first, again) = match (first, again) {
                (Ok(f), Ok(a)) => (f, a),
                (Err(e), _) | (_, Err(e)) => {
                    errors.push(e.to_string());
                    continue;
                }
            };
            checked += 1;

            if first != again {
                unstable += 1;
            }
            let ids: HashSet<&str> = first.iter().map(|c| c.viewpoint_id.as_str()).collect();
            if ids.len() != first.len() {
                duplicated += 1;
            }
            let neighbours: HashSet<&str> = scene.neighbors(vp).into_iter().map(|(n, _)| n).collect();
            if ids != neighbours {
                mismatched += 1;
            }
        }
    }

    results.push(TestResult {
        name: "candidates_resolve".into(),
        passed: errors.is_empty() && checked > 0,
        detail: match errors.first() {
            Some(e) => format!("{} failures, first: {}", errors.len(), e),
            None => format!("{} viewpoints resolved", checked),
        },
    });
    results.push(TestResult {
        name: "candidates_cache_idempotent".into(),
        passed: unstable == 0,
        detail: format!(
            "{} of {} cache hits differ from the miss ({} cached)",
            unstable,
            checked,
            resolver.cache().len()
        ),
    });
    results.push(TestResult {
        name: "candidates_unique_targets".into(),
        passed: duplicated == 0,
        detail: format!("{} lists with a repeated target", duplicated),
    });
    results.push(TestResult {
        name: "candidates_cover_neighbours".into(),
        passed: mismatched == 0,
        detail: format!("{} lists differ from the graph neighbours", mismatched),
    });

    results
}

// ── 3. Minibatches ──────────────────────────────────────────────────────

fn validate_minibatches(fixture: &Fixture, _verbose: bool) -> Vec<TestResult> {
    println!("--- Minibatches ---");
    let mut results = Vec::new();

    let mut env = match build_env(fixture, harness_config(BATCH_SIZE)) {
        Ok(env) => env,
        Err(e) => {
            results.push(TestResult {
                name: "minibatch_env".into(),
                passed: false,
                detail: format!("environment construction failed: {}", e),
            });
            return results;
        }
    };

    let size = env.size();
    let mut wrong_sizes = Vec::new();
    let mut cursor_ok = true;
    for request in [1, BATCH_SIZE, size, 3 * size + 1] {
        match env.next_minibatch(request) {
            Ok(batch) if batch.len() == request => {}
            Ok(batch) => wrong_sizes.push(format!("{} -> {}", request, batch.len())),
            Err(e) => wrong_sizes.push(format!("{} -> {}", request, e)),
        }
        cursor_ok &= env.cursor() < size;
    }
    results.push(TestResult {
        name: "minibatch_exact_size".into(),
        passed: wrong_sizes.is_empty(),
        detail: if wrong_sizes.is_empty() {
            format!("all requests filled from {} instructions", size)
        } else {
            wrong_sizes.join(", ")
        },
    });
    results.push(TestResult {
        name: "minibatch_cursor_in_range".into(),
        passed: cursor_ok,
        detail: "cursor stays below dataset size".into(),
    });

    // One full epoch visits every instruction exactly once
    env.reset_epoch(true);
    let mut seen = HashSet::new();
    let mut repeats = 0;
    for _ in 0..size {
        if let Ok(batch) = env.next_minibatch(1) {
            for item in batch {
                if !seen.insert(item.instr_id.clone()) {
                    repeats += 1;
                }
            }
        }
    }
    results.push(TestResult {
        name: "minibatch_epoch_coverage".into(),
        passed: seen.len() == size && repeats == 0,
        detail: format!("{} of {} seen, {} repeats", seen.len(), size, repeats),
    });

    results
}

// ── 4. Episodes & metrics ───────────────────────────────────────────────

/// Rotate toward the next hop's best view one step at a time, then move.
fn oracle_action(graphs: &NavGraphs, ob: &Observation) -> Action {
    if ob.distance == 0.0 {
        return Action::stay();
    }
    let Some(scene) = graphs.get(&ob.scan) else {
        return Action::stay();
    };
    let target = ob
        .gt_end_vps
        .iter()
        .filter_map(|g| scene.distance(&ob.viewpoint, g).map(|d| (d, g)))
        .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    let Some((_, target)) = target else {
        return Action::stay();
    };
    let Some(next) = scene
        .shortest_path(&ob.viewpoint, target)
        .and_then(|p| p.get(1).cloned())
    else {
        return Action::stay();
    };
    let Some(c) = ob.candidate.iter().find(|c| c.viewpoint_id == next) else {
        return Action::stay();
    };

    let dh = (c.point_id % HEADING_COUNT + HEADING_COUNT - ob.view_index % HEADING_COUNT)
        % HEADING_COUNT;
    let heading = match dh {
        0 => 0.0,
        1..=6 => 1.0,
        _ => -1.0,
    };
    let elevation = match (c.point_id / HEADING_COUNT).cmp(&(ob.view_index / HEADING_COUNT)) {
        std::cmp::Ordering::Greater => 1.0,
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
    };
    if heading == 0.0 && elevation == 0.0 {
        Action::move_to(c.nav_index)
    } else {
        Action::turn(heading, elevation)
    }
}

fn validate_episodes(fixture: &Fixture, verbose: bool) -> Vec<TestResult> {
    println!("--- Episodes & Metrics ---");
    let mut results = Vec::new();

    let mut env = match build_env(fixture, harness_config(BATCH_SIZE)) {
        Ok(env) => env,
        Err(e) => {
            results.push(TestResult {
                name: "episode_env".into(),
                passed: false,
                detail: format!("environment construction failed: {}", e),
            });
            return results;
        }
    };

    let batches = env.size().div_ceil(BATCH_SIZE);
    let mut preds: Vec<Prediction> = Vec::new();
    let mut stay_preds: Vec<Prediction> = Vec::new();
    let mut failures = Vec::new();
    let mut unfinished = 0;
    let mut distance_increases = 0;
    let mut observations = 0;

    for _ in 0..batches {
        let mut obs = match env.reset() {
            Ok(obs) => obs,
            Err(e) => {
                failures.push(e.to_string());
                break;
            }
        };
        observations += obs.len();
        let mut trajectories: Vec<Vec<Vec<String>>> = obs
            .iter()
            .map(|ob| vec![vec![ob.viewpoint.clone()]])
            .collect();
        stay_preds.extend(obs.iter().map(|ob| Prediction {
            instr_id: ob.instr_id.clone(),
            trajectory: vec![vec![ob.viewpoint.clone()]],
            pred_objid: None,
        }));

        for _ in 0..MAX_STEPS {
            if obs.iter().all(|ob| ob.distance == 0.0) {
                break;
            }
            let actions: Vec<Action> = obs
                .iter()
                .map(|ob| oracle_action(env.graphs(), ob))
                .collect();
            let next = match env.step(&actions) {
                Ok(next) => next,
                Err(e) => {
                    failures.push(e.to_string());
                    break;
                }
            };
            observations += next.len();
            for (i, (before, after)) in obs.iter().zip(&next).enumerate() {
                if after.distance > before.distance + 1e-9 {
                    distance_increases += 1;
                }
                if after.viewpoint != before.viewpoint {
                    trajectories[i].push(vec![after.viewpoint.clone()]);
                }
            }
            obs = next;
        }

        unfinished += obs.iter().filter(|ob| ob.distance != 0.0).count();
        for (ob, trajectory) in obs.iter().zip(trajectories) {
            // Minibatches wrap; keep one prediction per instruction
            if preds.iter().any(|p| p.instr_id == ob.instr_id) {
                continue;
            }
            preds.push(Prediction {
                instr_id: ob.instr_id.clone(),
                trajectory,
                pred_objid: ob.gt_obj_id.clone(),
            });
        }
    }

    results.push(TestResult {
        name: "episode_steps".into(),
        passed: failures.is_empty(),
        detail: match failures.first() {
            Some(e) => format!("{} failures, first: {}", failures.len(), e),
            None => format!("{} observations assembled", observations),
        },
    });
    results.push(TestResult {
        name: "episode_reaches_goal".into(),
        passed: unfinished == 0,
        detail: format!("{} episodes unfinished after {} steps", unfinished, MAX_STEPS),
    });
    results.push(TestResult {
        name: "episode_distance_monotone".into(),
        passed: distance_increases == 0,
        detail: format!("{} steps moved away from the goal", distance_increases),
    });

    match env.eval_metrics(&preds) {
        Ok((summary, scores)) => {
            if verbose {
                println!(
                    "  oracle: sr {:.1} spl {:.1} rgs {:.1} over {} episodes, mean length {:.2} m",
                    summary.sr,
                    summary.spl,
                    summary.rgs,
                    scores.len(),
                    summary.lengths
                );
                println!(
                    "  summary: {}",
                    serde_json::to_string(&summary).unwrap_or_default()
                );
            }
            results.push(TestResult {
                name: "metrics_oracle_success".into(),
                passed: summary.sr == 100.0 && summary.oracle_sr == 100.0,
                detail: format!("sr {:.1}, oracle sr {:.1}", summary.sr, summary.oracle_sr),
            });
            // Turns cost nothing, so the oracle's path is optimal
            results.push(TestResult {
                name: "metrics_oracle_spl".into(),
                passed: (summary.spl - 100.0).abs() < 1e-6,
                detail: format!("spl {:.4}", summary.spl),
            });
            results.push(TestResult {
                name: "metrics_oracle_grounding".into(),
                passed: summary.rgs == 100.0 && (summary.rgspl - summary.spl).abs() < 1e-6,
                detail: format!("rgs {:.1}, rgspl {:.1}", summary.rgs, summary.rgspl),
            });
        }
        Err(e) => results.push(TestResult {
            name: "metrics_oracle".into(),
            passed: false,
            detail: format!("evaluation failed: {}", e),
        }),
    }

    // Staying put never succeeds: every start is at least 3 hops out
    let mut seen = HashSet::new();
    stay_preds.retain(|p| seen.insert(p.instr_id.clone()));
    match env.eval_metrics(&stay_preds) {
        Ok((summary, _)) => results.push(TestResult {
            name: "metrics_stay_fails".into(),
            passed: summary.sr == 0.0 && summary.spl == 0.0 && summary.rgs == 0.0,
            detail: format!("sr {:.1}, spl {:.1}", summary.sr, summary.spl),
        }),
        Err(e) => results.push(TestResult {
            name: "metrics_stay_fails".into(),
            passed: false,
            detail: format!("evaluation failed: {}", e),
        }),
    }

    // A trajectory that starts elsewhere is rejected
    let unanchored = preds.first().map(|p| Prediction {
        instr_id: p.instr_id.clone(),
        trajectory: vec![vec!["nowhere".to_string()]],
        pred_objid: None,
    });
    let rejected = match unanchored {
        Some(p) => matches!(
            env.eval_metrics(&[p]),
            Err(EnvError::UnanchoredTrajectory { .. })
        ),
        None => false,
    };
    results.push(TestResult {
        name: "metrics_reject_unanchored".into(),
        passed: rejected,
        detail: "trajectory must start at the ground-truth start".into(),
    });

    results
}
