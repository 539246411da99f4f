//! Scene navigation graphs and all-pairs shortest paths.
//!
//! `SceneGraph` holds the undirected, distance-weighted viewpoint graph of
//! one scan together with its all-pairs Dijkstra tables. Tables are built
//! once at construction and never updated; `NavGraphs` groups the graphs of
//! every scan an environment touches.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::path::Path;

use crate::connectivity::{load_connectivity, ConnectivityNode};
use crate::error::EnvError;

#[derive(Clone, Copy, Debug)]
struct DijkstraState {
    cost: f64,
    node: usize,
}

impl PartialEq for DijkstraState {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DijkstraState {}

impl Ord for DijkstraState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; lower node index wins on equal cost
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for DijkstraState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-source Dijkstra. Returns (distance, predecessor) per node.
fn dijkstra(adj: &[Vec<(usize, f64)>], source: usize) -> (Vec<f64>, Vec<Option<usize>>) {
    let n = adj.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev = vec![None; n];
    dist[source] = 0.0;

    let mut heap = BinaryHeap::new();
    heap.push(DijkstraState {
        cost: 0.0,
        node: source,
    });

    while let Some(DijkstraState { cost, node }) = heap.pop() {
        if cost > dist[node] {
            continue;
        }
        for &(next, weight) in &adj[node] {
            let candidate = cost + weight;
            if candidate < dist[next] {
                dist[next] = candidate;
                prev[next] = Some(node);
                heap.push(DijkstraState {
                    cost: candidate,
                    node: next,
                });
            }
        }
    }

    (dist, prev)
}

fn euclidean(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// Navigation graph of one scan with precomputed shortest paths.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    scan: String,
    ids: Vec<String>,
    index: HashMap<String, usize>,
    positions: Vec<[f64; 3]>,
    /// node → list of (neighbor, edge weight)
    adj: Vec<Vec<(usize, f64)>>,
    /// dist[src][dst]
    dist: Vec<Vec<f64>>,
    /// prev[src][node]: predecessor of `node` on the shortest path from `src`
    prev: Vec<Vec<Option<usize>>>,
}

impl SceneGraph {
    /// Build from connectivity records.
    ///
    /// Only `included` records become nodes. An edge exists when both ends
    /// are included and `unobstructed` is set; the matrix must be symmetric.
    pub fn from_connectivity(scan: &str, nodes: &[ConnectivityNode]) -> Result<Self, EnvError> {
        let mut viewpoints = Vec::new();
        for node in nodes.iter().filter(|n| n.included) {
            viewpoints.push((node.image_id.clone(), node.position(scan)?));
        }

        let mut edges = Vec::new();
        for (i, item) in nodes.iter().enumerate() {
            if !item.included {
                continue;
            }
            for (j, &conn) in item.unobstructed.iter().enumerate() {
                if !conn || i == j {
                    continue;
                }
                let Some(other) = nodes.get(j) else {
                    continue;
                };
                if !other.included {
                    continue;
                }
                if !other.unobstructed.get(i).copied().unwrap_or(false) {
                    return Err(EnvError::AsymmetricAdjacency {
                        scan: scan.to_string(),
                        from: item.image_id.clone(),
                        to: other.image_id.clone(),
                    });
                }
                if i < j {
                    edges.push((item.image_id.clone(), other.image_id.clone()));
                }
            }
        }

        Self::from_viewpoints(scan, &viewpoints, &edges)
    }

    /// Build directly from positioned viewpoints and undirected edges.
    pub fn from_viewpoints(
        scan: &str,
        viewpoints: &[(String, [f64; 3])],
        edges: &[(String, String)],
    ) -> Result<Self, EnvError> {
        let mut ids = Vec::with_capacity(viewpoints.len());
        let mut index = HashMap::with_capacity(viewpoints.len());
        let mut positions = Vec::with_capacity(viewpoints.len());
        for (id, pos) in viewpoints {
            if index.contains_key(id) {
                continue;
            }
            index.insert(id.clone(), ids.len());
            ids.push(id.clone());
            positions.push(*pos);
        }

        let lookup = |vp: &str| {
            index
                .get(vp)
                .copied()
                .ok_or_else(|| EnvError::UnknownViewpoint {
                    scan: scan.to_string(),
                    viewpoint: vp.to_string(),
                })
        };

        let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); ids.len()];
        for (a, b) in edges {
            let (ia, ib) = (lookup(a)?, lookup(b)?);
            if ia == ib || adj[ia].iter().any(|&(n, _)| n == ib) {
                continue;
            }
            let weight = euclidean(positions[ia], positions[ib]);
            adj[ia].push((ib, weight));
            adj[ib].push((ia, weight));
        }

        let (dist, prev): (Vec<_>, Vec<_>) = (0..ids.len()).map(|src| dijkstra(&adj, src)).unzip();

        Ok(Self {
            scan: scan.to_string(),
            ids,
            index,
            positions,
            adj,
            dist,
            prev,
        })
    }

    pub fn scan(&self) -> &str {
        &self.scan
    }

    /// Number of viewpoints in the graph.
    pub fn viewpoint_count(&self) -> usize {
        self.ids.len()
    }

    pub fn has_viewpoint(&self, viewpoint: &str) -> bool {
        self.index.contains_key(viewpoint)
    }

    /// Viewpoint ids in connectivity-file order.
    pub fn viewpoints(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|s| s.as_str())
    }

    pub fn position(&self, viewpoint: &str) -> Option<[f64; 3]> {
        self.index.get(viewpoint).map(|&i| self.positions[i])
    }

    /// Adjacent viewpoints with their edge weights.
    pub fn neighbors(&self, viewpoint: &str) -> Vec<(&str, f64)> {
        self.index
            .get(viewpoint)
            .map(|&i| {
                self.adj[i]
                    .iter()
                    .map(|&(n, w)| (self.ids[n].as_str(), w))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Weight of the direct edge between two viewpoints, if any.
    pub fn edge_weight(&self, a: &str, b: &str) -> Option<f64> {
        let (&ia, &ib) = (self.index.get(a)?, self.index.get(b)?);
        self.adj[ia]
            .iter()
            .find(|&&(n, _)| n == ib)
            .map(|&(_, w)| w)
    }

    /// Shortest distance, or `None` if either end is unknown or unreachable.
    pub fn distance(&self, from: &str, to: &str) -> Option<f64> {
        let (&i, &j) = (self.index.get(from)?, self.index.get(to)?);
        let d = self.dist[i][j];
        d.is_finite().then_some(d)
    }

    /// Shortest path from `from` to `to`, both ends included.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let (&i, &j) = (self.index.get(from)?, self.index.get(to)?);
        self.path_indices(i, j)
            .map(|p| p.into_iter().map(|n| self.ids[n].clone()).collect())
    }

    /// Shortest paths from `from` to every reachable viewpoint (itself
    /// included), in graph order.
    pub fn paths_from(&self, from: &str) -> Vec<(&str, Vec<&str>)> {
        let Some(&i) = self.index.get(from) else {
            return Vec::new();
        };
        (0..self.ids.len())
            .filter_map(|j| {
                self.path_indices(i, j).map(|p| {
                    (
                        self.ids[j].as_str(),
                        p.into_iter().map(|n| self.ids[n].as_str()).collect(),
                    )
                })
            })
            .collect()
    }

    fn path_indices(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        if !self.dist[from][to].is_finite() {
            return None;
        }
        let mut path = vec![to];
        let mut current = to;
        while current != from {
            current = self.prev[from][current]?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }
}

/// Scene graphs for every scan in use, keyed by scan id.
#[derive(Debug, Clone, Default)]
pub struct NavGraphs {
    scenes: HashMap<String, SceneGraph>,
}

impl NavGraphs {
    /// Load `{dir}/{scan}_connectivity.json` for every scan.
    pub fn load<'a>(
        connectivity_dir: &Path,
        scans: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, EnvError> {
        let scans: Vec<&str> = scans.into_iter().collect();
        log::info!("Loading navigation graphs for {} scans", scans.len());
        let mut scenes = HashMap::with_capacity(scans.len());
        for scan in scans {
            let nodes = load_connectivity(connectivity_dir, scan)?;
            scenes.insert(scan.to_string(), SceneGraph::from_connectivity(scan, &nodes)?);
        }
        Ok(Self { scenes })
    }

    pub fn from_scenes(scenes: impl IntoIterator<Item = SceneGraph>) -> Self {
        Self {
            scenes: scenes
                .into_iter()
                .map(|g| (g.scan.clone(), g))
                .collect(),
        }
    }

    pub fn get(&self, scan: &str) -> Option<&SceneGraph> {
        self.scenes.get(scan)
    }

    /// Like [`get`](Self::get) but a miss is an error.
    pub fn scene(&self, scan: &str) -> Result<&SceneGraph, EnvError> {
        self.scenes
            .get(scan)
            .ok_or_else(|| EnvError::UnknownScan(scan.to_string()))
    }

    /// Scan ids, sorted.
    pub fn scans(&self) -> Vec<&str> {
        let mut scans: Vec<&str> = self.scenes.keys().map(|s| s.as_str()).collect();
        scans.sort_unstable();
        scans
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Every viewpoint position keyed by `"{scan}_{viewpoint}"`.
    pub fn viewpoint_positions(&self) -> HashMap<String, [f64; 3]> {
        let mut out = HashMap::new();
        for (scan, graph) in &self.scenes {
            for (id, pos) in graph.ids.iter().zip(&graph.positions) {
                out.insert(format!("{}_{}", scan, id), *pos);
            }
        }
        out
    }
}
