//! Object annotations and per-observation object features.
//!
//! Two concerns live here:
//!
//! - **Visibility index**: which viewpoints can see which object. Either
//!   loaded ready-made (`{scan_objId: [viewpoint, ...]}`) or derived from the
//!   per-viewpoint bounding-box annotations plus object and viewpoint
//!   positions: an object counts as visible from a viewpoint when it has at
//!   least one visible box there and lies within [`VISIBILITY_RADIUS`].
//! - **Object features**: the `(image, angle, box)` feature triple attached
//!   to every observation, provided by an [`ObjectFeatureSource`]. The
//!   source is chosen once when the environment is built.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::angles::{angle_feature, view_elevation, view_heading, view_index_of};
use crate::error::EnvError;

/// Maximum viewpoint-to-object distance (metres) for visibility.
pub const VISIBILITY_RADIUS: f64 = 3.0;
/// Precomputed detections are kept only for views below this index.
pub const VISIBLE_POS_LIMIT: usize = 25;
/// Image size the bounding boxes refer to.
pub const IMAGE_WIDTH: f32 = 640.0;
pub const IMAGE_HEIGHT: f32 = 480.0;

// ── Object features ─────────────────────────────────────────────────────

/// Object features of one observation; all four vectors have equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectFeatures {
    pub img_fts: Vec<Vec<f32>>,
    pub ang_fts: Vec<Vec<f32>>,
    /// `[height / 480, width / 640, area fraction]` per object.
    pub box_fts: Vec<[f32; 3]>,
    pub obj_ids: Vec<String>,
}

impl ObjectFeatures {
    pub fn len(&self) -> usize {
        self.obj_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obj_ids.is_empty()
    }

    fn truncate(&mut self, max_objects: Option<usize>) {
        if let Some(max) = max_objects {
            self.img_fts.truncate(max);
            self.ang_fts.truncate(max);
            self.box_fts.truncate(max);
            self.obj_ids.truncate(max);
        }
    }
}

/// Box feature from a box size in pixels.
pub fn box_feature_from_size(width: f32, height: f32) -> [f32; 3] {
    let h = height / IMAGE_HEIGHT;
    let w = width / IMAGE_WIDTH;
    [h, w, h * w]
}

/// Box feature from `[x1, y1, x2, y2]` corners.
pub fn box_feature_from_corners(bbox: [f32; 4]) -> Result<[f32; 3], EnvError> {
    let w = bbox[2] - bbox[0];
    let h = bbox[3] - bbox[1];
    if !(w > 0.0 && h > 0.0) {
        return Err(EnvError::DegenerateBox(bbox));
    }
    Ok([
        h / IMAGE_HEIGHT,
        w / IMAGE_WIDTH,
        w * h / (IMAGE_WIDTH * IMAGE_HEIGHT),
    ])
}

/// Supplies the object feature triple for an observation.
pub trait ObjectFeatureSource {
    /// Objects visible at (scan, viewpoint), with angle features relative to
    /// the camera's `heading`/`elevation`.
    fn object_features(
        &self,
        scan: &str,
        viewpoint: &str,
        heading: f64,
        elevation: f64,
        angle_feat_size: usize,
        max_objects: Option<usize>,
    ) -> Result<ObjectFeatures, EnvError>;
}

/// A stored detection: feature, direction and pixel size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    pub obj_id: String,
    pub feature: Vec<f32>,
    pub heading: f64,
    pub elevation: f64,
    pub width: f32,
    pub height: f32,
}

/// Per-call lookup of stored detections.
pub trait ObjectFeatureDb {
    /// Detections at a location; an empty list when there are none.
    fn detections(&self, scan: &str, viewpoint: &str) -> Result<Vec<ObjectDetection>, EnvError>;
}

/// Detections held in memory under `"{scan}_{viewpoint}"`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectDb {
    detections: HashMap<String, Vec<ObjectDetection>>,
}

impl InMemoryObjectDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scan: &str, viewpoint: &str, detection: ObjectDetection) {
        self.detections
            .entry(format!("{}_{}", scan, viewpoint))
            .or_default()
            .push(detection);
    }
}

impl ObjectFeatureDb for InMemoryObjectDb {
    fn detections(&self, scan: &str, viewpoint: &str) -> Result<Vec<ObjectDetection>, EnvError> {
        Ok(self
            .detections
            .get(&format!("{}_{}", scan, viewpoint))
            .cloned()
            .unwrap_or_default())
    }
}

/// Object features computed per call from an [`ObjectFeatureDb`].
pub struct LegacyObjectSource<D> {
    db: D,
}

impl<D: ObjectFeatureDb> LegacyObjectSource<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }
}

impl<D: ObjectFeatureDb> ObjectFeatureSource for LegacyObjectSource<D> {
    fn object_features(
        &self,
        scan: &str,
        viewpoint: &str,
        heading: f64,
        elevation: f64,
        angle_feat_size: usize,
        max_objects: Option<usize>,
    ) -> Result<ObjectFeatures, EnvError> {
        let mut detections = self.db.detections(scan, viewpoint)?;
        if let Some(max) = max_objects {
            detections.truncate(max);
        }

        let mut out = ObjectFeatures::default();
        for det in detections {
            out.ang_fts.push(angle_feature(
                det.heading - heading,
                det.elevation - elevation,
                angle_feat_size,
            ));
            out.box_fts.push(box_feature_from_size(det.width, det.height));
            out.img_fts.push(det.feature);
            out.obj_ids.push(det.obj_id);
        }
        Ok(out)
    }
}

/// One precomputed object entry: a feature and its boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedObject {
    pub features: Vec<f32>,
    pub boxes: Vec<[f32; 4]>,
}

/// `scan → viewpoint → visible view index → objId → object`.
pub type PrecomputedObjects =
    HashMap<String, HashMap<String, BTreeMap<usize, BTreeMap<String, PrecomputedObject>>>>;

/// Object features read from a precomputed map.
///
/// Angle features come from the view the object was seen in, relative to
/// the camera's current view. Locations missing from the map produce empty
/// features.
pub struct PrecomputedObjectSource {
    objects: PrecomputedObjects,
}

impl PrecomputedObjectSource {
    pub fn new(objects: PrecomputedObjects) -> Self {
        Self { objects }
    }

    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

impl ObjectFeatureSource for PrecomputedObjectSource {
    fn object_features(
        &self,
        scan: &str,
        viewpoint: &str,
        heading: f64,
        elevation: f64,
        angle_feat_size: usize,
        max_objects: Option<usize>,
    ) -> Result<ObjectFeatures, EnvError> {
        let Some(by_view) = self.objects.get(scan).and_then(|s| s.get(viewpoint)) else {
            log::warn!(
                "No precomputed objects for {}_{}; using empty features",
                scan,
                viewpoint
            );
            return Ok(ObjectFeatures::default());
        };

        let base = view_index_of(heading, elevation);
        let (base_heading, base_elevation) = (view_heading(base), view_elevation(base));

        let mut out = ObjectFeatures::default();
        for (&vis_pos, objects) in by_view.range(..VISIBLE_POS_LIMIT) {
            let ang = angle_feature(
                view_heading(vis_pos) - base_heading,
                view_elevation(vis_pos) - base_elevation,
                angle_feat_size,
            );
            for (obj_id, obj) in objects {
                let Some(&bbox) = obj.boxes.first() else {
                    continue;
                };
                out.box_fts.push(box_feature_from_corners(bbox)?);
                out.img_fts.push(obj.features.clone());
                out.ang_fts.push(ang.clone());
                out.obj_ids.push(obj_id.clone());
            }
        }
        out.truncate(max_objects);
        Ok(out)
    }
}

// ── Visibility index ────────────────────────────────────────────────────

fn object_key(scan: &str, obj_id: &str) -> String {
    format!("{}_{}", scan, obj_id)
}

/// `"{scan}_{objId}"` → viewpoints from which the object is visible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectViewpointIndex {
    map: HashMap<String, Vec<String>>,
}

impl ObjectViewpointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a ready-made `{scan_objId: [viewpoint, ...]}` document.
    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, EnvError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Record that `obj_id` is visible from `viewpoint`; duplicates are ignored.
    pub fn insert(&mut self, scan: &str, obj_id: &str, viewpoint: &str) {
        let vps = self.map.entry(object_key(scan, obj_id)).or_default();
        if !vps.iter().any(|v| v == viewpoint) {
            vps.push(viewpoint.to_string());
        }
    }

    pub fn get(&self, scan: &str, obj_id: &str) -> Option<&[String]> {
        self.map.get(&object_key(scan, obj_id)).map(|v| v.as_slice())
    }

    /// Viewpoints of a goal object; a missing or empty entry is an error.
    pub fn goal_viewpoints(&self, scan: &str, obj_id: &str) -> Result<&[String], EnvError> {
        match self.get(scan, obj_id) {
            Some(vps) if !vps.is_empty() => Ok(vps),
            _ => Err(EnvError::MissingGoalViewpoints(object_key(scan, obj_id))),
        }
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Bounding boxes of one object in one panorama.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BboxAnnotation {
    pub bbox2d: Vec<[f32; 4]>,
    pub visible_pos: Vec<usize>,
}

/// Contents of one `{scan}_{viewpoint}.json` file: `viewpoint → objId → boxes`.
pub type ViewpointAnnotations = HashMap<String, HashMap<String, BboxAnnotation>>;

/// Object positions: `scan → objId → [x, y, z]`.
pub type ObjectPositions = HashMap<String, HashMap<String, [f64; 3]>>;

/// Boxes of nearby visible objects in one panorama, as parallel lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub bbox: Vec<[f32; 4]>,
    pub visible_pos: Vec<usize>,
    pub obj_ids: Vec<String>,
}

/// Object proposals keyed by `"{scan}_{viewpoint}"`.
pub type ObjectProposals = HashMap<String, Proposal>;

/// Build proposals and the visibility index from bbox annotation files.
///
/// `files` yields `(file stem, contents)` where the stem is
/// `"{scan}_{viewpoint}"`. `viewpoint_positions` is keyed the same way.
pub fn build_object_index<I>(
    files: I,
    object_positions: &ObjectPositions,
    viewpoint_positions: &HashMap<String, [f64; 3]>,
) -> (ObjectProposals, ObjectViewpointIndex)
where
    I: IntoIterator<Item = (String, ViewpointAnnotations)>,
{
    let mut proposals = ObjectProposals::new();
    let mut index = ObjectViewpointIndex::new();

    for (scanvp, annotations) in files {
        let Some(vp_pos) = viewpoint_positions.get(&scanvp) else {
            continue;
        };
        let scan = scanvp.split('_').next().unwrap_or_default();

        // Sorted for a reproducible proposal order
        let mut viewpoints: Vec<_> = annotations.iter().collect();
        viewpoints.sort_by(|a, b| a.0.cmp(b.0));
        for (vp, objects) in viewpoints {
            let mut objects: Vec<_> = objects.iter().collect();
            objects.sort_by(|a, b| a.0.cmp(b.0));
            for (obj_id, info) in objects {
                if info.visible_pos.is_empty() {
                    continue;
                }
                let Some(obj_pos) = object_positions.get(scan).and_then(|m| m.get(obj_id)) else {
                    log::warn!("No position for object {}_{}", scan, obj_id);
                    continue;
                };
                let distance = ((vp_pos[0] - obj_pos[0]).powi(2)
                    + (vp_pos[1] - obj_pos[1]).powi(2)
                    + (vp_pos[2] - obj_pos[2]).powi(2))
                .sqrt();
                if distance > VISIBILITY_RADIUS {
                    continue;
                }

                index.insert(scan, obj_id, vp);
                let proposal = proposals.entry(scanvp.clone()).or_default();
                for (bbox, &pos) in info.bbox2d.iter().zip(&info.visible_pos) {
                    proposal.bbox.push(*bbox);
                    proposal.visible_pos.push(pos);
                    proposal.obj_ids.push(obj_id.clone());
                }
            }
        }
    }

    (proposals, index)
}

/// Read every `*.json` file under `bbox_dir` and build the index.
pub fn load_object_index(
    bbox_dir: &Path,
    object_positions: &ObjectPositions,
    viewpoint_positions: &HashMap<String, [f64; 3]>,
) -> Result<(ObjectProposals, ObjectViewpointIndex), EnvError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(bbox_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let annotations: ViewpointAnnotations =
            serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        files.push((stem.to_string(), annotations));
    }

    let (proposals, index) = build_object_index(files, object_positions, viewpoint_positions);
    log::info!(
        "Loaded object proposals for {} viewpoints, {} objects indexed",
        proposals.len(),
        index.len()
    );
    Ok((proposals, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_features() {
        let f = box_feature_from_size(320.0, 240.0);
        assert_eq!(f, [0.5, 0.5, 0.25]);
        let g = box_feature_from_corners([10.0, 20.0, 330.0, 260.0]).unwrap();
        assert_eq!(g, [0.5, 0.5, 0.25]);
        assert!(matches!(
            box_feature_from_corners([5.0, 5.0, 5.0, 9.0]),
            Err(EnvError::DegenerateBox(_))
        ));
    }

    #[test]
    fn legacy_source_relative_angles_and_cap() {
        let mut db = InMemoryObjectDb::new();
        for (i, h) in [0.5, 1.0, 1.5].iter().enumerate() {
            db.insert(
                "S",
                "v",
                ObjectDetection {
                    obj_id: format!("{}", i),
                    feature: vec![i as f32],
                    heading: *h,
                    elevation: 0.0,
                    width: 64.0,
                    height: 48.0,
                },
            );
        }
        let source = LegacyObjectSource::new(db);
        let fts = source
            .object_features("S", "v", 0.5, 0.0, 4, Some(2))
            .unwrap();
        assert_eq!(fts.len(), 2);
        assert_eq!(fts.ang_fts[0], vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(fts.box_fts[0], [0.1, 0.1, 0.1 * 0.1]);
        assert_eq!(fts.obj_ids, vec!["0".to_string(), "1".to_string()]);

        let empty = source
            .object_features("S", "nowhere", 0.0, 0.0, 4, None)
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn precomputed_source_filters_and_orients() {
        let json = r#"{"S": {"v": {
            "12": {"7": {"features": [1.0, 2.0], "boxes": [[0, 0, 64, 48]]}},
            "30": {"8": {"features": [3.0, 4.0], "boxes": [[0, 0, 64, 48]]}}
        }}}"#;
        let source = PrecomputedObjectSource::from_json_str(json).unwrap();
        // Camera at view 12: object seen in view 12 is straight ahead
        let fts = source
            .object_features("S", "v", 0.0, 0.0, 4, None)
            .unwrap();
        assert_eq!(fts.obj_ids, vec!["7".to_string()]);
        assert_eq!(fts.ang_fts[0], vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(fts.img_fts[0], vec![1.0, 2.0]);

        let missing = source
            .object_features("S", "w", 0.0, 0.0, 4, None)
            .unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn index_json_and_goal_lookup() {
        let index =
            ObjectViewpointIndex::from_json_str(r#"{"S_17": ["a", "b"], "S_18": []}"#).unwrap();
        assert_eq!(index.goal_viewpoints("S", "17").unwrap().len(), 2);
        assert!(matches!(
            index.goal_viewpoints("S", "18"),
            Err(EnvError::MissingGoalViewpoints(_))
        ));
        assert!(index.goal_viewpoints("S", "99").is_err());
    }

    #[test]
    fn build_index_uses_radius_and_visibility() {
        let annotations: ViewpointAnnotations = serde_json::from_str(
            r#"{"v1": {
                "near": {"bbox2d": [[0, 0, 10, 10], [5, 5, 20, 20]], "visible_pos": [3, 15]},
                "far":  {"bbox2d": [[0, 0, 10, 10]], "visible_pos": [4]},
                "hidden": {"bbox2d": [], "visible_pos": []}
            }}"#,
        )
        .unwrap();
        let mut objpos = ObjectPositions::new();
        objpos.insert(
            "S".into(),
            HashMap::from([
                ("near".to_string(), [1.0, 0.0, 0.0]),
                ("far".to_string(), [10.0, 0.0, 0.0]),
                ("hidden".to_string(), [0.0, 0.0, 0.0]),
            ]),
        );
        let vppos = HashMap::from([("S_v1".to_string(), [0.0, 0.0, 0.0])]);

        let (proposals, index) =
            build_object_index(vec![("S_v1".to_string(), annotations)], &objpos, &vppos);

        assert_eq!(index.get("S", "near").unwrap(), &["v1".to_string()][..]);
        assert!(index.get("S", "far").is_none());
        assert!(index.get("S", "hidden").is_none());
        let p = &proposals["S_v1"];
        assert_eq!(p.visible_pos, vec![3, 15]);
        assert_eq!(p.obj_ids, vec!["near".to_string(), "near".to_string()]);
    }
}
