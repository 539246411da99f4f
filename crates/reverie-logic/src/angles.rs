//! Discretized view geometry and the angle encoding.
//!
//! A panorama is split into 36 views: 12 headings (30° apart, clockwise from
//! view 0) times 3 elevation bands. Views 0–11 look down (−30°), 12–23 at
//! the horizon and 24–35 up (+30°).

/// Number of discretized views per panorama.
pub const VIEW_COUNT: usize = 36;
/// Headings per elevation band.
pub const HEADING_COUNT: usize = 12;
/// Elevation bands (down, horizon, up).
pub const ELEVATION_COUNT: usize = 3;
/// Rotation step between neighbouring views (30°).
pub const ANGLE_INCREMENT: f64 = std::f64::consts::FRAC_PI_6;

/// Heading of the centre of a discretized view.
pub fn view_heading(view_index: usize) -> f64 {
    (view_index % HEADING_COUNT) as f64 * ANGLE_INCREMENT
}

/// Elevation of the centre of a discretized view.
pub fn view_elevation(view_index: usize) -> f64 {
    ((view_index / HEADING_COUNT) as f64 - 1.0) * ANGLE_INCREMENT
}

/// View index whose centre is nearest to (heading, elevation).
pub fn view_index_of(heading: f64, elevation: f64) -> usize {
    let heading_step =
        ((heading / ANGLE_INCREMENT).round() as i64).rem_euclid(HEADING_COUNT as i64) as usize;
    let elevation_step = ((elevation / ANGLE_INCREMENT).round() as i64).clamp(-1, 1);
    (elevation_step + 1) as usize * HEADING_COUNT + heading_step
}

/// Euclidean norm of a relative (heading, elevation) offset.
pub fn angular_distance(rel_heading: f64, rel_elevation: f64) -> f64 {
    (rel_heading * rel_heading + rel_elevation * rel_elevation).sqrt()
}

/// Encode a heading/elevation pair as `[sin h, cos h, sin e, cos e]`
/// repeated `size / 4` times.
pub fn angle_feature(heading: f64, elevation: f64, size: usize) -> Vec<f32> {
    let unit = [
        heading.sin() as f32,
        heading.cos() as f32,
        elevation.sin() as f32,
        elevation.cos() as f32,
    ];
    let mut out = Vec::with_capacity(size);
    for _ in 0..size / 4 {
        out.extend_from_slice(&unit);
    }
    out
}

/// Angle encodings of all 36 views as seen from each of the 36 base views.
///
/// `get(base, view)` is the encoding of `view`'s centre relative to
/// `base`'s centre. Built once per environment.
#[derive(Debug, Clone)]
pub struct AngleFeatureTable {
    size: usize,
    rows: Vec<Vec<Vec<f32>>>,
}

impl AngleFeatureTable {
    pub fn new(size: usize) -> Self {
        let rows = (0..VIEW_COUNT)
            .map(|base| {
                let base_heading = view_heading(base);
                let base_elevation = view_elevation(base);
                (0..VIEW_COUNT)
                    .map(|view| {
                        angle_feature(
                            view_heading(view) - base_heading,
                            view_elevation(view) - base_elevation,
                            size,
                        )
                    })
                    .collect()
            })
            .collect();
        Self { size, rows }
    }

    /// Encoding width.
    pub fn size(&self) -> usize {
        self.size
    }

    /// All 36 encodings relative to `base_view`.
    pub fn row(&self, base_view: usize) -> &[Vec<f32>] {
        &self.rows[base_view % VIEW_COUNT]
    }

    pub fn get(&self, base_view: usize, view: usize) -> &[f32] {
        &self.row(base_view)[view % VIEW_COUNT]
    }
}
