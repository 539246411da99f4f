//! Panoramic simulator interface and an in-process implementation.
//!
//! The environment only needs three calls from a simulator session:
//! start an episode at a viewpoint, apply a discretized action, and read
//! back the pose plus the navigable locations in the current field of view.
//! [`GraphSimulator`] answers those from the scene graphs alone.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use crate::angles::{angular_distance, ANGLE_INCREMENT, HEADING_COUNT};
use crate::config::CameraConfig;
use crate::error::EnvError;
use crate::pathfinding::NavGraphs;

/// A neighbouring viewpoint visible from the current camera orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigableLocation {
    pub viewpoint_id: String,
    /// Heading offset from the camera centre, in (−π, π].
    pub rel_heading: f64,
    /// Elevation offset from the camera centre.
    pub rel_elevation: f64,
    /// Straight-line distance from the current viewpoint.
    pub rel_distance: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Raw session state as reported by a simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimState {
    pub scan_id: String,
    pub viewpoint_id: String,
    pub heading: f64,
    pub elevation: f64,
    /// Discretized view index in `0..36`.
    pub view_index: usize,
    pub position: [f64; 3],
    /// Entry 0 is always the current viewpoint itself.
    pub navigable_locations: Vec<NavigableLocation>,
}

/// One step for one session: move to navigable location `index` (0 = stay),
/// then rotate by the signs of `heading` and `elevation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub index: usize,
    pub heading: f64,
    pub elevation: f64,
}

impl Action {
    pub fn new(index: usize, heading: f64, elevation: f64) -> Self {
        Self {
            index,
            heading,
            elevation,
        }
    }

    /// Stay in place without turning.
    pub fn stay() -> Self {
        Self::new(0, 0.0, 0.0)
    }

    /// Move to a navigable location keeping the current orientation.
    pub fn move_to(index: usize) -> Self {
        Self::new(index, 0.0, 0.0)
    }

    pub fn turn(heading: f64, elevation: f64) -> Self {
        Self::new(0, heading, elevation)
    }
}

/// A single sequential simulator session.
pub trait Simulator {
    /// Place the agent at a viewpoint with the given orientation.
    fn new_episode(
        &mut self,
        scan: &str,
        viewpoint: &str,
        heading: f64,
        elevation: f64,
    ) -> Result<(), EnvError>;

    /// Apply one discretized action.
    fn make_action(&mut self, index: usize, heading: f64, elevation: f64) -> Result<(), EnvError>;

    /// Current pose and navigable locations.
    fn state(&self) -> Result<SimState, EnvError>;
}

/// Wrap an angle into (−π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a > PI {
        a - TAU
    } else {
        a
    }
}

#[derive(Debug, Clone)]
struct Pose {
    scan: String,
    viewpoint: String,
    /// 0..12, clockwise from north
    heading_step: usize,
    /// −1 (down), 0 (horizon) or 1 (up)
    elevation_step: i32,
}

impl Pose {
    fn heading(&self) -> f64 {
        self.heading_step as f64 * ANGLE_INCREMENT
    }

    fn elevation(&self) -> f64 {
        self.elevation_step as f64 * ANGLE_INCREMENT
    }

    fn view_index(&self) -> usize {
        (self.elevation_step + 1) as usize * HEADING_COUNT + self.heading_step
    }

    fn rotate(&mut self, heading: f64, elevation: f64) {
        if heading > 0.0 {
            self.heading_step = (self.heading_step + 1) % HEADING_COUNT;
        } else if heading < 0.0 {
            self.heading_step = (self.heading_step + HEADING_COUNT - 1) % HEADING_COUNT;
        }
        if elevation > 0.0 {
            self.elevation_step = (self.elevation_step + 1).min(1);
        } else if elevation < 0.0 {
            self.elevation_step = (self.elevation_step - 1).max(-1);
        }
    }
}

/// Discretized-view simulator driven purely by the navigation graphs.
///
/// Headings snap to 30° steps and elevations to {−30°, 0°, 30°}. A graph
/// neighbour is navigable when it lies inside the horizontal field of view.
#[derive(Debug, Clone)]
pub struct GraphSimulator {
    graphs: Arc<NavGraphs>,
    hfov: f64,
    pose: Option<Pose>,
}

impl GraphSimulator {
    pub fn new(graphs: Arc<NavGraphs>, camera: &CameraConfig) -> Self {
        Self {
            graphs,
            hfov: camera.hfov(),
            pose: None,
        }
    }

    fn visible_locations(&self, pose: &Pose) -> Result<Vec<NavigableLocation>, EnvError> {
        let scene = self.graphs.scene(&pose.scan)?;
        let here = scene
            .position(&pose.viewpoint)
            .ok_or_else(|| EnvError::UnknownViewpoint {
                scan: pose.scan.clone(),
                viewpoint: pose.viewpoint.clone(),
            })?;
        let (heading, elevation) = (pose.heading(), pose.elevation());

        let mut visible = Vec::new();
        for (id, _) in scene.neighbors(&pose.viewpoint) {
            let Some(there) = scene.position(id) else {
                continue;
            };
            let (dx, dy, dz) = (there[0] - here[0], there[1] - here[1], there[2] - here[2]);
            let rel_heading = wrap_angle(dx.atan2(dy) - heading);
            if rel_heading.abs() > self.hfov / 2.0 {
                continue;
            }
            let rel_elevation = dz.atan2(dx.hypot(dy)) - elevation;
            visible.push(NavigableLocation {
                viewpoint_id: id.to_string(),
                rel_heading,
                rel_elevation,
                rel_distance: (dx * dx + dy * dy + dz * dz).sqrt(),
                x: there[0],
                y: there[1],
                z: there[2],
            });
        }
        visible.sort_by(|a, b| {
            angular_distance(a.rel_heading, a.rel_elevation)
                .total_cmp(&angular_distance(b.rel_heading, b.rel_elevation))
                .then_with(|| a.viewpoint_id.cmp(&b.viewpoint_id))
        });

        let mut locations = Vec::with_capacity(visible.len() + 1);
        locations.push(NavigableLocation {
            viewpoint_id: pose.viewpoint.clone(),
            rel_heading: 0.0,
            rel_elevation: 0.0,
            rel_distance: 0.0,
            x: here[0],
            y: here[1],
            z: here[2],
        });
        locations.extend(visible);
        Ok(locations)
    }
}

impl Simulator for GraphSimulator {
    fn new_episode(
        &mut self,
        scan: &str,
        viewpoint: &str,
        heading: f64,
        elevation: f64,
    ) -> Result<(), EnvError> {
        let scene = self.graphs.scene(scan)?;
        if !scene.has_viewpoint(viewpoint) {
            return Err(EnvError::UnknownViewpoint {
                scan: scan.to_string(),
                viewpoint: viewpoint.to_string(),
            });
        }
        let heading_step =
            ((heading / ANGLE_INCREMENT).round() as i64).rem_euclid(HEADING_COUNT as i64) as usize;
        let elevation_step = ((elevation / ANGLE_INCREMENT).round() as i32).clamp(-1, 1);
        self.pose = Some(Pose {
            scan: scan.to_string(),
            viewpoint: viewpoint.to_string(),
            heading_step,
            elevation_step,
        });
        Ok(())
    }

    fn make_action(&mut self, index: usize, heading: f64, elevation: f64) -> Result<(), EnvError> {
        let pose = self.pose.as_ref().ok_or(EnvError::NoEpisode)?;
        let next_viewpoint = if index > 0 {
            let locations = self.visible_locations(pose)?;
            let target = locations.get(index).ok_or(EnvError::InvalidAction {
                index,
                available: locations.len(),
            })?;
            Some(target.viewpoint_id.clone())
        } else {
            None
        };

        let pose = self.pose.as_mut().ok_or(EnvError::NoEpisode)?;
        if let Some(vp) = next_viewpoint {
            pose.viewpoint = vp;
        }
        pose.rotate(heading, elevation);
        Ok(())
    }

    fn state(&self) -> Result<SimState, EnvError> {
        let pose = self.pose.as_ref().ok_or(EnvError::NoEpisode)?;
        let navigable_locations = self.visible_locations(pose)?;
        let here = &navigable_locations[0];
        Ok(SimState {
            scan_id: pose.scan.clone(),
            viewpoint_id: pose.viewpoint.clone(),
            heading: pose.heading(),
            elevation: pose.elevation(),
            view_index: pose.view_index(),
            position: [here.x, here.y, here.z],
            navigable_locations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::SceneGraph;

    // Hub "o" at the origin with spokes north, east and south
    fn star_sim() -> GraphSimulator {
        let scene = SceneGraph::from_viewpoints(
            "S",
            &[
                ("o".to_string(), [0.0, 0.0, 0.0]),
                ("n".to_string(), [0.0, 2.0, 0.0]),
                ("e".to_string(), [2.0, 0.0, 0.0]),
                ("s".to_string(), [0.0, -2.0, 0.0]),
            ],
            &[
                ("o".to_string(), "n".to_string()),
                ("o".to_string(), "e".to_string()),
                ("o".to_string(), "s".to_string()),
            ],
        )
        .unwrap();
        GraphSimulator::new(
            Arc::new(NavGraphs::from_scenes(vec![scene])),
            &CameraConfig::default(),
        )
    }

    #[test]
    fn state_before_episode_fails() {
        let sim = star_sim();
        assert!(matches!(sim.state(), Err(EnvError::NoEpisode)));
    }

    #[test]
    fn unknown_locations_are_rejected() {
        let mut sim = star_sim();
        assert!(matches!(
            sim.new_episode("Q", "o", 0.0, 0.0),
            Err(EnvError::UnknownScan(_))
        ));
        assert!(matches!(
            sim.new_episode("S", "zz", 0.0, 0.0),
            Err(EnvError::UnknownViewpoint { .. })
        ));
    }

    #[test]
    fn first_location_is_current_viewpoint() {
        let mut sim = star_sim();
        sim.new_episode("S", "o", 0.0, 0.0).unwrap();
        let state = sim.state().unwrap();
        assert_eq!(state.navigable_locations[0].viewpoint_id, "o");
        // Facing north: only "n" is in view
        assert_eq!(state.navigable_locations.len(), 2);
        assert_eq!(state.navigable_locations[1].viewpoint_id, "n");
        assert!(state.navigable_locations[1].rel_heading.abs() < 1e-9);
        assert_eq!(state.view_index, 12);
    }

    #[test]
    fn orientation_snaps_to_grid() {
        let mut sim = star_sim();
        sim.new_episode("S", "o", 0.3, -0.9).unwrap();
        let state = sim.state().unwrap();
        assert!((state.heading - ANGLE_INCREMENT).abs() < 1e-12);
        assert!((state.elevation + ANGLE_INCREMENT).abs() < 1e-12);
        assert_eq!(state.view_index, 1);
    }

    #[test]
    fn rotation_wraps_heading_and_clamps_elevation() {
        let mut sim = star_sim();
        sim.new_episode("S", "o", 0.0, 0.0).unwrap();
        sim.make_action(0, -1.0, 1.0).unwrap();
        sim.make_action(0, 0.0, 1.0).unwrap();
        let state = sim.state().unwrap();
        assert_eq!(state.view_index, 24 + 11);
    }

    #[test]
    fn full_sweep_visits_views_in_order() {
        let mut sim = star_sim();
        for ix in 0..36 {
            if ix == 0 {
                sim.new_episode("S", "o", 0.0, -ANGLE_INCREMENT).unwrap();
            } else if ix % 12 == 0 {
                sim.make_action(0, 1.0, 1.0).unwrap();
            } else {
                sim.make_action(0, 1.0, 0.0).unwrap();
            }
            assert_eq!(sim.state().unwrap().view_index, ix);
        }
    }

    #[test]
    fn move_action_changes_viewpoint() {
        let mut sim = star_sim();
        sim.new_episode("S", "o", std::f64::consts::FRAC_PI_2, 0.0)
            .unwrap();
        let state = sim.state().unwrap();
        assert_eq!(state.navigable_locations[1].viewpoint_id, "e");
        sim.make_action(1, 0.0, 0.0).unwrap();
        let state = sim.state().unwrap();
        assert_eq!(state.viewpoint_id, "e");
        assert_eq!(state.position, [2.0, 0.0, 0.0]);
        assert!(matches!(
            sim.make_action(5, 0.0, 0.0),
            Err(EnvError::InvalidAction { index: 5, .. })
        ));
    }

    #[test]
    fn wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
        assert_eq!(wrap_angle(0.0), 0.0);
    }
}
