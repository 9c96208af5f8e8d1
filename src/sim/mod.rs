//! Simulated collaborators for Gridflight
//!
//! A tiny world with circular obstacles, shared by a simulated vehicle and
//! its forward camera. The camera renders one flat gray frame per capture:
//! dark when an obstacle sits on the corridor toward the waypoint the
//! vehicle faces, bright otherwise. `LuminanceDepth` reads brightness back
//! as relative depth, so the real depth gate runs unchanged against it.

use image::{Rgb, RgbImage};
use log::{debug, info};
use nalgebra::{DMatrix, Point2, distance};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::error::NavError;
use crate::interface::{Camera, DepthEstimator, DepthMap, Vehicle, VehicleError};

/// Frame width rendered by [`SimulatedCamera`].
pub const FRAME_WIDTH: u32 = 64;
/// Frame height rendered by [`SimulatedCamera`].
pub const FRAME_HEIGHT: u32 = 48;

const NEAR_LUMA: u8 = 20;
const FAR_LUMA: u8 = 230;

/// Round obstacle in arena coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleObstacle {
    /// Centre `[x, y]`.
    pub center: [f64; 2],
    /// Radius in arena units.
    pub radius: f64,
}

impl CircleObstacle {
    /// True if the segment `from`-`to` passes within the radius.
    pub fn blocks(&self, from: &Point2<f64>, to: &Point2<f64>) -> bool {
        let center = Point2::new(self.center[0], self.center[1]);
        let leg = to - from;
        let length_sq = leg.norm_squared();
        let t = if length_sq > 0.0 {
            ((center - from).dot(&leg) / length_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        distance(&(from + leg * t), &center) <= self.radius
    }
}

/// Simulated world section of the mission file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Where the vehicle starts.
    #[serde(default)]
    pub start: [f64; 2],
    /// Obstacles in the arena.
    #[serde(default)]
    pub obstacles: Vec<CircleObstacle>,
    /// Number of initial captures that return no frame.
    #[serde(default)]
    pub frame_dropouts: u32,
}

#[derive(Debug)]
struct WorldState {
    position: Point2<f64>,
    facing: Option<Point2<f64>>,
    obstacles: Vec<CircleObstacle>,
    connected: bool,
    airborne: bool,
    legs: usize,
    timeout_on_leg: Option<usize>,
    frame_dropouts: u32,
    collisions: usize,
    commands: Vec<String>,
}

/// Shared state of one simulated flight.
#[derive(Debug, Clone)]
pub struct SimWorld(Rc<RefCell<WorldState>>);

impl SimWorld {
    /// Empty world with the vehicle parked at `start`.
    pub fn new(start: Point2<f64>) -> Self {
        SimWorld(Rc::new(RefCell::new(WorldState {
            position: start,
            facing: None,
            obstacles: Vec::new(),
            connected: false,
            airborne: false,
            legs: 0,
            timeout_on_leg: None,
            frame_dropouts: 0,
            collisions: 0,
            commands: Vec::new(),
        })))
    }

    /// World described by a mission file.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let world = SimWorld::new(Point2::new(config.start[0], config.start[1]));
        for obstacle in &config.obstacles {
            world.add_obstacle(*obstacle);
        }
        world.drop_frames(config.frame_dropouts);
        world
    }

    /// Adds an obstacle.
    pub fn with_obstacle(self, center: [f64; 2], radius: f64) -> Self {
        self.add_obstacle(CircleObstacle { center, radius });
        self
    }

    /// Adds an obstacle to a world already in use.
    pub fn add_obstacle(&self, obstacle: CircleObstacle) {
        self.0.borrow_mut().obstacles.push(obstacle);
    }

    /// Makes the next `count` captures fail.
    pub fn drop_frames(&self, count: u32) {
        self.0.borrow_mut().frame_dropouts = count;
    }

    /// Makes the `leg`-th move (0-based) time out.
    pub fn time_out_on_leg(&self, leg: usize) {
        self.0.borrow_mut().timeout_on_leg = Some(leg);
    }

    /// Vehicle handle into this world.
    pub fn vehicle(&self) -> SimulatedVehicle {
        SimulatedVehicle { world: self.clone() }
    }

    /// Forward camera into this world.
    pub fn camera(&self) -> SimulatedCamera {
        SimulatedCamera { world: self.clone() }
    }

    /// Current vehicle position.
    pub fn position(&self) -> Point2<f64> {
        self.0.borrow().position
    }

    /// True while the vehicle is in the air.
    pub fn airborne(&self) -> bool {
        self.0.borrow().airborne
    }

    /// Number of legs flown straight through an obstacle.
    pub fn collisions(&self) -> usize {
        self.0.borrow().collisions
    }

    /// Every command the vehicle received, in order.
    pub fn commands(&self) -> Vec<String> {
        self.0.borrow().commands.clone()
    }

    /// True if an obstacle sits between the vehicle and the waypoint it faces.
    pub fn corridor_blocked(&self) -> bool {
        let state = self.0.borrow();
        state.facing.is_some_and(|target| {
            state
                .obstacles
                .iter()
                .any(|obstacle| obstacle.blocks(&state.position, &target))
        })
    }
}

/// Simulated vehicle. Moves are instantaneous and exact.
pub struct SimulatedVehicle {
    world: SimWorld,
}

impl SimulatedVehicle {
    fn command(&self, name: String) -> Result<(), VehicleError> {
        let mut state = self.world.0.borrow_mut();
        if !state.connected {
            return Err(VehicleError::NotConnected);
        }
        debug!("sim vehicle: {}", name);
        state.commands.push(name);
        Ok(())
    }
}

impl Vehicle for SimulatedVehicle {
    fn connect(&mut self) -> Result<(), VehicleError> {
        self.world.0.borrow_mut().connected = true;
        self.command("connect".to_string())
    }

    fn disconnect(&mut self) -> Result<(), VehicleError> {
        self.command("disconnect".to_string())?;
        self.world.0.borrow_mut().connected = false;
        Ok(())
    }

    fn takeoff(&mut self) -> Result<(), VehicleError> {
        self.command("takeoff".to_string())?;
        self.world.0.borrow_mut().airborne = true;
        Ok(())
    }

    fn land(&mut self) -> Result<(), VehicleError> {
        self.command("land".to_string())?;
        self.world.0.borrow_mut().airborne = false;
        Ok(())
    }

    fn face_towards(&mut self, target: Point2<f64>) -> Result<(), VehicleError> {
        self.command(format!("face ({:.2}, {:.2})", target.x, target.y))?;
        self.world.0.borrow_mut().facing = Some(target);
        Ok(())
    }

    fn move_to(&mut self, target: Point2<f64>) -> Result<(), VehicleError> {
        self.command(format!("move ({:.2}, {:.2})", target.x, target.y))?;
        let mut state = self.world.0.borrow_mut();
        if !state.airborne {
            return Err(VehicleError::rejected("move_to", "vehicle is on the ground"));
        }
        let leg = state.legs;
        state.legs += 1;
        if state.timeout_on_leg == Some(leg) {
            return Err(VehicleError::timeout("move_to", Duration::from_secs(10)));
        }
        let from = state.position;
        if state.obstacles.iter().any(|obstacle| obstacle.blocks(&from, &target)) {
            state.collisions += 1;
        }
        state.position = target;
        Ok(())
    }

    fn current_position(&self) -> Result<Point2<f64>, VehicleError> {
        let state = self.world.0.borrow();
        if !state.connected {
            return Err(VehicleError::NotConnected);
        }
        Ok(state.position)
    }
}

/// Simulated forward camera.
pub struct SimulatedCamera {
    world: SimWorld,
}

impl Camera for SimulatedCamera {
    fn capture_frame(&mut self) -> Result<RgbImage, NavError> {
        {
            let mut state = self.world.0.borrow_mut();
            if state.frame_dropouts > 0 {
                state.frame_dropouts -= 1;
                info!("sim camera: dropped frame");
                return Err(NavError::frame("simulated dropout"));
            }
        }
        let luma = if self.world.corridor_blocked() {
            NEAR_LUMA
        } else {
            FAR_LUMA
        };
        Ok(RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb([luma, luma, luma])))
    }
}

/// Reads pixel brightness as relative depth in `[0, 1]`; darker is nearer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuminanceDepth;

impl DepthEstimator for LuminanceDepth {
    fn infer_depth(&self, frame: &RgbImage) -> DepthMap {
        let (width, height) = frame.dimensions();
        DepthMap::new(DMatrix::from_fn(height as usize, width as usize, |row, col| {
            let Rgb([r, g, b]) = *frame.get_pixel(col as u32, row as u32);
            (f32::from(r) + f32::from(g) + f32::from(b)) / (3.0 * 255.0)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obstacle_on_segment() {
        let obstacle = CircleObstacle { center: [0.5, 0.0], radius: 0.1 };
        assert!(obstacle.blocks(&Point2::new(0.0, 0.0), &Point2::new(1.0, 0.0)));
        assert!(!obstacle.blocks(&Point2::new(0.0, 0.0), &Point2::new(0.5, 0.5)));
        assert!(!obstacle.blocks(&Point2::new(1.0, 0.0), &Point2::new(2.0, 0.0)));
    }

    #[test]
    fn camera_sees_what_the_vehicle_faces() {
        let world = SimWorld::new(Point2::new(0.0, 0.0)).with_obstacle([0.5, 0.0], 0.1);
        let mut vehicle = world.vehicle();
        let mut camera = world.camera();
        vehicle.connect().unwrap();

        vehicle.face_towards(Point2::new(1.0, 0.0)).unwrap();
        let dark = LuminanceDepth.infer_depth(&camera.capture_frame().unwrap());
        assert!(dark.get(0, 0).unwrap() < 0.1);

        vehicle.face_towards(Point2::new(0.0, 1.0)).unwrap();
        let bright = LuminanceDepth.infer_depth(&camera.capture_frame().unwrap());
        assert!(bright.get(0, 0).unwrap() > 0.9);
        assert_eq!(bright.width(), FRAME_WIDTH as usize);
        assert_eq!(bright.height(), FRAME_HEIGHT as usize);
    }

    #[test]
    fn dropouts_then_frames() {
        let world = SimWorld::new(Point2::new(0.0, 0.0));
        world.drop_frames(1);
        let mut camera = world.camera();
        assert!(matches!(camera.capture_frame(), Err(NavError::FrameUnavailable(_))));
        assert!(camera.capture_frame().is_ok());
    }

    #[test]
    fn commands_need_a_connection() {
        let world = SimWorld::new(Point2::new(0.0, 0.0));
        let mut vehicle = world.vehicle();
        assert_eq!(vehicle.takeoff(), Err(VehicleError::NotConnected));
        vehicle.connect().unwrap();
        assert!(matches!(
            vehicle.move_to(Point2::new(1.0, 0.0)),
            Err(VehicleError::Rejected { .. })
        ));
    }

    #[test]
    fn scheduled_timeout_keeps_position() {
        let world = SimWorld::new(Point2::new(0.0, 0.0));
        world.time_out_on_leg(0);
        let mut vehicle = world.vehicle();
        vehicle.connect().unwrap();
        vehicle.takeoff().unwrap();
        assert!(matches!(
            vehicle.move_to(Point2::new(1.0, 0.0)),
            Err(VehicleError::Timeout { .. })
        ));
        assert_eq!(world.position(), Point2::new(0.0, 0.0));
    }
}
