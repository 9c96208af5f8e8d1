//! Gridflight - waypoint-grid flight planning for camera-only indoor drones
//!
//! This library plans deterministic shortest paths over a fixed waypoint grid
//! and flies them leg by leg, clearing every leg with a monocular depth check
//! and re-planning around whatever blocks the way.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Depth gate and mission state machine.
pub mod core;
/// Error types.
pub mod error;
pub mod interface;
pub mod navigation;
pub mod sim;

use log::{error, info};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;

// Re-export commonly used items for easier access
pub use crate::core::{
    ClearanceResult, DepthGate, Direction, MissionState, RegionOfInterest, SectorFreedom, Verdict,
};
pub use error::NavError;
pub use interface::{Camera, DepthEstimator, DepthMap, Vehicle, VehicleError};
pub use navigation::{
    AbortSignal, Arena, FlightLog, Graph, MissionOutcome, NavigationConfig, Navigator, NodeId,
    Path, shortest_path,
};

/// Main configuration structure for one Gridflight mission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridflightConfig {
    /// Arena geometry and destination
    pub arena: ArenaConfig,
    /// Depth gate tuning
    #[serde(default)]
    pub depth_gate: DepthGateConfig,
    /// Controller policy
    #[serde(default)]
    pub navigation: NavigationConfig,
    /// Simulated world, used by the bundled binary
    #[serde(default)]
    pub simulation: Option<sim::SimulationConfig>,
}

/// Arena and waypoint grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Arena width in meters
    pub width: f64,
    /// Arena height in meters
    pub height: f64,
    /// Distance between neighbouring lattice corners
    pub spacing: f64,
    /// Destination coordinate, snapped to the nearest waypoint
    pub destination: [f64; 2],
}

/// Depth gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthGateConfig {
    /// Relative depth below which the corridor counts as blocked
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Image region covering the corridor ahead
    #[serde(default)]
    pub region_of_interest: RegionOfInterest,
    /// Min-max normalize each depth map before deciding
    #[serde(default)]
    pub normalize: bool,
}

fn default_threshold() -> f32 {
    0.3
}

impl Default for DepthGateConfig {
    fn default() -> Self {
        DepthGateConfig {
            threshold: default_threshold(),
            region_of_interest: RegionOfInterest::default(),
            normalize: false,
        }
    }
}

impl Default for GridflightConfig {
    fn default() -> Self {
        GridflightConfig {
            arena: ArenaConfig {
                width: 4.0,
                height: 4.0,
                spacing: 1.0,
                destination: [4.0, 4.0],
            },
            depth_gate: DepthGateConfig::default(),
            navigation: NavigationConfig::default(),
            simulation: None,
        }
    }
}

impl GridflightConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, NavError> {
        let config: GridflightConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML file.
    pub fn from_yaml_file(path: impl AsRef<FsPath>) -> Result<Self, NavError> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: GridflightConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        info!("Loaded mission config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Checks everything that can be checked without building the grid.
    pub fn validate(&self) -> Result<(), NavError> {
        let arena = Arena::new(self.arena.width, self.arena.height)?;
        let spacing = self.arena.spacing;
        if !(spacing.is_finite() && spacing > 0.0) || spacing > arena.width() || spacing > arena.height() {
            return Err(NavError::config(format!(
                "spacing {spacing} must be positive and fit inside {} x {}",
                arena.width(),
                arena.height()
            )));
        }
        if self.arena.destination.iter().any(|v| !v.is_finite()) {
            return Err(NavError::config("destination must be finite"));
        }
        if !self.depth_gate.threshold.is_finite() {
            return Err(NavError::config("depth threshold must be finite"));
        }
        self.navigation.validate()?;
        self.depth_gate.region_of_interest.validate()
    }

    /// Destination as a point.
    pub fn destination(&self) -> Point2<f64> {
        Point2::new(self.arena.destination[0], self.arena.destination[1])
    }
}

/// Primary entry point: a validated mission ready to fly once.
pub struct Gridflight<E> {
    config: GridflightConfig,
    graph: Graph,
    navigator: Navigator<E>,
}

impl<E: DepthEstimator> Gridflight<E> {
    /// Validates the configuration and builds the waypoint grid.
    ///
    /// Bad geometry surfaces here as [`NavError::Configuration`] or
    /// [`NavError::NodeNotFound`], before any vehicle command.
    pub fn new(config: GridflightConfig, estimator: E) -> Result<Self, NavError> {
        config.validate()?;
        let arena = Arena::new(config.arena.width, config.arena.height)?;
        let graph = navigation::build(&arena, config.arena.spacing, config.destination())?;
        let gate = DepthGate::new(
            estimator,
            config.depth_gate.region_of_interest,
            config.depth_gate.threshold,
            config.depth_gate.normalize,
        )?;
        let navigator = Navigator::new(graph.clone(), gate, config.navigation.clone());

        Ok(Gridflight {
            config,
            graph,
            navigator,
        })
    }

    /// Connects the vehicle, flies the mission and disconnects.
    pub fn fly<V, C>(&mut self, vehicle: &mut V, camera: &mut C) -> MissionOutcome
    where
        V: Vehicle + ?Sized,
        C: Camera + ?Sized,
    {
        if let Err(err) = vehicle.connect() {
            error!("Vehicle connection failed: {}", err);
            return MissionOutcome::Aborted(err.into());
        }
        info!("Vehicle connected, starting mission");

        let outcome = self.navigator.fly(vehicle, camera);

        if let Err(err) = vehicle.disconnect() {
            error!("Vehicle disconnect failed: {}", err);
        }
        outcome
    }

    /// Cancels the mission at its next state boundary when triggered.
    pub fn abort_signal(&self) -> AbortSignal {
        self.navigator.abort_signal()
    }

    /// Grid as built, before any obstruction.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Controller, with its current graph and flight log.
    pub fn navigator(&self) -> &Navigator<E> {
        &self.navigator
    }

    /// Configuration the mission was built from.
    pub fn config(&self) -> &GridflightConfig {
        &self.config
    }
}

/// Builds and flies a mission, reporting bad configuration as an outcome.
pub fn run_mission<V, C, E>(
    config: GridflightConfig,
    vehicle: &mut V,
    camera: &mut C,
    estimator: E,
) -> MissionOutcome
where
    V: Vehicle + ?Sized,
    C: Camera + ?Sized,
    E: DepthEstimator,
{
    match Gridflight::new(config, estimator) {
        Ok(mut mission) => mission.fly(vehicle, camera),
        Err(err) => {
            error!("Mission rejected before flight: {}", err);
            MissionOutcome::ConfigurationError(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSION: &str = r#"
arena:
  width: 2.0
  height: 1.0
  spacing: 1.0
  destination: [2.0, 0.0]
depth_gate:
  threshold: 0.4
  region_of_interest: { x: 0.25, y: 0.25, width: 0.5, height: 0.5 }
navigation:
  node_block_limit: 2
"#;

    #[test]
    fn yaml_with_defaults() {
        let config = GridflightConfig::from_yaml_str(MISSION).unwrap();
        assert_eq!(config.arena.destination, [2.0, 0.0]);
        assert_eq!(config.depth_gate.threshold, 0.4);
        assert!(!config.depth_gate.normalize);
        assert_eq!(config.navigation.capture_retries, 1);
        assert_eq!(config.navigation.node_block_limit, Some(2));
        assert!(config.navigation.takeoff);
        assert!(config.simulation.is_none());
    }

    #[test]
    fn yaml_rejects_oversized_spacing() {
        let yaml = MISSION.replace("spacing: 1.0", "spacing: 3.0");
        assert!(matches!(
            GridflightConfig::from_yaml_str(&yaml),
            Err(NavError::Configuration(_))
        ));
    }

    #[test]
    fn yaml_syntax_errors_surface() {
        assert!(matches!(
            GridflightConfig::from_yaml_str("arena: [unclosed"),
            Err(NavError::Yaml(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            GridflightConfig::from_yaml_file("does/not/exist.yaml"),
            Err(NavError::Io(_))
        ));
    }

    #[test]
    fn zero_block_limit_is_rejected() {
        let yaml = MISSION.replace("node_block_limit: 2", "node_block_limit: 0");
        assert!(matches!(
            GridflightConfig::from_yaml_str(&yaml),
            Err(NavError::Configuration(_))
        ));
    }

    #[test]
    fn largest_retry_count_is_accepted() {
        let yaml = format!("{MISSION}  capture_retries: {}\n", u32::MAX);
        let config = GridflightConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.navigation.capture_retries, u32::MAX);
    }

    #[test]
    fn default_config_is_valid() {
        GridflightConfig::default().validate().unwrap();
    }
}
