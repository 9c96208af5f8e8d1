// src/main.rs
// Entry point for Gridflight: loads a mission file, flies it against the
// simulated world it describes and reports how the mission ended.

use gridflight::sim::{LuminanceDepth, SimWorld};
use gridflight::{GridflightConfig, MissionOutcome, run_mission};
use log::{error, info};
use std::process::ExitCode;

const DEFAULT_MISSION: &str = "config/mission.yaml";

fn main() -> ExitCode {
    // Initialize logging; RUST_LOG=debug shows every vehicle command
    env_logger::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_MISSION.to_string());
    info!("Starting Gridflight with mission {}", path);

    let config = match GridflightConfig::from_yaml_file(&path) {
        Ok(config) => config,
        Err(err) => {
            error!("Cannot load mission {}: {}", path, err);
            return ExitCode::from(2);
        }
    };

    let world = SimWorld::from_config(&config.simulation.clone().unwrap_or_default());
    let mut vehicle = world.vehicle();
    let mut camera = world.camera();

    match run_mission(config, &mut vehicle, &mut camera, LuminanceDepth) {
        MissionOutcome::Arrived(log) => {
            info!(
                "Arrived via {:?}: {} legs, {} re-plans, {} edges removed",
                log.visited,
                log.legs_flown,
                log.replans,
                log.removed_edges.len()
            );
            match serde_yaml::to_string(&log) {
                Ok(yaml) => info!("Flight log:\n{}", yaml),
                Err(err) => error!("Cannot serialize flight log: {}", err),
            }
            ExitCode::SUCCESS
        }
        MissionOutcome::Aborted(err) => {
            error!("Mission aborted at ({:.2}, {:.2}): {}", world.position().x, world.position().y, err);
            ExitCode::FAILURE
        }
        MissionOutcome::ConfigurationError(err) => {
            error!("Mission configuration rejected: {}", err);
            ExitCode::from(2)
        }
    }
}
