//! Navigation system for Gridflight
//!
//! This module holds the waypoint grid, the shortest-path planner and the
//! controller that flies a planned path leg by leg, consulting the depth
//! gate before every leg and re-planning around obstructions.

pub mod controller;
pub mod grid;
pub mod planner;

use serde::{Deserialize, Serialize};

use crate::error::NavError;

pub use controller::{AbortSignal, FlightLog, MissionOutcome, Navigator};
pub use grid::{Arena, Edge, Graph, Node, NodeId, NodeKind, build};
pub use planner::{Path, path_cost, shortest_path};

/// Navigation controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Extra capture attempts after a failed frame before the leg counts as blocked
    #[serde(default = "default_capture_retries")]
    pub capture_retries: u32,
    /// Remove a waypoint outright once this many legs into it were blocked
    #[serde(default)]
    pub node_block_limit: Option<u32>,
    /// Issue takeoff before the first leg; when false the vehicle is taken to be airborne already.
    /// Either way it is told to land on arrival or abort.
    #[serde(default = "default_takeoff")]
    pub takeoff: bool,
}

fn default_capture_retries() -> u32 {
    1
}

fn default_takeoff() -> bool {
    true
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            capture_retries: default_capture_retries(),
            node_block_limit: None,
            takeoff: default_takeoff(),
        }
    }
}

impl NavigationConfig {
    /// Rejects a zero `node_block_limit`, which would remove a node on its first block.
    pub fn validate(&self) -> Result<(), NavError> {
        if self.node_block_limit == Some(0) {
            return Err(NavError::config("node_block_limit must be at least 1"));
        }
        Ok(())
    }
}
