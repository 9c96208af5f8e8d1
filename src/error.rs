// src/error.rs
// Error taxonomy shared by the grid builder, planner, depth gate and controller.

use thiserror::Error;

use crate::core::state::MissionState;
use crate::interface::VehicleError;
use crate::navigation::NodeId;

/// Errors raised while configuring or flying a mission.
#[derive(Debug, Error)]
pub enum NavError {
    /// Bad arena, spacing, threshold or region-of-interest input. Fatal before flight.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No waypoint lies close enough to the requested coordinate.
    #[error("no waypoint within {tolerance} of ({x}, {y})")]
    NodeNotFound {
        /// Requested x coordinate.
        x: f64,
        /// Requested y coordinate.
        y: f64,
        /// Maximum snapping distance that was allowed.
        tolerance: f64,
    },

    /// A node id that is not (or no longer) part of the graph.
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),

    /// No path connects the two nodes.
    #[error("no path from node {start} to node {goal}")]
    Unreachable {
        /// Node the search started from.
        start: NodeId,
        /// Node the search tried to reach.
        goal: NodeId,
    },

    /// Frame capture or depth inference produced nothing usable.
    #[error("frame unavailable: {0}")]
    FrameUnavailable(String),

    /// Motion command timed out or was refused.
    #[error("vehicle error: {0}")]
    Vehicle(#[from] VehicleError),

    /// The controller attempted a transition its state machine forbids.
    #[error("invalid mission transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State the mission was in.
        from: MissionState,
        /// State that was requested.
        to: MissionState,
    },

    /// The mission was cancelled through its abort signal.
    #[error("mission cancelled")]
    Cancelled,

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl NavError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a frame-unavailable error.
    pub fn frame(msg: impl Into<String>) -> Self {
        Self::FrameUnavailable(msg.into())
    }

    /// True for errors that must be reported before any flight command is issued.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::NodeNotFound { .. } | Self::Io(_) | Self::Yaml(_)
        )
    }
}
