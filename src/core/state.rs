// core/state.rs

// Mission state machine. The controller drives it; this file only knows
// which transitions are legal and keeps the history for the flight log.

// Dependencies
use log::{info, warn};
use serde::Serialize;

use crate::error::NavError;

/// Phases of one flight mission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MissionState {
    Idle,              // Connected, nothing planned yet
    Planning,          // Computing the initial path
    Traversing,        // At a waypoint, deciding the next leg
    CheckingClearance, // Frame captured or being captured for the next leg
    Replanning,        // Leg blocked, computing a path from the current node
    Arrived,           // Destination reached (terminal)
    Aborted,           // Mission given up, vehicle told to land (terminal)
}

impl MissionState {
    /// True for `Arrived` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, MissionState::Arrived | MissionState::Aborted)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: MissionState) -> bool {
        use MissionState::*;
        match (self, next) {
            (Arrived | Aborted, _) => false,
            (_, Aborted) => true,
            (Idle, Planning) => true,
            (Planning, Traversing) => true,
            (Traversing, CheckingClearance) => true,
            // Zero-leg path: already standing on the destination.
            (Traversing, Arrived) => true,
            (CheckingClearance, Traversing | Replanning | Arrived) => true,
            (Replanning, Traversing) => true,
            _ => false,
        }
    }
}

/// Current mission state plus every state visited so far.
#[derive(Debug, Clone)]
pub struct MissionStateMachine {
    current: MissionState,
    history: Vec<MissionState>,
}

impl Default for MissionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionStateMachine {
    /// Starts in `Idle`.
    pub fn new() -> Self {
        MissionStateMachine {
            current: MissionState::Idle,
            history: vec![MissionState::Idle],
        }
    }

    /// Moves to `next`, or fails with [`NavError::InvalidTransition`].
    pub fn advance(&mut self, next: MissionState) -> Result<(), NavError> {
        if !self.current.can_transition_to(next) {
            warn!("Rejected transition {:?} -> {:?}", self.current, next);
            return Err(NavError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        info!("Transitioned {:?} -> {:?}", self.current, next);
        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Current state.
    pub fn current(&self) -> MissionState {
        self.current
    }

    /// States in the order they were entered, starting with `Idle`.
    pub fn history(&self) -> &[MissionState] {
        &self.history
    }
}
