// core/mod.rs

// Perception and mission-state building blocks used by the navigation
// controller: the depth gate that clears or blocks each leg, its advisory
// direction hints, and the state machine that keeps a mission's phases honest.

pub mod direction;
pub mod perception;
pub mod state;

pub use direction::{DEFAULT_MIN_FREE, Direction, SamplePoints, SectorFreedom};

pub use perception::{
    ClearanceResult, DepthGate, RegionOfInterest, Verdict, assess_depth, check_clearance,
};
pub use state::{MissionState, MissionStateMachine};
