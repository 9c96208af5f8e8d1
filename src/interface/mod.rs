//! Collaborator interfaces for Gridflight
//!
//! The core never talks to hardware or a model directly. It consumes:
//! - a vehicle link for takeoff, landing, yaw and leg moves
//! - a forward camera for point-in-time frame capture
//! - a depth estimator turning one RGB frame into relative depth

mod camera;
mod depth;
mod vehicle;

pub use camera::*;
pub use depth::*;
pub use vehicle::*;
