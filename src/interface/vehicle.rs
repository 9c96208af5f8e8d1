// src/interface/vehicle.rs
// Motion side of the vehicle link. Every call blocks until the vehicle
// acknowledges the command or the implementation's own timeout expires.

use nalgebra::Point2;
use std::time::Duration;
use thiserror::Error;

/// Why a vehicle command did not complete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VehicleError {
    /// No acknowledgement arrived in time. The position is unknown afterwards.
    #[error("{command} timed out after {after:?}")]
    Timeout {
        /// Command that was pending.
        command: String,
        /// How long the link waited.
        after: Duration,
    },

    /// The vehicle answered with an error.
    #[error("{command} rejected: {reason}")]
    Rejected {
        /// Command that failed.
        command: String,
        /// Reason reported by the vehicle.
        reason: String,
    },

    /// A command was issued before `connect` or after `disconnect`.
    #[error("vehicle link not connected")]
    NotConnected,
}

impl VehicleError {
    /// Creates a timeout error.
    pub fn timeout(command: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            command: command.into(),
            after,
        }
    }

    /// Creates a rejection error.
    pub fn rejected(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// Explicit handle to one aerial vehicle, with lifecycle
/// `connect → takeoff → legs → land → disconnect`.
#[cfg_attr(test, mockall::automock)]
pub trait Vehicle {
    /// Opens the command link.
    fn connect(&mut self) -> Result<(), VehicleError>;

    /// Closes the command link.
    fn disconnect(&mut self) -> Result<(), VehicleError>;

    /// Lifts off and stabilises at cruise height.
    fn takeoff(&mut self) -> Result<(), VehicleError>;

    /// Lands in place.
    fn land(&mut self) -> Result<(), VehicleError>;

    /// Yaws so the forward camera looks toward `target`.
    fn face_towards(&mut self, target: Point2<f64>) -> Result<(), VehicleError>;

    /// Flies straight to `target` in arena coordinates.
    fn move_to(&mut self, target: Point2<f64>) -> Result<(), VehicleError>;

    /// Last acknowledged position in arena coordinates.
    fn current_position(&self) -> Result<Point2<f64>, VehicleError>;
}
