// src/interface/camera.rs
// Forward camera. Frames are pulled one at a time, only when the controller
// is about to decide on the next leg.

use image::RgbImage;

use crate::error::NavError;

/// Single forward-facing RGB camera.
#[cfg_attr(test, mockall::automock)]
pub trait Camera {
    /// Captures one frame, or fails with [`NavError::FrameUnavailable`]
    /// when nothing arrives before the camera's timeout.
    fn capture_frame(&mut self) -> Result<RgbImage, NavError>;
}

/// True when a frame has pixels and a buffer matching its dimensions.
pub fn frame_is_usable(frame: &RgbImage) -> bool {
    let (width, height) = frame.dimensions();
    width > 0 && height > 0 && frame.as_raw().len() == (width as usize) * (height as usize) * 3
}
