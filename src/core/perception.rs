// core/perception.rs

// Depth gate: turns one forward frame into a clear/blocked decision for the
// next leg. The depth model is a black box behind `DepthEstimator`; this file
// owns only the decision laid on top of its output.

// Dependencies
use image::RgbImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::direction::{DEFAULT_MIN_FREE, Direction, SamplePoints, SectorFreedom};
use crate::error::NavError;
use crate::interface::{DepthEstimator, DepthMap, frame_is_usable};

/// Image sub-area covering the corridor the vehicle is about to fly through.
///
/// Expressed as fractions of the frame so it survives resolution changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    /// Left edge, fraction of frame width.
    pub x: f64,
    /// Top edge, fraction of frame height.
    pub y: f64,
    /// Width as a fraction of frame width.
    pub width: f64,
    /// Height as a fraction of frame height.
    pub height: f64,
}

impl Default for RegionOfInterest {
    // Central third of the frame, 35% to 65% of its height.
    fn default() -> Self {
        RegionOfInterest {
            x: 1.0 / 3.0,
            y: 0.35,
            width: 1.0 / 3.0,
            height: 0.30,
        }
    }
}

impl RegionOfInterest {
    /// Checks the rectangle is non-empty and inside the unit square.
    pub fn validate(&self) -> Result<(), NavError> {
        let fields = [self.x, self.y, self.width, self.height];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(NavError::config("region of interest must be finite"));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(NavError::config("region of interest must have positive size"));
        }
        if self.x < 0.0 || self.y < 0.0 || self.x + self.width > 1.0 + 1e-9 || self.y + self.height > 1.0 + 1e-9 {
            return Err(NavError::config(format!(
                "region of interest {self:?} leaves the frame"
            )));
        }
        Ok(())
    }

    /// Pixel window `(column, row, columns, rows)` for a `width x height` image; never empty.
    pub fn pixel_window(&self, width: usize, height: usize) -> (usize, usize, usize, usize) {
        fn span(start: f64, len: f64, size: usize) -> (usize, usize) {
            let first = ((start * size as f64 + 1e-9).floor() as usize).min(size.saturating_sub(1));
            let last = ((start + len) * size as f64 - 1e-9).ceil() as usize;
            let last = last.clamp(first + 1, size);
            (first, last - first)
        }
        let (col, cols) = span(self.x, self.width, width);
        let (row, rows) = span(self.y, self.height, height);
        (col, row, cols, rows)
    }
}

/// Clearance decision for one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Nothing in the corridor is nearer than the threshold.
    Clear,
    /// Something in the corridor is nearer than the threshold.
    Blocked,
}

/// Outcome of one clearance check.
///
/// Only `verdict` decides the leg. The sector and point hints are advisory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClearanceResult {
    /// Clear or blocked.
    pub verdict: Verdict,
    /// Nearest relative depth found in the region of interest.
    pub min_depth: f32,
    /// Share of region pixels at or beyond the threshold.
    pub free_fraction: f32,
    /// Free ratios of the left, centre and right thirds of the region's rows.
    pub sectors: SectorFreedom,
    /// First sector at least [`DEFAULT_MIN_FREE`] free, centre before right before left.
    pub suggested: Direction,
    /// Five-point samples around the frame centre.
    pub points: SamplePoints,
}

impl ClearanceResult {
    /// True when the leg may be flown.
    pub fn is_clear(&self) -> bool {
        self.verdict == Verdict::Clear
    }
}

/// Applies the nearest-depth rule to an already inferred depth map.
pub fn assess_depth(
    depth: &DepthMap,
    roi: &RegionOfInterest,
    threshold: f32,
) -> Result<ClearanceResult, NavError> {
    if depth.width() == 0 || depth.height() == 0 {
        return Err(NavError::frame("depth map is empty"));
    }
    let (col, row, cols, rows) = roi.pixel_window(depth.width(), depth.height());
    let window = depth.values().view((row, col), (rows, cols));

    let mut nearest = f32::INFINITY;
    let mut valid = 0usize;
    let mut free = 0usize;
    for &value in window.iter().filter(|v| v.is_finite()) {
        nearest = nearest.min(value);
        valid += 1;
        if value >= threshold {
            free += 1;
        }
    }
    if valid == 0 {
        return Err(NavError::frame("no finite depth inside the region of interest"));
    }

    let verdict = if nearest < threshold {
        Verdict::Blocked
    } else {
        Verdict::Clear
    };
    let sectors = SectorFreedom::measure(depth, row, rows, threshold);
    Ok(ClearanceResult {
        verdict,
        min_depth: nearest,
        free_fraction: free as f32 / valid as f32,
        sectors,
        suggested: sectors.suggest(DEFAULT_MIN_FREE),
        points: SamplePoints::sample(depth, threshold),
    })
}

/// Runs the depth model on `frame` and decides whether the corridor is clear.
///
/// Fails with [`NavError::FrameUnavailable`] for an empty or corrupt frame, a
/// depth map whose size differs from the frame, or a region with no usable
/// depth. Never reports `Clear` on missing data.
pub fn check_clearance<E: DepthEstimator + ?Sized>(
    estimator: &E,
    frame: &RgbImage,
    roi: &RegionOfInterest,
    threshold: f32,
    normalize: bool,
) -> Result<ClearanceResult, NavError> {
    if !frame_is_usable(frame) {
        return Err(NavError::frame(format!(
            "empty or corrupt {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let depth = estimator.infer_depth(frame);
    if depth.width() != frame.width() as usize || depth.height() != frame.height() as usize {
        warn!(
            "Depth map {}x{} does not match frame {}x{}",
            depth.width(),
            depth.height(),
            frame.width(),
            frame.height()
        );
        return Err(NavError::frame("depth map size does not match frame"));
    }
    let depth = if normalize { depth.normalized() } else { depth };

    let result = assess_depth(&depth, roi, threshold)?;
    debug!(
        "Clearance {:?}: nearest {:.3} vs threshold {:.3}, {:.0}% free",
        result.verdict,
        result.min_depth,
        threshold,
        result.free_fraction * 100.0
    );
    Ok(result)
}

/// Depth gate bound to its estimator and tuning.
pub struct DepthGate<E> {
    estimator: E,
    roi: RegionOfInterest,
    threshold: f32,
    normalize: bool,
}

impl<E: DepthEstimator> DepthGate<E> {
    /// Creates a gate, validating the region and threshold.
    pub fn new(estimator: E, roi: RegionOfInterest, threshold: f32, normalize: bool) -> Result<Self, NavError> {
        roi.validate()?;
        if !threshold.is_finite() {
            return Err(NavError::config("depth threshold must be finite"));
        }
        Ok(DepthGate {
            estimator,
            roi,
            threshold,
            normalize,
        })
    }

    /// Checks one frame against this gate's region and threshold.
    pub fn check(&self, frame: &RgbImage) -> Result<ClearanceResult, NavError> {
        check_clearance(&self.estimator, frame, &self.roi, self.threshold, self.normalize)
    }

    /// Threshold in the model's relative depth units.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Region of interest.
    pub fn region(&self) -> &RegionOfInterest {
        &self.roi
    }
}
