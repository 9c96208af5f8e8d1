// src/interface/depth.rs
// Monocular depth model boundary. Whatever network sits behind it, the core
// only sees a relative depth per pixel where smaller means nearer.

use image::RgbImage;
use nalgebra::DMatrix;

/// Per-pixel relative depth for one frame, indexed `(row, column)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    values: DMatrix<f32>,
}

impl DepthMap {
    /// Wraps a `height x width` matrix of relative depth.
    pub fn new(values: DMatrix<f32>) -> Self {
        DepthMap { values }
    }

    /// Builds a map from row-major values. Returns `None` if the length does not match.
    pub fn from_row_slice(width: usize, height: usize, values: &[f32]) -> Option<Self> {
        if values.len() != width * height {
            return None;
        }
        Some(DepthMap {
            values: DMatrix::from_row_slice(height, width, values),
        })
    }

    /// A map with the same depth everywhere.
    pub fn uniform(width: usize, height: usize, depth: f32) -> Self {
        DepthMap {
            values: DMatrix::from_element(height, width, depth),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    /// Depth at pixel `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.values.get((y, x)).copied()
    }

    /// Underlying matrix.
    pub fn values(&self) -> &DMatrix<f32> {
        &self.values
    }

    /// Rescales finite values to `[0, 1]`. A map without spread becomes all zeros.
    pub fn normalized(&self) -> DepthMap {
        let finite = self.values.iter().copied().filter(|v| v.is_finite());
        let (lo, hi) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !(hi - lo > 1e-6) {
            return DepthMap {
                values: self.values.map(|v| if v.is_finite() { 0.0 } else { v }),
            };
        }
        DepthMap {
            values: self.values.map(|v| (v - lo) / (hi - lo)),
        }
    }
}

/// Depth-estimation capability injected at startup.
#[cfg_attr(test, mockall::automock)]
pub trait DepthEstimator {
    /// Infers relative depth for every pixel of `frame`.
    fn infer_depth(&self, frame: &RgbImage) -> DepthMap;
}
