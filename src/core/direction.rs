// core/direction.rs

// Advisory steering hints read off one depth map. The clearance verdict stays
// the minimum-depth rule in perception.rs; these hints only say which way
// looks most open and end up in the flight log.

// Dependencies
use serde::Serialize;

use crate::interface::DepthMap;

/// Share of free pixels a sector needs before it is suggested.
pub const DEFAULT_MIN_FREE: f32 = 0.65;

/// Way the free space points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Center,  // Straight ahead
    Up,      // Above the corridor
    Right,   // Right of the corridor
    Left,    // Left of the corridor
    Down,    // Below the corridor
    Blocked, // Nowhere looks open
}

/// Free-pixel ratios of the left, centre and right thirds of a horizontal band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectorFreedom {
    /// Left third.
    pub left: f32,
    /// Middle third.
    pub center: f32,
    /// Right third.
    pub right: f32,
}

impl SectorFreedom {
    /// Measures rows `[row, row + rows)` split into thirds of the full width.
    ///
    /// A pixel is free when its depth is finite and at or beyond `threshold`.
    /// An empty sector counts as fully blocked.
    pub fn measure(depth: &DepthMap, row: usize, rows: usize, threshold: f32) -> Self {
        let width = depth.width();
        let ratio = |first: usize, last: usize| {
            let mut total = 0usize;
            let mut free = 0usize;
            for y in row..(row + rows).min(depth.height()) {
                for x in first..last {
                    total += 1;
                    if depth.get(x, y).is_some_and(|v| v.is_finite() && v >= threshold) {
                        free += 1;
                    }
                }
            }
            if total == 0 { 0.0 } else { free as f32 / total as f32 }
        };
        SectorFreedom {
            left: ratio(0, width / 3),
            center: ratio(width / 3, 2 * width / 3),
            right: ratio(2 * width / 3, width),
        }
    }

    /// First sector reaching `min_free`, in the order centre, right, left.
    pub fn suggest(&self, min_free: f32) -> Direction {
        if self.center >= min_free {
            Direction::Center
        } else if self.right >= min_free {
            Direction::Right
        } else if self.left >= min_free {
            Direction::Left
        } else {
            Direction::Blocked
        }
    }
}

/// Clear/blocked state of five points around the image centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplePoints {
    /// 30% left of centre.
    pub left: bool,
    /// Image centre.
    pub center: bool,
    /// 30% right of centre.
    pub right: bool,
    /// 30% above centre.
    pub top: bool,
    /// 30% below centre.
    pub bottom: bool,
}

impl SamplePoints {
    /// Samples `depth` at the five points. Missing or non-finite depth is blocked.
    pub fn sample(depth: &DepthMap, threshold: f32) -> Self {
        let (width, height) = (depth.width(), depth.height());
        let clear = |dx: f64, dy: f64| {
            // offsets are fractions of the half-frame
            let pixel = |offset: f64, size: usize| {
                let span = size.saturating_sub(1) as f64;
                ((offset * 0.5 + 0.5) * span).clamp(0.0, span) as usize
            };
            depth
                .get(pixel(dx, width), pixel(dy, height))
                .is_some_and(|v| v.is_finite() && v >= threshold)
        };
        SamplePoints {
            left: clear(-0.3, 0.0),
            center: clear(0.0, 0.0),
            right: clear(0.3, 0.0),
            top: clear(0.0, -0.3),
            bottom: clear(0.0, 0.3),
        }
    }

    /// Picks a direction from the sampled points.
    ///
    /// Centre wins when clear. A single clear point wins next. A blocked
    /// centre with everything around it clear means going over, so `Up`.
    /// Otherwise the first clear point in the order up, right, left, down.
    pub fn suggest(&self) -> Direction {
        if self.center {
            return Direction::Center;
        }
        let ranked = [
            (self.top, Direction::Up),
            (self.right, Direction::Right),
            (self.left, Direction::Left),
            (self.bottom, Direction::Down),
        ];
        let clear: Vec<Direction> = ranked.iter().filter(|(ok, _)| *ok).map(|(_, d)| *d).collect();
        match clear.as_slice() {
            [] => Direction::Blocked,
            [sole] => *sole,
            all if all.len() == ranked.len() => Direction::Up,
            [first, ..] => *first,
        }
    }
}
