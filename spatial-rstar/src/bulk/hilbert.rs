//! Hilbert curve mapping for bulk loading.
//!
//! The Hilbert curve maps 2D grid cells to a 1D index while preserving
//! spatial locality: rectangles whose centres are close on the plane end up
//! close in the sorted input, so consecutive entries pack into tight nodes.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_GRID_EXTENT;
use crate::rectangle::{Coord, Rectangle};

/// A rectangle paired with the Hilbert value of its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HilbertEntry<C> {
    pub rect: Rectangle<C>,
    pub hilbert: u64,
}

/// Square integer grid laid over a dataset's MBR.
///
/// Coordinates are translated by the MBR's lower corner and multiplied by
/// the coordinate type's scale (1 for integers, 1e6 for floating point).
/// The side is the smallest power of two exceeding the scaled extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HilbertGrid {
    x_offset: f64,
    y_offset: f64,
    scale: f64,
    side: u64,
}

impl HilbertGrid {
    pub fn new<C: Coord>(mbr: &Rectangle<C>) -> Self {
        let extent = mbr.width().max(mbr.height());
        let mut scale = C::HILBERT_SCALE;
        if extent * scale > MAX_GRID_EXTENT {
            scale = MAX_GRID_EXTENT / extent;
            log::debug!("Hilbert scale reduced to {} for extent {}", scale, extent);
        }
        let scaled = (extent * scale) as u64;
        Self {
            x_offset: mbr.xlo().to_f64(),
            y_offset: mbr.ylo().to_f64(),
            scale,
            side: (scaled + 1).next_power_of_two(),
        }
    }

    pub fn side(&self) -> u64 {
        self.side
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Grid cell of a point, clamped to the grid.
    pub fn cell(&self, x: f64, y: f64) -> (u64, u64) {
        let max = self.side - 1;
        // Negative values saturate to 0 in the cast
        let gx = (((x - self.x_offset) * self.scale) as u64).min(max);
        let gy = (((y - self.y_offset) * self.scale) as u64).min(max);
        (gx, gy)
    }

    pub fn hilbert_of_point(&self, x: f64, y: f64) -> u64 {
        let (gx, gy) = self.cell(x, y);
        xy2d(self.side, gx, gy)
    }

    /// Hilbert value of a rectangle's centre.
    pub fn hilbert_value<C: Coord>(&self, r: &Rectangle<C>) -> u64 {
        let (cx, cy) = r.center();
        self.hilbert_of_point(cx, cy)
    }

    pub fn entry<C: Coord>(&self, rect: Rectangle<C>) -> HilbertEntry<C> {
        HilbertEntry {
            hilbert: self.hilbert_value(&rect),
            rect,
        }
    }
}

/// Distance along the Hilbert curve of cell `(x, y)` in an `n x n` grid,
/// `n` a power of two.
pub fn xy2d(n: u64, x: u64, y: u64) -> u64 {
    let mut d = 0u64;
    let mut x = x;
    let mut y = y;
    let mut s = n / 2;

    while s > 0 {
        let rx = ((x & s) > 0) as u64;
        let ry = ((y & s) > 0) as u64;
        d += s * s * ((3 * rx) ^ ry);
        rotate(s, &mut x, &mut y, rx, ry);
        s /= 2;
    }

    d
}

/// Rotates and reflects the quadrant so the sub-curve has the right
/// orientation.
fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n.wrapping_sub(1).wrapping_sub(*x);
            *y = n.wrapping_sub(1).wrapping_sub(*y);
        }
        std::mem::swap(x, y);
    }
}
