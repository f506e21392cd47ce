//! Panel rectangles
//!
//! All coordinates are inclusive pixel bounds, matching the controller's
//! window registers.

use crate::{Error, Result};
use std::fmt;

/// Inclusive pixel rectangle `(x_start, y_start)..=(x_end, y_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x_start: u32,
    pub y_start: u32,
    pub x_end: u32,
    pub y_end: u32,
}

impl Rect {
    pub const fn new(x_start: u32, y_start: u32, x_end: u32, y_end: u32) -> Self {
        Self {
            x_start,
            y_start,
            x_end,
            y_end,
        }
    }

    /// The rectangle covering a whole `width`x`height` panel
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width - 1, height - 1)
    }

    /// Number of columns; only meaningful for a validated rectangle
    pub fn width(&self) -> u32 {
        self.x_end - self.x_start + 1
    }

    /// Number of rows; only meaningful for a validated rectangle
    pub fn height(&self) -> u32 {
        self.y_end - self.y_start + 1
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_start && x <= self.x_end && y >= self.y_start && y <= self.y_end
    }

    /// Check `0 <= x_start <= x_end < width` and `0 <= y_start <= y_end < height`
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if self.x_start > self.x_end || self.y_start > self.y_end {
            return Err(Error::Range(format!("{} has inverted bounds", self)));
        }
        if self.x_end >= width || self.y_end >= height {
            return Err(Error::Range(format!(
                "{} exceeds {}x{} panel",
                self, width, height
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{})-({},{})",
            self.x_start, self.y_start, self.x_end, self.y_end
        )
    }
}
