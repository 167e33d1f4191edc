//! Eye detection.
//!
//! [`EyeDetector`] is the seam between the pipeline and the classifier. The
//! production implementation is [`CascadeEyeDetector`].

pub mod cascade;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::MediaResult;
use crate::frame::Frame;

pub use cascade::CascadeEyeDetector;

/// Detected eye region in frame-local pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: i32,
    /// Top edge y-coordinate
    pub y: i32,
    /// Box width
    pub width: i32,
    /// Box height
    pub height: i32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge x-coordinate (exclusive).
    #[inline]
    pub fn x2(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Bottom edge y-coordinate (exclusive).
    #[inline]
    pub fn y2(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Intersect the box with a `frame_width × frame_height` frame.
    ///
    /// Returns `(rows, cols)` index ranges, or `None` when nothing of the box
    /// lies inside the frame.
    pub fn clamp_to(&self, frame_width: usize, frame_height: usize) -> Option<(Range<usize>, Range<usize>)> {
        let clamp = |v: i64, max: usize| v.clamp(0, max as i64) as usize;

        let x0 = clamp(self.x as i64, frame_width);
        let x1 = clamp(self.x2(), frame_width);
        let y0 = clamp(self.y as i64, frame_height);
        let y1 = clamp(self.y2(), frame_height);

        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((y0..y1, x0..x1))
    }
}

/// Finds eye regions in a single frame.
///
/// Takes `&mut self` because classifier backends keep scratch buffers.
/// Implementations must not carry state from one frame to the next.
pub trait EyeDetector: Send {
    /// Return every detected eye region. Overlapping boxes are not merged.
    fn detect(&mut self, frame: &Frame) -> MediaResult<Vec<BoundingBox>>;

    /// Detector name for logging.
    fn name(&self) -> &'static str {
        "eye-detector"
    }
}

impl<D: EyeDetector + ?Sized> EyeDetector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> MediaResult<Vec<BoundingBox>> {
        (**self).detect(frame)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside() {
        let bbox = BoundingBox::new(10, 10, 20, 20);
        assert_eq!(bbox.clamp_to(64, 48), Some((10..30, 10..30)));
    }

    #[test]
    fn test_clamp_partially_outside() {
        let bbox = BoundingBox::new(-5, 40, 20, 20);
        assert_eq!(bbox.clamp_to(64, 48), Some((40..48, 0..15)));
    }

    #[test]
    fn test_clamp_fully_outside() {
        assert_eq!(BoundingBox::new(100, 10, 20, 20).clamp_to(64, 48), None);
        assert_eq!(BoundingBox::new(-30, -30, 20, 20).clamp_to(64, 48), None);
    }

    #[test]
    fn test_clamp_degenerate_box() {
        assert_eq!(BoundingBox::new(5, 5, 0, 10).clamp_to(64, 48), None);
        assert_eq!(BoundingBox::new(5, 5, -4, 10).clamp_to(64, 48), None);
    }

    #[test]
    fn test_clamp_extreme_values_do_not_overflow() {
        let bbox = BoundingBox::new(i32::MAX, i32::MAX, i32::MAX, i32::MAX);
        assert_eq!(bbox.clamp_to(64, 48), None);
    }
}
