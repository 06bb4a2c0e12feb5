//! Hand key-points as delivered by the landmark detector
//!
//! Coordinates are normalized to [0, 1] relative to the frame dimensions at
//! capture time. Pixel-space conversion happens in the landmark window.

use serde::{Deserialize, Serialize};

/// A single 2D key-point in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyPoint2D {
    pub x: f32,
    pub y: f32,
}

impl KeyPoint2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions strictly positive
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Ordered key-points of one tracked hand
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandLandmarks {
    points: Vec<KeyPoint2D>,
}

impl HandLandmarks {
    pub fn new(points: Vec<KeyPoint2D>) -> Self {
        Self { points }
    }

    /// Build from `(x, y)` pairs
    pub fn from_pairs(pairs: &[(f32, f32)]) -> Self {
        Self {
            points: pairs.iter().map(|&(x, y)| KeyPoint2D::new(x, y)).collect(),
        }
    }

    pub fn points(&self) -> &[KeyPoint2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<KeyPoint2D> {
        self.points.get(index).copied()
    }

    /// Flatten to `[x0, y0, x1, y1, ...]`
    pub fn flatten(&self) -> Vec<f32> {
        self.points.iter().flat_map(|p| [p.x, p.y]).collect()
    }
}

/// What the landmark source reports for one camera frame
#[derive(Debug, Clone, PartialEq)]
pub enum HandObservation {
    /// A hand was tracked in this frame
    Present {
        landmarks: HandLandmarks,
        size: FrameSize,
    },
    /// No hand in view; the pipeline resets
    Absent,
}

impl HandObservation {
    pub fn present(landmarks: HandLandmarks, size: FrameSize) -> Self {
        HandObservation::Present { landmarks, size }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, HandObservation::Absent)
    }
}
