//! Landmark Window - fixed-capacity FIFO of key-point frames
//!
//! Stores the last `max_frames` frames of tracked points in pixel space,
//! oldest first. The dynamic classifier only runs once the window is full.

use std::collections::VecDeque;

use signa_core::{FrameSize, SignaError, SignaResult, WindowConfig};

/// Rolling window of flattened key-point frames
#[derive(Debug, Clone)]
pub struct LandmarkWindow {
    frames: VecDeque<Vec<f32>>,
    max_frames: usize,
    num_points: usize,
}

impl LandmarkWindow {
    /// `max_frames` must be positive and `num_points` even; use
    /// [`LandmarkWindow::with_config`] for checked construction.
    pub fn new(max_frames: usize, num_points: usize) -> Self {
        debug_assert!(max_frames > 0, "window capacity must be positive");
        debug_assert!(num_points % 2 == 0, "num_points must hold (x, y) pairs");
        LandmarkWindow {
            frames: VecDeque::with_capacity(max_frames),
            max_frames,
            num_points,
        }
    }

    pub fn with_config(config: &WindowConfig) -> SignaResult<Self> {
        config.validate()?;
        Ok(Self::new(config.max_frames, config.num_points))
    }

    /// Scale normalized `(x, y)` pairs to pixel coordinates
    pub fn denormalize(&self, points: &[f32], size: FrameSize) -> SignaResult<Vec<f32>> {
        self.check_len(points)?;
        if !size.is_valid() {
            return Err(SignaError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }

        let width = size.width as f32;
        let height = size.height as f32;
        Ok(points
            .chunks_exact(2)
            .flat_map(|p| [p[0] * width, p[1] * height])
            .collect())
    }

    /// Append a frame, evicting the oldest when full
    ///
    /// A frame of the wrong length is rejected and the window is untouched.
    pub fn add_frame(&mut self, frame: Vec<f32>) -> SignaResult<()> {
        self.check_len(&frame)?;
        if self.frames.len() == self.max_frames {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() == self.max_frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_frames
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Frames oldest first
    pub fn frames(&self) -> impl Iterator<Item = &[f32]> {
        self.frames.iter().map(|f| f.as_slice())
    }

    /// Owned copy of the frames, oldest first
    pub fn snapshot(&self) -> Vec<Vec<f32>> {
        self.frames.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    fn check_len(&self, frame: &[f32]) -> SignaResult<()> {
        if frame.len() != self.num_points {
            return Err(SignaError::InvalidFrameSize {
                expected: self.num_points,
                actual: frame.len(),
            });
        }
        Ok(())
    }
}

impl Default for LandmarkWindow {
    fn default() -> Self {
        let config = WindowConfig::default();
        Self::new(config.max_frames, config.num_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(tag: f32) -> Vec<f32> {
        vec![tag; 12]
    }

    #[test]
    fn test_window_fills_then_evicts_oldest() {
        let mut window = LandmarkWindow::new(3, 12);
        assert!(window.is_empty());

        window.add_frame(frame(1.0)).unwrap();
        window.add_frame(frame(2.0)).unwrap();
        assert!(!window.is_full());

        window.add_frame(frame(3.0)).unwrap();
        assert!(window.is_full());

        window.add_frame(frame(4.0)).unwrap();
        assert_eq!(window.len(), 3);
        let firsts: Vec<f32> = window.frames().map(|f| f[0]).collect();
        assert_eq!(firsts, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_wrong_frame_size_rejected_without_mutation() {
        let mut window = LandmarkWindow::new(4, 12);
        window.add_frame(frame(1.0)).unwrap();

        let err = window.add_frame(vec![0.0; 11]).unwrap_err();
        assert_eq!(
            err,
            SignaError::InvalidFrameSize {
                expected: 12,
                actual: 11
            }
        );
        assert_eq!(window.len(), 1);
        assert_eq!(window.snapshot(), vec![frame(1.0)]);
    }

    #[test]
    fn test_denormalize_scales_pairs() {
        let window = LandmarkWindow::new(16, 4);
        let out = window
            .denormalize(&[0.5, 0.25, 1.0, 0.0], FrameSize::new(640, 480))
            .unwrap();
        assert_eq!(out, vec![320.0, 120.0, 640.0, 0.0]);
    }

    #[test]
    fn test_denormalize_zero_width_fails() {
        let window = LandmarkWindow::new(16, 4);
        let err = window
            .denormalize(&[0.5, 0.5, 0.5, 0.5], FrameSize::new(0, 480))
            .unwrap_err();
        assert!(matches!(err, SignaError::InvalidDimensions { width: 0, .. }));
    }

    #[test]
    fn test_denormalize_wrong_length_fails() {
        let window = LandmarkWindow::new(16, 4);
        let err = window
            .denormalize(&[0.5, 0.5], FrameSize::new(640, 480))
            .unwrap_err();
        assert!(matches!(err, SignaError::InvalidFrameSize { .. }));
    }

    #[test]
    fn test_clear_empties_window() {
        let mut window = LandmarkWindow::new(2, 12);
        window.add_frame(frame(1.0)).unwrap();
        window.add_frame(frame(2.0)).unwrap();
        window.clear();
        assert!(window.is_empty());
        assert!(!window.is_full());
    }

    #[test]
    fn test_with_config_rejects_bad_shape() {
        let zero = WindowConfig {
            max_frames: 0,
            num_points: 12,
        };
        assert!(matches!(
            LandmarkWindow::with_config(&zero),
            Err(SignaError::InvalidConfig(_))
        ));

        let odd = WindowConfig {
            max_frames: 4,
            num_points: 5,
        };
        assert!(matches!(
            LandmarkWindow::with_config(&odd),
            Err(SignaError::InvalidConfig(_))
        ));

        let window = LandmarkWindow::with_config(&WindowConfig::default()).unwrap();
        assert_eq!(window.capacity(), 16);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "window capacity must be positive")]
    fn test_zero_capacity_panics_in_debug() {
        let _ = LandmarkWindow::new(0, 12);
    }

    proptest! {
        #[test]
        fn prop_window_bounded_and_fifo(capacity in 1usize..20, count in 0usize..64) {
            let mut window = LandmarkWindow::new(capacity, 2);
            for i in 0..count {
                window.add_frame(vec![i as f32, 0.0]).unwrap();
                prop_assert!(window.len() <= capacity);
            }

            let kept: Vec<f32> = window.frames().map(|f| f[0]).collect();
            let start = count.saturating_sub(capacity);
            let expected: Vec<f32> = (start..count).map(|i| i as f32).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
