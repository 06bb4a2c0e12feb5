//! Key-point extraction and classifier preprocessing
//!
//! Runs on the producer side: everything here is pure and cheap, so the
//! frame source can do it before handing the frame to the interpreter.

use signa_core::{
    ExtractionConfig, FrameSize, HandLandmarks, HandObservation, SignaError, SignaResult,
};

/// Classifier-ready data for one tracked hand
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedFrame {
    /// Preprocessed input for the static model (all points)
    pub static_input: Vec<f32>,
    /// Normalized `(x, y)` pairs of the tracked subset, flattened
    pub subset: Vec<f32>,
    pub size: FrameSize,
}

/// One frame as the interpreter sees it
#[derive(Clone, Debug, PartialEq)]
pub enum FrameInput {
    Hand(ExtractedFrame),
    Absent,
}

/// Selects the tracked subset and builds the static model input
#[derive(Clone, Debug)]
pub struct KeypointExtractor {
    landmark_count: usize,
    dynamic_indices: Vec<usize>,
}

impl KeypointExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        KeypointExtractor {
            landmark_count: config.landmark_count,
            dynamic_indices: config.dynamic_indices.clone(),
        }
    }

    pub fn extract(&self, observation: &HandObservation) -> SignaResult<FrameInput> {
        match observation {
            HandObservation::Absent => Ok(FrameInput::Absent),
            HandObservation::Present { landmarks, size } => {
                self.check_count(landmarks)?;
                Ok(FrameInput::Hand(ExtractedFrame {
                    static_input: preprocess_static(&landmarks.flatten()),
                    subset: self.select(landmarks)?,
                    size: *size,
                }))
            }
        }
    }

    /// Flattened `(x, y)` of the configured indices, in index order
    pub fn select(&self, landmarks: &HandLandmarks) -> SignaResult<Vec<f32>> {
        self.check_count(landmarks)?;
        let mut out = Vec::with_capacity(self.dynamic_indices.len() * 2);
        for &idx in &self.dynamic_indices {
            let point = landmarks.get(idx).ok_or(SignaError::InvalidFrameSize {
                expected: self.landmark_count,
                actual: landmarks.len(),
            })?;
            out.push(point.x);
            out.push(point.y);
        }
        Ok(out)
    }

    pub fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    fn check_count(&self, landmarks: &HandLandmarks) -> SignaResult<()> {
        if landmarks.len() != self.landmark_count {
            return Err(SignaError::InvalidFrameSize {
                expected: self.landmark_count,
                actual: landmarks.len(),
            });
        }
        Ok(())
    }
}

impl Default for KeypointExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

/// Static model input: points relative to point 0, scaled into [-1, 1]
///
/// `flat` is `[x0, y0, x1, y1, ...]`. The scale step is skipped when every
/// point coincides with point 0.
pub fn preprocess_static(flat: &[f32]) -> Vec<f32> {
    if flat.len() < 2 {
        return Vec::new();
    }
    let (base_x, base_y) = (flat[0], flat[1]);

    let mut out: Vec<f32> = flat
        .chunks_exact(2)
        .flat_map(|p| [p[0] - base_x, p[1] - base_y])
        .collect();

    let max = out.iter().fold(0f32, |m, v| m.max(v.abs()));
    if max != 0.0 {
        for v in &mut out {
            *v /= max;
        }
    }
    out
}

/// Dynamic model input from a window of pixel-space frames, oldest first
///
/// Every point is taken relative to the first point of the oldest frame,
/// then x is divided by the image width and y by the image height.
pub fn preprocess_dynamic<'a, I>(frames: I, size: FrameSize) -> SignaResult<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    if !size.is_valid() {
        return Err(SignaError::InvalidDimensions {
            width: size.width,
            height: size.height,
        });
    }
    let width = size.width as f32;
    let height = size.height as f32;

    let mut out = Vec::new();
    let mut base: Option<(f32, f32)> = None;
    for frame in frames {
        if base.is_none() && frame.len() >= 2 {
            base = Some((frame[0], frame[1]));
        }
        let Some((bx, by)) = base else {
            continue;
        };
        out.extend(
            frame
                .chunks_exact(2)
                .flat_map(|p| [(p[0] - bx) / width, (p[1] - by) / height]),
        );
    }
    Ok(out)
}
