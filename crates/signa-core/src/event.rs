//! Classifier outputs and confirmed letter events

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two classifiers produced a result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Single-pose classifier
    Static,
    /// Motion-sequence classifier over the landmark window
    Dynamic,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Static => "static",
            ModelKind::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output of one classifier invocation
///
/// `index` is the argmax position in the model's score vector (-1 when the
/// model produced no scores). `label` is `None` when the index has no entry
/// in the label table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub index: i32,
    pub label: Option<String>,
}

impl Classification {
    pub fn new(index: i32, label: Option<String>) -> Self {
        Self { index, label }
    }

    /// Shorthand for a labelled result
    pub fn labelled(index: i32, label: impl Into<String>) -> Self {
        Self {
            index,
            label: Some(label.into()),
        }
    }

    pub fn none() -> Self {
        Self {
            index: -1,
            label: None,
        }
    }

    pub fn into_label(self) -> Option<String> {
        self.label
    }
}

/// A letter committed by the confirmation state machine
///
/// This is the only externally visible output of the stabilization core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedEvent {
    /// The confirmed glyph
    pub letter: String,
    /// Per-session emission counter, starting at 1
    pub sequence: u64,
}

impl ConfirmedEvent {
    pub fn new(letter: impl Into<String>, sequence: u64) -> Self {
        Self {
            letter: letter.into(),
            sequence,
        }
    }
}

impl fmt::Display for ConfirmedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.sequence, self.letter)
    }
}
