//! Classifier capability and the two-model bank
//!
//! Inference engines live outside this crate. They plug in through
//! [`Classifier`], either directly or as a raw score function wrapped in
//! [`TableClassifier`] with a [`LabelTable`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use signa_core::{Classification, ModelKind, SignaError, SignaResult};
use tracing::{debug, info};

/// One inference model
///
/// Calls on one instance are serialized by [`ClassifierBank`]; an
/// implementation does not need its own locking.
pub trait Classifier: Send {
    fn classify(&mut self, input: &[f32]) -> SignaResult<Classification>;

    /// Release model resources; called once with no inference in flight
    fn close(&mut self) {}
}

/// Class labels indexed by model output position
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        LabelTable { labels }
    }

    /// One label per line, first CSV column; blank lines are skipped
    pub fn from_reader<R: BufRead>(reader: R) -> SignaResult<Self> {
        let mut labels = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let label = line.split(',').next().unwrap_or("").trim();
            if !label.is_empty() {
                labels.push(label.to_string());
            }
        }
        Ok(LabelTable { labels })
    }

    pub fn from_file(path: impl AsRef<Path>) -> SignaResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Argmax over `scores`; first maximum wins, empty scores give index -1
    pub fn decode(&self, scores: &[f32]) -> Classification {
        let mut best: Option<(usize, f32)> = None;
        for (i, &score) in scores.iter().enumerate() {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        match best {
            Some((index, _)) => Classification::new(
                index as i32,
                self.get(index).map(str::to_string),
            ),
            None => Classification::none(),
        }
    }
}

/// Raw score producer, typically a neural network forward pass
pub trait ScoreModel: Send {
    fn scores(&mut self, input: &[f32]) -> SignaResult<Vec<f32>>;
}

impl<F> ScoreModel for F
where
    F: FnMut(&[f32]) -> SignaResult<Vec<f32>> + Send,
{
    fn scores(&mut self, input: &[f32]) -> SignaResult<Vec<f32>> {
        self(input)
    }
}

/// [`Classifier`] made of a score model and its label table
pub struct TableClassifier<M: ScoreModel> {
    model: M,
    labels: LabelTable,
}

impl<M: ScoreModel> TableClassifier<M> {
    pub fn new(model: M, labels: LabelTable) -> Self {
        TableClassifier { model, labels }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

impl<M: ScoreModel> Classifier for TableClassifier<M> {
    fn classify(&mut self, input: &[f32]) -> SignaResult<Classification> {
        let scores = self.model.scores(input)?;
        Ok(self.labels.decode(&scores))
    }
}

type ModelSlot = Arc<Mutex<Option<Box<dyn Classifier>>>>;

/// Static and dynamic models, each behind its own lock
///
/// Cloning shares the models. The two models can run at the same time;
/// calls to one model are serialized.
#[derive(Clone)]
pub struct ClassifierBank {
    static_model: ModelSlot,
    dynamic_model: ModelSlot,
}

impl ClassifierBank {
    pub fn new<S, D>(static_model: S, dynamic_model: D) -> Self
    where
        S: Classifier + 'static,
        D: Classifier + 'static,
    {
        ClassifierBank {
            static_model: Arc::new(Mutex::new(Some(Box::new(static_model)))),
            dynamic_model: Arc::new(Mutex::new(Some(Box::new(dynamic_model)))),
        }
    }

    /// Run one model; blocks while another call to the same model is running
    pub fn classify(&self, kind: ModelKind, input: &[f32]) -> SignaResult<Classification> {
        let mut slot = self.slot(kind).lock();
        let model = slot.as_mut().ok_or_else(|| SignaError::ClassifierFailure {
            model: kind,
            reason: "classifier closed".to_string(),
        })?;

        let result = model.classify(input);
        if let Ok(c) = &result {
            debug!(model = %kind, index = c.index, label = ?c.label, "classified");
        }
        result
    }

    /// Close both models once no inference is in flight
    ///
    /// Takes the static lock, then the dynamic one. Later `classify` calls
    /// fail with `ClassifierFailure`.
    pub fn close(&self) {
        let mut static_slot = self.static_model.lock();
        let mut dynamic_slot = self.dynamic_model.lock();

        let mut closed = false;
        if let Some(mut model) = static_slot.take() {
            model.close();
            closed = true;
        }
        if let Some(mut model) = dynamic_slot.take() {
            model.close();
            closed = true;
        }
        if closed {
            info!("Classifiers closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.static_model.lock().is_none() && self.dynamic_model.lock().is_none()
    }

    fn slot(&self, kind: ModelKind) -> &ModelSlot {
        match kind {
            ModelKind::Static => &self.static_model,
            ModelKind::Dynamic => &self.dynamic_model,
        }
    }
}

impl std::fmt::Debug for ClassifierBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierBank")
            .field("closed", &self.is_closed())
            .finish()
    }
}
