//! Gesture Interpreter - per-frame driver of the stabilization pipeline
//!
//! Owns the landmark window and the [`Stabilizer`] for one tracked hand.
//! A frame goes through two halves so inference can run elsewhere:
//! [`GestureInterpreter::prepare`] builds the classifier inputs and
//! [`GestureInterpreter::absorb`] takes the classifier outputs back.
//! [`GestureInterpreter::process`] does both inline for synchronous use.

use signa_core::{
    Classification, ConfirmedEvent, HandObservation, ModelKind, PipelineConfig, SignaResult,
};
use signa_stabilize::{FrameDecision, LandmarkWindow, Phase, Scheduler, Stabilizer, TimerHandle};
use tracing::{debug, warn};

use crate::{preprocess_dynamic, ClassifierBank, ExtractedFrame, FrameInput, KeypointExtractor};

/// Interpreter counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterpreterStats {
    /// Frames with a hand that reached the voters
    pub frames_processed: u64,
    /// "No hand" frames
    pub absent_frames: u64,
    /// Frames where the window was not yet full
    pub dynamic_skipped: u64,
    pub classifier_failures: u64,
    pub events_confirmed: u64,
    /// Frames handed to the actor by producers
    pub frames_submitted: u64,
    /// Frames overwritten before the actor read them
    pub frames_superseded: u64,
}

/// Classifier inputs for one frame
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedFrame {
    pub static_input: Vec<f32>,
    /// `None` until the window is full
    pub dynamic_input: Option<Vec<f32>>,
}

/// Single-hand interpreter state
pub struct GestureInterpreter<S: Scheduler> {
    extractor: KeypointExtractor,
    window: LandmarkWindow,
    stabilizer: Stabilizer<S>,
    stats: InterpreterStats,
}

impl<S: Scheduler> GestureInterpreter<S> {
    pub fn new(config: &PipelineConfig, scheduler: S) -> SignaResult<Self> {
        let stabilizer = Stabilizer::new(config, scheduler)?;
        Ok(GestureInterpreter {
            extractor: KeypointExtractor::new(&config.extraction),
            window: LandmarkWindow::with_config(&config.window)?,
            stabilizer,
            stats: InterpreterStats::default(),
        })
    }

    /// Push the frame's subset into the window and build classifier inputs
    ///
    /// On error the window is left as it was.
    pub fn prepare(&mut self, frame: ExtractedFrame) -> SignaResult<PreparedFrame> {
        let pixels = self.window.denormalize(&frame.subset, frame.size)?;
        self.window.add_frame(pixels)?;

        let dynamic_input = if self.window.is_full() {
            Some(preprocess_dynamic(self.window.frames(), frame.size)?)
        } else {
            self.stats.dynamic_skipped += 1;
            None
        };

        Ok(PreparedFrame {
            static_input: frame.static_input,
            dynamic_input,
        })
    }

    /// Feed classifier outputs for the frame last passed to `prepare`
    ///
    /// Failed classifications are logged and count as "no label".
    pub fn absorb(
        &mut self,
        static_result: SignaResult<Classification>,
        dynamic_result: Option<SignaResult<Classification>>,
    ) -> FrameDecision {
        let static_label = self.label_of(ModelKind::Static, static_result);
        let dynamic_label = match dynamic_result {
            Some(result) => self.label_of(ModelKind::Dynamic, result),
            None => None,
        };

        self.stats.frames_processed += 1;
        let decision = self
            .stabilizer
            .observe(static_label.as_deref(), dynamic_label.as_deref());

        if decision.event.is_some() {
            self.stats.events_confirmed += 1;
            if self.stabilizer.clears_history_on_confirm() {
                self.window.clear();
            }
        }
        decision
    }

    /// "No hand": reset window, voters and state machine
    pub fn clear(&mut self) {
        self.stats.absent_frames += 1;
        self.window.clear();
        self.stabilizer.clear();
        debug!("hand lost, pipeline reset");
    }

    /// Run one observation end to end on the calling thread
    pub fn process(
        &mut self,
        observation: &HandObservation,
        bank: &ClassifierBank,
    ) -> SignaResult<Option<ConfirmedEvent>> {
        let input = self.extractor.extract(observation)?;
        self.process_input(input, bank)
    }

    /// Same as [`process`](Self::process) for an already extracted frame
    pub fn process_input(
        &mut self,
        input: FrameInput,
        bank: &ClassifierBank,
    ) -> SignaResult<Option<ConfirmedEvent>> {
        let frame = match input {
            FrameInput::Absent => {
                self.clear();
                return Ok(None);
            }
            FrameInput::Hand(frame) => frame,
        };

        let prepared = self.prepare(frame)?;
        let static_result = bank.classify(ModelKind::Static, &prepared.static_input);
        let dynamic_result = prepared
            .dynamic_input
            .as_deref()
            .map(|input| bank.classify(ModelKind::Dynamic, input));
        Ok(self.absorb(static_result, dynamic_result).event)
    }

    /// Deliver a cooldown expiry; true if it unlocked the machine
    pub fn on_timer(&mut self, handle: TimerHandle) -> bool {
        self.stabilizer.on_timer(handle)
    }

    pub fn extractor(&self) -> &KeypointExtractor {
        &self.extractor
    }

    pub fn window(&self) -> &LandmarkWindow {
        &self.window
    }

    pub fn stabilizer(&self) -> &Stabilizer<S> {
        &self.stabilizer
    }

    pub fn stabilizer_mut(&mut self) -> &mut Stabilizer<S> {
        &mut self.stabilizer
    }

    pub fn phase(&self) -> Phase {
        self.stabilizer.phase()
    }

    pub fn stats(&self) -> &InterpreterStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut InterpreterStats {
        &mut self.stats
    }

    fn label_of(
        &mut self,
        kind: ModelKind,
        result: SignaResult<Classification>,
    ) -> Option<String> {
        match result {
            Ok(classification) => classification.into_label(),
            Err(err) => {
                self.stats.classifier_failures += 1;
                warn!(model = %kind, error = %err, "classification failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signa_core::{FrameSize, HandLandmarks, SignaError};
    use signa_stabilize::ManualScheduler;
    use std::time::Duration;

    use crate::Classifier;

    struct Scripted {
        labels: Vec<Option<&'static str>>,
        calls: usize,
    }

    impl Scripted {
        fn constant(label: &'static str) -> Self {
            Scripted {
                labels: vec![Some(label)],
                calls: 0,
            }
        }
    }

    impl Classifier for Scripted {
        fn classify(&mut self, _input: &[f32]) -> SignaResult<Classification> {
            let label = self.labels[self.calls % self.labels.len()];
            self.calls += 1;
            Ok(Classification::new(0, label.map(str::to_string)))
        }
    }

    struct Failing;

    impl Classifier for Failing {
        fn classify(&mut self, _input: &[f32]) -> SignaResult<Classification> {
            Err(SignaError::ClassifierFailure {
                model: ModelKind::Static,
                reason: "tensor shape mismatch".into(),
            })
        }
    }

    fn hand() -> HandObservation {
        let pairs: Vec<(f32, f32)> = (0..21).map(|i| (0.3 + i as f32 * 0.01, 0.5)).collect();
        HandObservation::present(HandLandmarks::from_pairs(&pairs), FrameSize::new(640, 480))
    }

    fn interpreter(threshold: u32) -> GestureInterpreter<ManualScheduler> {
        let mut config = PipelineConfig::default();
        config.confirmation.confirmation_threshold = threshold;
        GestureInterpreter::new(&config, ManualScheduler::new()).unwrap()
    }

    #[test]
    fn test_dynamic_skipped_until_window_full() {
        let mut interp = interpreter(100);
        let bank = ClassifierBank::new(Scripted::constant("A"), Scripted::constant("STOP"));
        for _ in 0..15 {
            interp.process(&hand(), &bank).unwrap();
        }
        assert_eq!(interp.stats().dynamic_skipped, 15);
        assert!(interp.stabilizer().dynamic_voter().is_empty());

        interp.process(&hand(), &bank).unwrap();
        assert_eq!(interp.stats().dynamic_skipped, 15);
        assert_eq!(interp.stabilizer().dynamic_voter().len(), 1);
    }

    #[test]
    fn test_static_letter_confirmed_after_window_fills() {
        let mut interp = interpreter(5);
        let bank = ClassifierBank::new(Scripted::constant("A"), Scripted::constant("STOP"));

        let mut events = Vec::new();
        for _ in 0..40 {
            if let Some(e) = interp.process(&hand(), &bank).unwrap() {
                events.push(e.letter);
            }
        }
        // no "STOP" until 16 frames fill the window, then 5 agreeing frames
        assert_eq!(events, vec!["A".to_string()]);
        assert_eq!(interp.stats().events_confirmed, 1);
        assert_eq!(interp.phase(), Phase::Locked);
    }

    #[test]
    fn test_confirmation_clears_window() {
        let mut interp = interpreter(1);
        let bank = ClassifierBank::new(Scripted::constant("A"), Scripted::constant("J"));
        let mut confirmed = false;
        for _ in 0..16 {
            confirmed |= interp.process(&hand(), &bank).unwrap().is_some();
        }
        assert!(confirmed);
        assert!(interp.window().is_empty());
    }

    #[test]
    fn test_absent_resets_everything() {
        let mut interp = interpreter(5);
        let bank = ClassifierBank::new(Scripted::constant("A"), Scripted::constant("STOP"));
        for _ in 0..3 {
            interp.process(&hand(), &bank).unwrap();
        }
        interp.process(&HandObservation::Absent, &bank).unwrap();
        assert!(interp.window().is_empty());
        assert!(interp.stabilizer().static_voter().is_empty());
        assert_eq!(interp.phase(), Phase::Idle);
        assert_eq!(interp.stats().absent_frames, 1);
    }

    #[test]
    fn test_classifier_failure_is_fail_soft() {
        let mut interp = interpreter(5);
        let bank = ClassifierBank::new(Failing, Scripted::constant("STOP"));
        for _ in 0..3 {
            assert_eq!(interp.process(&hand(), &bank).unwrap(), None);
        }
        assert_eq!(interp.stats().classifier_failures, 3);
        assert_eq!(interp.stats().frames_processed, 3);
        assert!(interp.stabilizer().static_voter().is_empty());
    }

    #[test]
    fn test_bad_frame_rejected_without_state_change() {
        let mut interp = interpreter(5);
        let bank = ClassifierBank::new(Scripted::constant("A"), Scripted::constant("STOP"));
        let short = HandObservation::present(
            HandLandmarks::from_pairs(&[(0.1, 0.1)]),
            FrameSize::new(640, 480),
        );
        assert!(matches!(
            interp.process(&short, &bank),
            Err(SignaError::InvalidFrameSize { .. })
        ));

        let zero = match hand() {
            HandObservation::Present { landmarks, .. } => {
                HandObservation::present(landmarks, FrameSize::new(0, 480))
            }
            HandObservation::Absent => unreachable!(),
        };
        assert!(matches!(
            interp.process(&zero, &bank),
            Err(SignaError::InvalidDimensions { .. })
        ));
        assert!(interp.window().is_empty());
        assert_eq!(interp.stats().frames_processed, 0);
    }

    #[test]
    fn test_cooldown_expiry_via_manual_time() {
        let mut interp = interpreter(1);
        let bank = ClassifierBank::new(Scripted::constant("A"), Scripted::constant("J"));
        let mut events = 0;
        for _ in 0..20 {
            events += interp.process(&hand(), &bank).unwrap().map_or(0, |_| 1);
        }
        assert_eq!(events, 1);
        assert_eq!(interp.phase(), Phase::Locked);

        let unlocked = interp.stabilizer_mut().advance_to(Duration::from_millis(1200));
        assert_eq!(unlocked, 1);
        assert_eq!(interp.phase(), Phase::Idle);
    }
}
