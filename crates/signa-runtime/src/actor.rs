//! Interpreter actor
//!
//! One tokio task owns the [`GestureInterpreter`]. Producers hand frames over
//! through a keep-latest `watch` slot; a frame that is overwritten before
//! the actor reads it is dropped and counted as superseded. Classification
//! runs on the blocking pool, one task per model. Cooldown timers are tokio
//! sleeps that post their handle back to the actor.

use std::sync::Arc;
use std::time::Duration;

use signa_core::{
    Classification, HandObservation, ModelKind, PipelineConfig, SignaError, SignaResult,
};
use signa_stabilize::{Scheduler, TimerHandle};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::{
    ClassifierBank, ConfirmedSink, FrameInput, GestureInterpreter, InterpreterStats,
    KeypointExtractor, PreparedFrame,
};

const COMMAND_BUFFER: usize = 16;

/// [`Scheduler`] backed by tokio timers
///
/// At most one timer task is alive; scheduling aborts the previous one.
/// Expired handles are sent on the channel given to [`TokioScheduler::new`].
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct TokioScheduler {
    next_id: u64,
    live: Option<(TimerHandle, JoinHandle<()>)>,
    expiry_tx: mpsc::UnboundedSender<TimerHandle>,
}

impl TokioScheduler {
    pub fn new(expiry_tx: mpsc::UnboundedSender<TimerHandle>) -> Self {
        TokioScheduler {
            next_id: 0,
            live: None,
            expiry_tx,
        }
    }

    pub fn live_timer(&self) -> Option<TimerHandle> {
        self.live.as_ref().map(|(handle, _)| *handle)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        if let Some((old, task)) = self.live.take() {
            trace!(timer = old.0, "timer replaced");
            task.abort();
        }

        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        let tx = self.expiry_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(handle);
        });
        self.live = Some((handle, task));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if self.live_timer() == Some(handle) {
            if let Some((_, task)) = self.live.take() {
                task.abort();
            }
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Some((_, task)) = self.live.take() {
            task.abort();
        }
    }
}

/// Contents of the keep-latest slot
#[derive(Clone, Debug)]
struct SubmittedFrame {
    seq: u64,
    /// Sequence number of the newest "no hand" submission
    last_absent: u64,
    input: FrameInput,
}

struct SubmitterInner {
    extractor: KeypointExtractor,
    slot: watch::Sender<Option<SubmittedFrame>>,
}

/// Producer side of the frame handoff
///
/// Extraction runs on the caller's thread. Cloning is cheap; every clone
/// writes to the same slot.
#[derive(Clone)]
pub struct FrameSubmitter {
    inner: Arc<SubmitterInner>,
}

impl FrameSubmitter {
    /// Extract and publish one observation, replacing any unread frame
    pub fn submit(&self, observation: &HandObservation) -> SignaResult<u64> {
        let input = self.inner.extractor.extract(observation)?;
        self.submit_input(input)
    }

    pub fn submit_absent(&self) -> SignaResult<u64> {
        self.submit_input(FrameInput::Absent)
    }

    /// Publish an extracted frame; returns its sequence number
    ///
    /// A "no hand" frame is never lost to keep-latest: if a newer hand frame
    /// overwrites it, the actor still resets before processing that frame.
    pub fn submit_input(&self, input: FrameInput) -> SignaResult<u64> {
        if self.inner.slot.is_closed() {
            return Err(SignaError::InterpreterClosed);
        }

        let absent = matches!(input, FrameInput::Absent);
        let mut seq = 0;
        self.inner.slot.send_modify(|slot| {
            let (prev_seq, prev_absent) = slot
                .as_ref()
                .map_or((0, 0), |f| (f.seq, f.last_absent));
            seq = prev_seq + 1;
            *slot = Some(SubmittedFrame {
                seq,
                last_absent: if absent { seq } else { prev_absent },
                input,
            });
        });
        Ok(seq)
    }
}

impl std::fmt::Debug for FrameSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSubmitter")
            .field("closed", &self.inner.slot.is_closed())
            .finish()
    }
}

/// Control messages for the actor
#[derive(Debug)]
pub enum Command {
    Stats(oneshot::Sender<InterpreterStats>),
    Shutdown,
}

/// Owner's handle to a running interpreter
pub struct InterpreterHandle {
    commands: mpsc::Sender<Command>,
    submitter: FrameSubmitter,
    task: JoinHandle<InterpreterStats>,
}

impl InterpreterHandle {
    pub fn submitter(&self) -> FrameSubmitter {
        self.submitter.clone()
    }

    pub fn submit(&self, observation: &HandObservation) -> SignaResult<u64> {
        self.submitter.submit(observation)
    }

    pub fn submit_absent(&self) -> SignaResult<u64> {
        self.submitter.submit_absent()
    }

    /// Current counters; frames submitted before the call are processed first
    pub async fn stats(&self) -> SignaResult<InterpreterStats> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(tx))
            .await
            .map_err(|_| SignaError::InterpreterClosed)?;
        rx.await.map_err(|_| SignaError::InterpreterClosed)
    }

    /// Stop the actor, close the classifiers and return the final counters
    pub async fn shutdown(self) -> SignaResult<InterpreterStats> {
        let _ = self.commands.send(Command::Shutdown).await;
        self.task.await.map_err(|_| SignaError::InterpreterClosed)
    }
}

/// Start the interpreter actor on the current tokio runtime
pub fn spawn_interpreter<K>(
    config: PipelineConfig,
    bank: ClassifierBank,
    sink: K,
) -> SignaResult<InterpreterHandle>
where
    K: ConfirmedSink + 'static,
{
    let (expiry_tx, expiries) = mpsc::unbounded_channel();
    let interpreter = GestureInterpreter::new(&config, TokioScheduler::new(expiry_tx))?;

    let (slot, frames) = watch::channel(None);
    let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = InterpreterActor {
        interpreter,
        bank,
        sink: Box::new(sink),
        frames,
        expiries,
        commands: command_rx,
        last_seq: 0,
    };
    let task = tokio::spawn(actor.run());

    let submitter = FrameSubmitter {
        inner: Arc::new(SubmitterInner {
            extractor: KeypointExtractor::new(&config.extraction),
            slot,
        }),
    };

    info!(
        threshold = config.confirmation.confirmation_threshold,
        cooldown_ms = config.confirmation.cooldown_delay_ms,
        "Interpreter started"
    );

    Ok(InterpreterHandle {
        commands,
        submitter,
        task,
    })
}

struct InterpreterActor {
    interpreter: GestureInterpreter<TokioScheduler>,
    bank: ClassifierBank,
    sink: Box<dyn ConfirmedSink>,
    frames: watch::Receiver<Option<SubmittedFrame>>,
    expiries: mpsc::UnboundedReceiver<TimerHandle>,
    commands: mpsc::Receiver<Command>,
    last_seq: u64,
}

impl InterpreterActor {
    async fn run(mut self) -> InterpreterStats {
        let mut frames_open = true;

        // Timers, then commands, then frames: a busy producer keeps the frame
        // slot ready, so commands must not wait behind it.
        loop {
            tokio::select! {
                biased;

                Some(handle) = self.expiries.recv() => {
                    if self.interpreter.on_timer(handle) {
                        debug!(timer = handle.0, "cooldown expired");
                    }
                }

                command = self.commands.recv() => match command {
                    Some(Command::Stats(reply)) => {
                        // A stats query sees every frame submitted before it
                        if frames_open && matches!(self.frames.has_changed(), Ok(true)) {
                            self.take_frame().await;
                        }
                        let _ = reply.send(self.stats());
                    }
                    Some(Command::Shutdown) | None => break,
                },

                changed = self.frames.changed(), if frames_open => {
                    if changed.is_err() {
                        frames_open = false;
                        continue;
                    }
                    self.take_frame().await;
                }
            }
        }

        // An unread frame at shutdown is dropped too
        let submitted = self.stats().frames_submitted;
        {
            let stats = self.interpreter.stats_mut();
            stats.frames_submitted = submitted;
            stats.frames_superseded += submitted - self.last_seq;
        }
        self.bank.close();

        let stats = self.interpreter.stats().clone();
        info!(
            processed = stats.frames_processed,
            confirmed = stats.events_confirmed,
            superseded = stats.frames_superseded,
            "Interpreter stopped"
        );
        stats
    }

    /// Mark the slot seen and process its frame
    async fn take_frame(&mut self) {
        let frame = self.frames.borrow_and_update().clone();
        if let Some(frame) = frame {
            self.handle_frame(frame).await;
        }
    }

    async fn handle_frame(&mut self, frame: SubmittedFrame) {
        let skipped = frame.seq.saturating_sub(self.last_seq + 1);
        if skipped > 0 {
            trace!(skipped, "frames superseded");
        }
        let reset_missed = frame.last_absent > self.last_seq;
        self.last_seq = frame.seq;
        {
            let stats = self.interpreter.stats_mut();
            stats.frames_submitted = frame.seq;
            stats.frames_superseded += skipped;
        }

        let extracted = match frame.input {
            FrameInput::Absent => {
                self.interpreter.clear();
                return;
            }
            FrameInput::Hand(extracted) => extracted,
        };
        if reset_missed {
            self.interpreter.clear();
        }

        let prepared = match self.interpreter.prepare(extracted) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(error = %err, "frame rejected");
                return;
            }
        };

        let (static_result, dynamic_result) = classify(self.bank.clone(), prepared).await;
        let decision = self.interpreter.absorb(static_result, dynamic_result);
        if let Some(event) = decision.event {
            self.sink.on_confirmed(&event);
        }
    }

    /// Interpreter counters with the producer's latest sequence number
    fn stats(&self) -> InterpreterStats {
        let mut stats = self.interpreter.stats().clone();
        if let Some(frame) = self.frames.borrow().as_ref() {
            stats.frames_submitted = frame.seq;
        }
        stats
    }
}

/// Both models on the blocking pool, concurrently
async fn classify(
    bank: ClassifierBank,
    prepared: PreparedFrame,
) -> (
    SignaResult<Classification>,
    Option<SignaResult<Classification>>,
) {
    let PreparedFrame {
        static_input,
        dynamic_input,
    } = prepared;

    let dynamic_task = dynamic_input.map(|input| {
        let bank = bank.clone();
        tokio::task::spawn_blocking(move || bank.classify(ModelKind::Dynamic, &input))
    });
    let static_task =
        tokio::task::spawn_blocking(move || bank.classify(ModelKind::Static, &static_input));

    let static_result = joined(ModelKind::Static, static_task.await);
    let dynamic_result = match dynamic_task {
        Some(task) => Some(joined(ModelKind::Dynamic, task.await)),
        None => None,
    };
    (static_result, dynamic_result)
}

fn joined(
    model: ModelKind,
    result: Result<SignaResult<Classification>, tokio::task::JoinError>,
) -> SignaResult<Classification> {
    result.unwrap_or_else(|err| {
        Err(SignaError::ClassifierFailure {
            model,
            reason: err.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_delivers_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sched = TokioScheduler::new(tx);
        let handle = sched.schedule(Duration::from_millis(1200));

        tokio::time::sleep(Duration::from_millis(1199)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(rx.recv().await, Some(handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_keeps_one_live_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sched = TokioScheduler::new(tx);
        let first = sched.schedule(Duration::from_millis(100));
        let second = sched.schedule(Duration::from_millis(200));
        assert_ne!(first, second);
        assert_eq!(sched.live_timer(), Some(second));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(rx.try_recv().ok(), Some(second));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sched = TokioScheduler::new(tx);
        let handle = sched.schedule(Duration::from_millis(100));
        sched.cancel(handle);
        assert_eq!(sched.live_timer(), None);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }
}
