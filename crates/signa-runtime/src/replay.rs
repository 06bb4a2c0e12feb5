//! Offline replay of recorded classifier labels
//!
//! Input is JSON lines, one per camera frame:
//!
//! ```text
//! {"t_ms": 0, "static": "A", "dynamic": "STOP"}
//! {"t_ms": 33, "static": "A", "dynamic": null}
//! {"t_ms": 66, "absent": true}
//! ```
//!
//! Frames drive a [`Stabilizer`] on virtual time, so cooldowns expire
//! exactly as they would have during the recording.

use std::io::BufRead;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use signa_core::{ConfirmedEvent, PipelineConfig, SignaError, SignaResult};
use signa_stabilize::{ManualScheduler, Stabilizer};
use tracing::debug;

/// One recorded frame
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub t_ms: u64,
    #[serde(default, rename = "static")]
    pub static_label: Option<String>,
    #[serde(default)]
    pub dynamic: Option<String>,
    #[serde(default)]
    pub absent: bool,
}

/// A confirmation and the recording time it happened at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub t_ms: u64,
    #[serde(flatten)]
    pub event: ConfirmedEvent,
}

/// Replay state for one recording
pub struct Replayer {
    stabilizer: Stabilizer<ManualScheduler>,
    frames: u64,
}

impl Replayer {
    pub fn new(config: &PipelineConfig) -> SignaResult<Self> {
        Ok(Replayer {
            stabilizer: Stabilizer::new(config, ManualScheduler::new())?,
            frames: 0,
        })
    }

    /// Apply one record; timers due by `t_ms` fire first
    pub fn feed(&mut self, record: &ReplayRecord) -> Option<ReplayEvent> {
        let unlocked = self
            .stabilizer
            .advance_to(Duration::from_millis(record.t_ms));
        if unlocked > 0 {
            debug!(t_ms = record.t_ms, "cooldown expired");
        }
        self.frames += 1;

        if record.absent {
            self.stabilizer.clear();
            return None;
        }

        let decision = self.stabilizer.observe(
            record.static_label.as_deref(),
            record.dynamic.as_deref(),
        );
        decision.event.map(|event| ReplayEvent {
            t_ms: record.t_ms,
            event,
        })
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn stabilizer(&self) -> &Stabilizer<ManualScheduler> {
        &self.stabilizer
    }
}

/// Parse one line; `None` for blank lines
pub fn parse_record(line: &str, line_no: usize) -> SignaResult<Option<ReplayRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| SignaError::InvalidRecord {
            line: line_no,
            reason: e.to_string(),
        })
}

/// Replay a whole recording and collect the confirmations
pub fn replay<R: BufRead>(reader: R, config: &PipelineConfig) -> SignaResult<Vec<ReplayEvent>> {
    let mut replayer = Replayer::new(config)?;
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(record) = parse_record(&line, idx + 1)? {
            events.extend(replayer.feed(&record));
        }
    }
    Ok(events)
}
