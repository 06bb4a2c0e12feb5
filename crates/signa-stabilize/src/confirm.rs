//! Confirmation State Machine - debounce of fused candidates
//!
//! A fused candidate must persist for `confirmation_threshold` consecutive
//! frames before it becomes a [`ConfirmedEvent`]. After each confirmation
//! the machine locks for the cooldown period; while locked, seeing the
//! letter just emitted pushes the unlock further out.
//!
//! Ambiguous families (a base glyph plus variants that only differ in
//! motion) start the base candidate at a negative bias and count variant
//! sightings on the side. A variant whose side count reaches its threshold
//! takes over the candidate with a confirming count.
//!
//! ```text
//!   Idle ──label──▶ Accumulating ──count ≥ threshold──▶ Locked
//!    ▲  \                 │                               │
//!    │   base──▶ AmbiguousWait ──variant ≥ threshold──────┤
//!    │                                                    │
//!    └──────────────── timer expiry / clear() ◀───────────┘
//! ```

use signa_core::{ConfirmationConfig, ConfirmedEvent};
use tracing::{debug, info, trace};

use crate::{Scheduler, TimerHandle};

/// Coarse state of the machine, derived from [`ConfirmationState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No candidate
    Idle,
    /// Counting consecutive matches for a candidate
    Accumulating,
    /// Base glyph of an ambiguous family seen; collecting variant evidence
    AmbiguousWait,
    /// Post-confirmation cooldown; input is ignored
    Locked,
}

/// Mutable fields of the machine
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ConfirmationState {
    pub candidate: Option<String>,
    /// Consecutive-match count; negative while an ambiguous bias applies
    pub counter: i32,
    pub last_emitted: Option<String>,
    pub cooldown_active: bool,
    /// Base glyph of the active ambiguous family
    pub ambiguous_base: Option<String>,
    /// Side counts, indexed like the active family's variants
    pub variant_counts: Vec<u32>,
}

impl ConfirmationState {
    pub fn phase(&self) -> Phase {
        if self.cooldown_active {
            Phase::Locked
        } else if self.ambiguous_base.is_some() {
            Phase::AmbiguousWait
        } else if self.candidate.is_some() {
            Phase::Accumulating
        } else {
            Phase::Idle
        }
    }
}

/// Debounce and confirmation of fused labels
pub struct ConfirmationStateMachine<S: Scheduler> {
    config: ConfirmationConfig,
    state: ConfirmationState,
    scheduler: S,
    /// The single live timer, cooldown or debounce extension
    pending: Option<TimerHandle>,
    emitted: u64,
}

impl<S: Scheduler> ConfirmationStateMachine<S> {
    /// The config is assumed validated (see [`ConfirmationConfig::validate`])
    pub fn new(config: ConfirmationConfig, scheduler: S) -> Self {
        ConfirmationStateMachine {
            config,
            state: ConfirmationState::default(),
            scheduler,
            pending: None,
            emitted: 0,
        }
    }

    /// Feed one frame's fused candidate
    pub fn on_candidate(&mut self, input: Option<&str>) -> Option<ConfirmedEvent> {
        let label = match input {
            Some(l) if l != self.config.unknown_label => l,
            _ => return None,
        };

        if self.state.cooldown_active {
            if self.state.last_emitted.as_deref() == Some(label) {
                trace!(label, "repeat of emitted letter, extending cooldown");
                self.arm_timer();
            }
            return None;
        }

        if self.state.ambiguous_base.is_none() {
            if let Some(family) = self.config.family_for(label) {
                debug!(base = label, bias = family.bias, "entering ambiguous wait");
                self.state.ambiguous_base = Some(label.to_string());
                self.state.candidate = Some(label.to_string());
                self.state.counter = family.bias;
                self.state.variant_counts = vec![0; family.variants.len()];
                return None;
            }
        }

        if let Some(base) = &self.state.ambiguous_base {
            if let Some(idx) = self
                .config
                .family_for(base)
                .and_then(|family| family.variant_index(label))
            {
                self.state.variant_counts[idx] += 1;
            }
        }

        if self.state.candidate.as_deref() == Some(label) {
            self.state.counter += 1;
        } else {
            self.state.candidate = Some(label.to_string());
            self.state.counter = 1;
        }

        self.apply_variant_override();

        if self.state.counter >= self.threshold() {
            return self.confirm();
        }
        None
    }

    /// Deliver a timer expiry; returns true when it unlocked the machine
    ///
    /// Expiries for cancelled or superseded handles are ignored.
    pub fn on_timer(&mut self, handle: TimerHandle) -> bool {
        if self.pending != Some(handle) {
            trace!(?handle, "ignoring stale timer");
            return false;
        }
        self.pending = None;
        debug!(last = ?self.state.last_emitted, "cooldown expired");
        self.state = ConfirmationState::default();
        true
    }

    /// Reset everything, cancelling any pending timer
    pub fn clear(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
        self.state = ConfirmationState::default();
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn pending_timer(&self) -> Option<TimerHandle> {
        self.pending
    }

    /// Events emitted so far this session
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn config(&self) -> &ConfirmationConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    fn threshold(&self) -> i32 {
        i32::try_from(self.config.confirmation_threshold).unwrap_or(i32::MAX)
    }

    fn apply_variant_override(&mut self) {
        let Some(base) = self.state.ambiguous_base.as_deref() else {
            return;
        };
        let Some(family) = self.config.family_for(base) else {
            return;
        };

        let winner = family
            .variants
            .iter()
            .zip(&self.state.variant_counts)
            .find(|(variant, count)| **count >= variant.threshold)
            .map(|(variant, _)| variant.label.clone());

        if let Some(variant) = winner {
            debug!(base, variant = %variant, "variant override");
            self.state.candidate = Some(variant);
            self.state.counter = self.threshold();
            self.state.ambiguous_base = None;
            self.state.variant_counts.clear();
        }
    }

    fn confirm(&mut self) -> Option<ConfirmedEvent> {
        let letter = self.state.candidate.take()?;
        self.emitted += 1;

        self.state.last_emitted = Some(letter.clone());
        self.state.cooldown_active = true;
        self.state.counter = 0;
        self.state.ambiguous_base = None;
        self.state.variant_counts.clear();
        self.arm_timer();

        info!(letter = %letter, sequence = self.emitted, "letter confirmed");
        Some(ConfirmedEvent::new(letter, self.emitted))
    }

    fn arm_timer(&mut self) {
        if let Some(old) = self.pending.take() {
            self.scheduler.cancel(old);
        }
        self.pending = Some(self.scheduler.schedule(self.config.cooldown()));
    }
}
