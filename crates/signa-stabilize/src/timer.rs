//! Cancellable one-shot timers for the confirmation state machine
//!
//! The state machine never sleeps. It asks a [`Scheduler`] for a timer and
//! later receives the same [`TimerHandle`] back through
//! [`ConfirmationStateMachine::on_timer`](crate::ConfirmationStateMachine::on_timer).
//! Expiries for handles that were cancelled or replaced are ignored by the
//! machine, so a scheduler may deliver late without harm.

use std::time::Duration;

/// Identifies one scheduled timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Source of delayed expiry notifications
pub trait Scheduler {
    /// Arrange for `handle` to be delivered back after `delay`
    fn schedule(&mut self, delay: Duration) -> TimerHandle;

    /// Best-effort cancellation; a racing expiry may still be delivered
    fn cancel(&mut self, handle: TimerHandle);
}

/// Scheduler on virtual time, advanced explicitly by the caller
///
/// Used for offline replay and deterministic tests.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    pending: Vec<(Duration, TimerHandle)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Timers not yet fired or cancelled
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Move the clock forward and return due handles in deadline order
    ///
    /// Time never goes backwards; an earlier `now` only fires what is
    /// already due.
    pub fn advance_to(&mut self, now: Duration) -> Vec<TimerHandle> {
        if now > self.now {
            self.now = now;
        }

        let mut due: Vec<(Duration, TimerHandle)> = Vec::new();
        let current = self.now;
        self.pending.retain(|&(deadline, handle)| {
            if deadline <= current {
                due.push((deadline, handle));
                false
            } else {
                true
            }
        });
        due.sort();
        due.into_iter().map(|(_, handle)| handle).collect()
    }

    pub fn advance_by(&mut self, dt: Duration) -> Vec<TimerHandle> {
        let target = self.now + dt;
        self.advance_to(target)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.pending.push((self.now + delay, handle));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.retain(|&(_, h)| h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_scheduler_fires_in_order() {
        let mut sched = ManualScheduler::new();
        let late = sched.schedule(Duration::from_millis(300));
        let early = sched.schedule(Duration::from_millis(100));

        assert!(sched.advance_to(Duration::from_millis(50)).is_empty());
        assert_eq!(sched.advance_to(Duration::from_millis(500)), vec![early, late]);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_manual_scheduler_cancel() {
        let mut sched = ManualScheduler::new();
        let handle = sched.schedule(Duration::from_millis(100));
        sched.cancel(handle);
        assert!(sched.advance_by(Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_handles_are_unique() {
        let mut sched = ManualScheduler::new();
        let a = sched.schedule(Duration::ZERO);
        let b = sched.schedule(Duration::ZERO);
        assert_ne!(a, b);
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let mut sched = ManualScheduler::new();
        sched.advance_to(Duration::from_millis(200));
        sched.advance_to(Duration::from_millis(100));
        assert_eq!(sched.now(), Duration::from_millis(200));
    }
}
