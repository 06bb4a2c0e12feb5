//! Stabilizer - voters, fusion and confirmation wired together
//!
//! Per frame: record each classifier's label, vote, fuse, and feed the
//! fused candidate to the confirmation machine.

use std::time::Duration;

use signa_core::{ConfirmedEvent, PipelineConfig, SignaResult};
use tracing::debug;

use crate::{
    ConfirmationStateMachine, DecisionFusion, LabelVoter, ManualScheduler, Phase, Scheduler,
    TimerHandle, VoteResult,
};

/// Everything decided for one frame
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDecision {
    pub static_vote: VoteResult,
    pub dynamic_vote: VoteResult,
    /// Fused candidate handed to the confirmation machine
    pub candidate: Option<String>,
    pub event: Option<ConfirmedEvent>,
}

/// Label stabilization for one tracked hand
pub struct Stabilizer<S: Scheduler> {
    static_voter: LabelVoter,
    dynamic_voter: LabelVoter,
    fusion: DecisionFusion,
    machine: ConfirmationStateMachine<S>,
    clear_history_on_confirm: bool,
}

impl<S: Scheduler> Stabilizer<S> {
    pub fn new(config: &PipelineConfig, scheduler: S) -> SignaResult<Self> {
        config.validate()?;
        Ok(Stabilizer {
            static_voter: LabelVoter::new(&config.voter),
            dynamic_voter: LabelVoter::new(&config.voter),
            fusion: DecisionFusion::new(&config.fusion),
            machine: ConfirmationStateMachine::new(config.confirmation.clone(), scheduler),
            clear_history_on_confirm: config.clear_history_on_confirm,
        })
    }

    /// Process one frame's classifier labels
    ///
    /// `None` means the model produced nothing usable this frame and leaves
    /// its history untouched.
    pub fn observe(
        &mut self,
        static_label: Option<&str>,
        dynamic_label: Option<&str>,
    ) -> FrameDecision {
        self.static_voter.record(static_label);
        self.dynamic_voter.record(dynamic_label);

        let static_vote = self.static_voter.vote();
        let dynamic_vote = self.dynamic_voter.vote();
        let candidate = self.fusion.fuse(&static_vote, &dynamic_vote);

        debug!(
            static_label = ?static_vote.label,
            static_freq = static_vote.frequency,
            dynamic_label = ?dynamic_vote.label,
            dynamic_freq = dynamic_vote.frequency,
            candidate = ?candidate,
            "frame fused"
        );

        let event = self.machine.on_candidate(candidate.as_deref());
        if event.is_some() && self.clear_history_on_confirm {
            self.static_voter.clear();
            self.dynamic_voter.clear();
        }

        FrameDecision {
            static_vote,
            dynamic_vote,
            candidate,
            event,
        }
    }

    pub fn on_timer(&mut self, handle: TimerHandle) -> bool {
        self.machine.on_timer(handle)
    }

    /// "No hand" reset of both histories and the machine
    pub fn clear(&mut self) {
        self.static_voter.clear();
        self.dynamic_voter.clear();
        self.machine.clear();
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn machine(&self) -> &ConfirmationStateMachine<S> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut ConfirmationStateMachine<S> {
        &mut self.machine
    }

    pub fn static_voter(&self) -> &LabelVoter {
        &self.static_voter
    }

    pub fn dynamic_voter(&self) -> &LabelVoter {
        &self.dynamic_voter
    }

    pub fn clears_history_on_confirm(&self) -> bool {
        self.clear_history_on_confirm
    }
}

impl Stabilizer<ManualScheduler> {
    /// Advance virtual time, delivering due timers; returns unlock count
    pub fn advance_to(&mut self, now: Duration) -> usize {
        let due = self.machine.scheduler_mut().advance_to(now);
        due.into_iter()
            .filter(|&handle| self.machine.on_timer(handle))
            .count()
    }

    pub fn now(&self) -> Duration {
        self.machine.scheduler().now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signa_core::SignaError;

    fn stabilizer(threshold: u32) -> Stabilizer<ManualScheduler> {
        let mut config = PipelineConfig::default();
        config.confirmation.confirmation_threshold = threshold;
        Stabilizer::new(&config, ManualScheduler::new()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.voter.vote_window = 0;
        let err = Stabilizer::new(&config, ManualScheduler::new()).err();
        assert!(matches!(err, Some(SignaError::InvalidConfig(_))));
    }

    #[test]
    fn test_static_letter_confirmed_once_hand_settles() {
        let mut s = stabilizer(5);
        let mut events = Vec::new();
        for _ in 0..5 {
            if let Some(e) = s.observe(Some("A"), Some("STOP")).event {
                events.push(e.letter);
            }
        }
        assert_eq!(events, vec!["A".to_string()]);
        assert_eq!(s.phase(), Phase::Locked);
        // histories dropped after the confirmation
        assert!(s.static_voter().is_empty());
        assert!(s.dynamic_voter().is_empty());
    }

    #[test]
    fn test_history_kept_when_configured() {
        let mut config = PipelineConfig::default();
        config.confirmation.confirmation_threshold = 2;
        config.clear_history_on_confirm = false;
        let mut s = Stabilizer::new(&config, ManualScheduler::new()).unwrap();

        s.observe(Some("A"), Some("STOP"));
        let decision = s.observe(Some("A"), Some("STOP"));
        assert!(decision.event.is_some());
        assert_eq!(s.static_voter().len(), 2);
    }

    #[test]
    fn test_moving_hand_uses_dynamic_label() {
        let mut s = stabilizer(3);
        let decisions: Vec<FrameDecision> =
            (0..3).map(|_| s.observe(Some("A"), Some("J"))).collect();
        assert_eq!(decisions[0].candidate.as_deref(), Some("J"));
        assert_eq!(
            decisions[2].event.as_ref().map(|e| e.letter.as_str()),
            Some("J")
        );
    }

    #[test]
    fn test_flicker_below_assurance_never_confirms() {
        let mut s = stabilizer(3);
        for i in 0..40 {
            let label = if i % 2 == 0 { "A" } else { "B" };
            let decision = s.observe(Some(label), Some("STOP"));
            assert_eq!(decision.candidate, None);
            assert_eq!(decision.event, None);
        }
    }

    #[test]
    fn test_cooldown_then_same_letter_again() {
        let mut s = stabilizer(2);
        assert!(s.observe(Some("B"), Some("STOP")).event.is_none());
        assert!(s.observe(Some("B"), Some("STOP")).event.is_some());

        // still locked
        assert!(s.observe(Some("C"), Some("STOP")).event.is_none());
        assert_eq!(s.advance_to(Duration::from_millis(1200)), 1);
        assert_eq!(s.phase(), Phase::Idle);

        let mut confirmed = None;
        for _ in 0..4 {
            if let Some(e) = s.observe(Some("B"), Some("STOP")).event {
                confirmed = Some(e);
            }
        }
        assert_eq!(confirmed.map(|e| e.sequence), Some(2));
    }

    #[test]
    fn test_clear_resets_voters_and_machine() {
        let mut s = stabilizer(5);
        s.observe(Some("A"), Some("STOP"));
        s.observe(Some("A"), Some("STOP"));
        s.clear();
        assert!(s.static_voter().is_empty());
        assert!(s.dynamic_voter().is_empty());
        assert_eq!(s.phase(), Phase::Idle);
    }
}
