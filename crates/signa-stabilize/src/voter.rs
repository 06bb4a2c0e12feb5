//! Label Voter - rolling majority vote over one classifier stream

use std::collections::VecDeque;

use signa_core::{ForcedVote, VoterConfig};

/// Mode of a label history and its share of the history
#[derive(Clone, Debug, PartialEq)]
pub struct VoteResult {
    pub label: Option<String>,
    /// Share of the history held by `label`, in [0, 1]
    pub frequency: f64,
}

impl VoteResult {
    pub fn new(label: impl Into<String>, frequency: f64) -> Self {
        VoteResult {
            label: Some(label.into()),
            frequency,
        }
    }

    /// Result of voting over an empty history
    pub fn empty() -> Self {
        VoteResult {
            label: None,
            frequency: 0.0,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Bounded history of the last `vote_window` labels from one classifier
///
/// Ties between equally frequent labels go to the label whose first
/// occurrence is oldest in the history.
#[derive(Debug, Clone)]
pub struct LabelVoter {
    history: VecDeque<String>,
    vote_window: usize,
    forced_vote: Option<ForcedVote>,
}

impl LabelVoter {
    pub fn new(config: &VoterConfig) -> Self {
        LabelVoter {
            history: VecDeque::with_capacity(config.vote_window + 1),
            vote_window: config.vote_window,
            forced_vote: config.forced_vote.clone(),
        }
    }

    /// Append a label; `None` leaves the history untouched
    ///
    /// "UNKNOWN" is recorded like any other label. Deciding whether a frame
    /// produced a label at all is the caller's job.
    pub fn record(&mut self, label: Option<&str>) {
        let Some(label) = label else {
            return;
        };
        self.history.push_back(label.to_string());
        while self.history.len() > self.vote_window {
            self.history.pop_front();
        }
    }

    pub fn vote(&self) -> VoteResult {
        if let Some(forced) = &self.forced_vote {
            if self.contains(&forced.label) && self.contains(&forced.companion) {
                return VoteResult::new(forced.label.clone(), forced.frequency);
            }
        }

        // First-seen order; strict comparison keeps the earliest on ties
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for label in &self.history {
            match counts.iter_mut().find(|(l, _)| *l == label.as_str()) {
                Some((_, n)) => *n += 1,
                None => counts.push((label.as_str(), 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for &(label, count) in &counts {
            if best.map_or(true, |(_, n)| count > n) {
                best = Some((label, count));
            }
        }

        match best {
            Some((label, count)) => {
                VoteResult::new(label, count as f64 / self.history.len() as f64)
            }
            None => VoteResult::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// History oldest first
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(|s| s.as_str())
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    fn contains(&self, label: &str) -> bool {
        self.history.iter().any(|l| l == label)
    }
}

impl Default for LabelVoter {
    fn default() -> Self {
        Self::new(&VoterConfig::default())
    }
}
