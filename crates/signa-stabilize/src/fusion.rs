//! Decision Fusion - arbitration between the static and dynamic votes
//!
//! "STOP" from the motion model means the hand has settled, which is the
//! only time the single-pose model is trusted. Excluded letters are
//! static-model confusions and can only come through the motion branch.

use std::collections::BTreeSet;

use signa_core::FusionConfig;

use crate::VoteResult;

/// Stateless fusion rule over two vote results
#[derive(Debug, Clone)]
pub struct DecisionFusion {
    assurance: f64,
    stop_label: String,
    exclusion: BTreeSet<String>,
}

impl DecisionFusion {
    pub fn new(config: &FusionConfig) -> Self {
        DecisionFusion {
            assurance: config.assurance,
            stop_label: config.stop_label.clone(),
            exclusion: config.exclusion.clone(),
        }
    }

    /// At most one candidate label for this frame
    pub fn fuse(&self, static_vote: &VoteResult, dynamic_vote: &VoteResult) -> Option<String> {
        let dynamic_is_stop = dynamic_vote.label() == Some(self.stop_label.as_str());

        if static_vote.frequency > self.assurance && dynamic_is_stop {
            if let Some(label) = static_vote.label() {
                if !self.exclusion.contains(label) {
                    return Some(label.to_string());
                }
            }
        }

        if dynamic_vote.frequency > self.assurance && !dynamic_is_stop {
            return dynamic_vote.label.clone();
        }

        None
    }

    pub fn is_excluded(&self, label: &str) -> bool {
        self.exclusion.contains(label)
    }
}

impl Default for DecisionFusion {
    fn default() -> Self {
        Self::new(&FusionConfig::default())
    }
}
