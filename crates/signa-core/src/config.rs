//! Pipeline configuration
//!
//! All values are fixed at construction time. Every struct loads from JSON
//! with missing fields falling back to the defaults below.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{SignaError, SignaResult};

/// Label the classifiers emit when they have no usable prediction
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Label the dynamic classifier emits once the hand has settled
pub const STOP_LABEL: &str = "STOP";

/// Landmark window configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window capacity in frames
    pub max_frames: usize,
    /// Floats per frame (two per tracked point)
    pub num_points: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            max_frames: 16,
            num_points: 12,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> SignaResult<()> {
        if self.max_frames == 0 {
            return Err(invalid("window.max_frames must be positive"));
        }
        if self.num_points == 0 || self.num_points % 2 != 0 {
            return Err(invalid(format!(
                "window.num_points must be a positive even number, got {}",
                self.num_points
            )));
        }
        Ok(())
    }
}

/// Vote override applied when two labels co-occur in a history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForcedVote {
    /// Label that wins the vote
    pub label: String,
    /// Label whose presence alongside `label` triggers the override
    pub companion: String,
    /// Frequency reported for the override
    pub frequency: f64,
}

impl Default for ForcedVote {
    fn default() -> Self {
        ForcedVote {
            label: "G".to_string(),
            companion: UNKNOWN_LABEL.to_string(),
            frequency: 0.9,
        }
    }
}

/// Rolling label vote configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoterConfig {
    /// Number of labels kept per classifier stream
    pub vote_window: usize,
    pub forced_vote: Option<ForcedVote>,
}

impl Default for VoterConfig {
    fn default() -> Self {
        VoterConfig {
            vote_window: 8,
            forced_vote: Some(ForcedVote::default()),
        }
    }
}

impl VoterConfig {
    pub fn validate(&self) -> SignaResult<()> {
        if self.vote_window == 0 {
            return Err(invalid("voter.vote_window must be positive"));
        }
        if let Some(forced) = &self.forced_vote {
            if !(0.0..=1.0).contains(&forced.frequency) {
                return Err(invalid(format!(
                    "voter.forced_vote.frequency must lie in [0, 1], got {}",
                    forced.frequency
                )));
            }
        }
        Ok(())
    }
}

/// Static/dynamic fusion configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Minimum vote frequency (exclusive) for a model to be trusted
    pub assurance: f64,
    /// Dynamic label meaning "hand settled, trust the static model"
    pub stop_label: String,
    /// Static labels that are only accepted through motion evidence
    pub exclusion: BTreeSet<String>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            assurance: 0.70,
            stop_label: STOP_LABEL.to_string(),
            exclusion: ["Z", "D", "F"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> SignaResult<()> {
        if !(0.0..=1.0).contains(&self.assurance) {
            return Err(invalid(format!(
                "fusion.assurance must lie in [0, 1], got {}",
                self.assurance
            )));
        }
        Ok(())
    }
}

/// One variant of an ambiguous glyph family
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRule {
    pub label: String,
    /// Variant sightings needed to override the base candidate
    pub threshold: u32,
}

impl VariantRule {
    pub fn new(label: impl Into<String>, threshold: u32) -> Self {
        VariantRule {
            label: label.into(),
            threshold,
        }
    }
}

/// A base glyph whose variant can only be told apart over several frames
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousFamily {
    pub base: String,
    /// Initial counter value for the base candidate; negative slows confirmation
    pub bias: i32,
    /// Checked in order when several cross their threshold on the same frame
    pub variants: Vec<VariantRule>,
}

impl AmbiguousFamily {
    /// Polish Z family: Z, Ź, Ż
    pub fn polish_z() -> Self {
        AmbiguousFamily {
            base: "Z".to_string(),
            bias: -8,
            variants: vec![VariantRule::new("Ź", 8), VariantRule::new("Ż", 4)],
        }
    }

    pub fn variant_index(&self, label: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.label == label)
    }

    fn validate(&self) -> SignaResult<()> {
        if self.variants.is_empty() {
            return Err(invalid(format!(
                "ambiguous family '{}' has no variants",
                self.base
            )));
        }
        if self.bias > 0 {
            return Err(invalid(format!(
                "ambiguous family '{}' bias must not be positive, got {}",
                self.base, self.bias
            )));
        }
        for variant in &self.variants {
            if variant.threshold == 0 {
                return Err(invalid(format!(
                    "variant '{}' of family '{}' has no threshold",
                    variant.label, self.base
                )));
            }
            if variant.label == self.base {
                return Err(invalid(format!(
                    "family '{}' lists its base as a variant",
                    self.base
                )));
            }
        }
        Ok(())
    }
}

/// Confirmation state machine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Consecutive matching frames needed to confirm a candidate
    pub confirmation_threshold: u32,
    /// Lock period after a confirmation
    pub cooldown_delay_ms: u64,
    pub unknown_label: String,
    pub families: Vec<AmbiguousFamily>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        ConfirmationConfig {
            confirmation_threshold: 8,
            cooldown_delay_ms: 1200,
            unknown_label: UNKNOWN_LABEL.to_string(),
            families: vec![AmbiguousFamily::polish_z()],
        }
    }
}

impl ConfirmationConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_delay_ms)
    }

    /// Family whose base glyph is `label`
    pub fn family_for(&self, label: &str) -> Option<&AmbiguousFamily> {
        self.families.iter().find(|f| f.base == label)
    }

    pub fn validate(&self) -> SignaResult<()> {
        if self.confirmation_threshold == 0 {
            return Err(invalid("confirmation.confirmation_threshold must be positive"));
        }
        let mut bases = BTreeSet::new();
        for family in &self.families {
            family.validate()?;
            if !bases.insert(family.base.as_str()) {
                return Err(invalid(format!(
                    "ambiguous family '{}' is defined twice",
                    family.base
                )));
            }
        }
        Ok(())
    }
}

/// Key-point extraction configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Key-points per tracked hand
    pub landmark_count: usize,
    /// Points fed to the dynamic model (wrist and fingertips)
    pub dynamic_indices: Vec<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            landmark_count: 21,
            dynamic_indices: vec![0, 4, 8, 12, 16, 20],
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> SignaResult<()> {
        if self.dynamic_indices.is_empty() {
            return Err(invalid("extraction.dynamic_indices must not be empty"));
        }
        if let Some(&bad) = self
            .dynamic_indices
            .iter()
            .find(|&&idx| idx >= self.landmark_count)
        {
            return Err(invalid(format!(
                "extraction.dynamic_indices entry {} exceeds landmark_count {}",
                bad, self.landmark_count
            )));
        }
        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    pub voter: VoterConfig,
    pub fusion: FusionConfig,
    pub confirmation: ConfirmationConfig,
    pub extraction: ExtractionConfig,
    /// Drop window and vote histories after each confirmed letter
    pub clear_history_on_confirm: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            window: WindowConfig::default(),
            voter: VoterConfig::default(),
            fusion: FusionConfig::default(),
            confirmation: ConfirmationConfig::default(),
            extraction: ExtractionConfig::default(),
            clear_history_on_confirm: true,
        }
    }
}

impl PipelineConfig {
    /// Faster confirmation with a longer lock, for fluent signers
    pub fn responsive() -> Self {
        PipelineConfig {
            confirmation: ConfirmationConfig {
                confirmation_threshold: 5,
                cooldown_delay_ms: 1500,
                ..ConfirmationConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    pub fn validate(&self) -> SignaResult<()> {
        self.window.validate()?;
        self.voter.validate()?;
        self.fusion.validate()?;
        self.confirmation.validate()?;
        self.extraction.validate()?;

        let expected = self.extraction.dynamic_indices.len() * 2;
        if self.window.num_points != expected {
            return Err(invalid(format!(
                "window.num_points is {} but {} dynamic indices need {}",
                self.window.num_points,
                self.extraction.dynamic_indices.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> SignaResult<Self> {
        let config: PipelineConfig =
            serde_json::from_str(json).map_err(|e| SignaError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SignaResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

fn invalid(msg: impl Into<String>) -> SignaError {
    SignaError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window.max_frames, 16);
        assert_eq!(config.window.num_points, 12);
        assert_eq!(config.voter.vote_window, 8);
        assert!((config.fusion.assurance - 0.70).abs() < f64::EPSILON);
        assert_eq!(config.confirmation.cooldown(), Duration::from_millis(1200));
    }

    #[test]
    fn test_responsive_preset() {
        let config = PipelineConfig::responsive();
        assert!(config.validate().is_ok());
        assert_eq!(config.confirmation.confirmation_threshold, 5);
        assert_eq!(config.confirmation.cooldown_delay_ms, 1500);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "confirmation": { "confirmation_threshold": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.confirmation.confirmation_threshold, 5);
        assert_eq!(config.confirmation.cooldown_delay_ms, 1200);
        assert_eq!(config.confirmation.families.len(), 1);
        assert_eq!(config.window.max_frames, 16);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = PipelineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SignaError::ConfigParse(_)));
    }

    #[test]
    fn test_variant_without_threshold_rejected() {
        let mut config = PipelineConfig::default();
        config.confirmation.families[0].variants[0].threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(SignaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_family_without_variants_rejected() {
        let mut config = PipelineConfig::default();
        config.confirmation.families[0].variants.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_family_rejected() {
        let mut config = PipelineConfig::default();
        config
            .confirmation
            .families
            .push(AmbiguousFamily::polish_z());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_positive_bias_rejected() {
        let mut config = PipelineConfig::default();
        config.confirmation.families[0].bias = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_point_count_must_match_indices() {
        let mut config = PipelineConfig::default();
        config.window.num_points = 10;
        assert!(config.validate().is_err());

        config.window.num_points = 11;
        assert!(config.window.validate().is_err());
    }

    #[test]
    fn test_dynamic_index_out_of_range_rejected() {
        let mut config = PipelineConfig::default();
        config.extraction.dynamic_indices[5] = 21;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_family_lookup() {
        let config = ConfirmationConfig::default();
        let family = config.family_for("Z").unwrap();
        assert_eq!(family.variant_index("Ż"), Some(1));
        assert!(config.family_for("A").is_none());
    }
}
