//! Status classification and confidence scoring of a reconciliation.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::config::ScoringPolicy;
use crate::reconcile::Reconciliation;

/// Overall agreement verdict for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Match,
    Partial,
    Conflict,
    Single,
    Empty,
}

impl ValidationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Partial => "PARTIAL",
            Self::Conflict => "CONFLICT",
            Self::Single => "SINGLE",
            Self::Empty => "EMPTY",
        }
    }

    /// Classifies from matched, conflicting and supplemented counts.
    pub fn classify(
        matched: usize,
        conflicting: usize,
        supplemented: usize,
        match_ratio: f64,
    ) -> Self {
        let reported = matched + conflicting + supplemented;
        if reported == 0 {
            Self::Empty
        } else if conflicting == 0 && matched as f64 >= match_ratio * reported as f64 {
            Self::Match
        } else if matched > 0 {
            Self::Partial
        } else if conflicting > 0 {
            Self::Conflict
        } else {
            Self::Single
        }
    }
}

impl Display for ValidationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict attached to a validated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub matched_fields: Vec<String>,
    pub conflicting_fields: Vec<String>,
    pub supplemented_fields: Vec<String>,
    pub confidence: f64,
}

pub fn score(reconciliation: &Reconciliation, policy: &ScoringPolicy) -> ValidationResult {
    let matched = reconciliation.matched();
    let conflicting = reconciliation.conflicting();
    let status = ValidationStatus::classify(
        matched,
        conflicting,
        reconciliation.supplemented(),
        policy.match_ratio,
    );
    let owned = |names: &[&'static str]| -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    };

    ValidationResult {
        status,
        matched_fields: owned(&reconciliation.matched_fields),
        conflicting_fields: owned(&reconciliation.conflicting_fields),
        supplemented_fields: owned(&reconciliation.supplemented_fields),
        confidence: confidence(status, matched, conflicting, policy),
    }
}

/// Base score for `status`, scaled by `0.7 + 0.3 * M / max(1, M + C)` and
/// rounded to two decimals.
pub fn confidence(
    status: ValidationStatus,
    matched: usize,
    conflicting: usize,
    policy: &ScoringPolicy,
) -> f64 {
    let scores = &policy.base_scores;
    let base = match status {
        ValidationStatus::Match => scores.matched,
        ValidationStatus::Partial => scores.partial,
        ValidationStatus::Conflict => scores.conflict,
        ValidationStatus::Single => scores.single,
        ValidationStatus::Empty => scores.empty,
    };
    let compared = (matched + conflicting).max(1) as f64;
    round_cents(base * (0.7 + 0.3 * matched as f64 / compared))
}

// f64::round is half-away-from-zero; the nudge absorbs representation error
// such as 0.845 being stored as 0.84499999.
pub(crate) fn round_cents(value: f64) -> f64 {
    let scaled = value * 100.0;
    let nudged = scaled + scaled.signum() * 1e-9;
    nudged.round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseScores, ScoringPolicy};

    fn policy() -> ScoringPolicy {
        ScoringPolicy::default()
    }

    #[test]
    fn classification_follows_count_rules() {
        assert_eq!(ValidationStatus::classify(0, 0, 0, 0.5), ValidationStatus::Empty);
        assert_eq!(ValidationStatus::classify(5, 0, 5, 0.5), ValidationStatus::Match);
        assert_eq!(ValidationStatus::classify(4, 0, 5, 0.5), ValidationStatus::Partial);
        assert_eq!(ValidationStatus::classify(9, 1, 0, 0.5), ValidationStatus::Partial);
        assert_eq!(ValidationStatus::classify(0, 3, 4, 0.5), ValidationStatus::Conflict);
        assert_eq!(ValidationStatus::classify(0, 0, 12, 0.5), ValidationStatus::Single);
    }

    #[test]
    fn confidence_scales_with_match_share() {
        assert_eq!(confidence(ValidationStatus::Match, 10, 0, &policy()), 0.98);
        assert_eq!(confidence(ValidationStatus::Single, 0, 0, &policy()), 0.46);
        assert_eq!(confidence(ValidationStatus::Conflict, 0, 4, &policy()), 0.49);
        assert_eq!(confidence(ValidationStatus::Empty, 0, 0, &policy()), 0.0);
        // 0.85 * (0.7 + 0.3 * 0.5) = 0.7225
        assert_eq!(confidence(ValidationStatus::Partial, 2, 2, &policy()), 0.72);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_cents(0.845), 0.85);
        assert_eq!(round_cents(0.844), 0.84);
        assert_eq!(round_cents(-0.125), -0.13);
    }

    #[test]
    fn status_order_is_strict_for_equal_counts() {
        let at = |status| confidence(status, 3, 3, &policy());

        assert!(at(ValidationStatus::Match) > at(ValidationStatus::Partial));
        assert!(at(ValidationStatus::Partial) > at(ValidationStatus::Conflict));
        assert!(at(ValidationStatus::Partial) > at(ValidationStatus::Single));
        assert!(at(ValidationStatus::Single) > at(ValidationStatus::Empty));
    }

    #[test]
    fn monotonic_in_match_share_within_a_status() {
        let mut last = 0.0;
        for matched in 1..=10 {
            let value = confidence(ValidationStatus::Partial, matched, 10 - matched, &policy());
            assert!(value >= last);
            last = value;
        }
    }

    #[test]
    fn custom_base_scores_apply() {
        let custom = ScoringPolicy {
            match_ratio: 0.8,
            base_scores: BaseScores {
                matched: 0.9,
                ..BaseScores::default()
            },
        };

        assert_eq!(confidence(ValidationStatus::Match, 1, 0, &custom), 0.9);
        assert_eq!(
            ValidationStatus::classify(7, 0, 3, custom.match_ratio),
            ValidationStatus::Partial
        );
    }

    #[test]
    fn serializes_status_in_upper_case() {
        let result = ValidationResult {
            status: ValidationStatus::Partial,
            matched_fields: vec![String::from("priceData.currentPrice")],
            conflicting_fields: Vec::new(),
            supplemented_fields: Vec::new(),
            confidence: 0.72,
        };

        let value = serde_json::to_value(&result).expect("serializes");
        assert_eq!(value["status"], "PARTIAL");
        assert_eq!(value["matchedFields"][0], "priceData.currentPrice");
    }
}
