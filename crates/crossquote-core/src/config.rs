//! Reconciliation policy configuration.
//!
//! Tolerance bands, the MATCH ratio and the per-status base scores are policy
//! constants, so they live here with serde defaults instead of being hard-coded
//! into the reconciler and scorer. A JSON file may override any subset.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CoreError, ValidationError};

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcileConfig {
    /// Per-provider bound on one `collect_all` call.
    pub collect_timeout_ms: u64,

    /// Pause between successive identifiers in a batch.
    pub batch_delay_ms: u64,

    pub tolerances: ToleranceBands,

    pub scoring: ScoringPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            collect_timeout_ms: 10_000,
            batch_delay_ms: 1_000,
            tolerances: ToleranceBands::default(),
            scoring: ScoringPolicy::default(),
        }
    }
}

impl ReconcileConfig {
    /// Load from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.collect_timeout_ms == 0 {
            return Err(ValidationError::ZeroDuration {
                field: "collectTimeoutMs",
            });
        }
        self.tolerances.validate()?;
        self.scoring.validate()
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Maximum relative difference per field category that still counts as agreement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToleranceBands {
    /// Session prices, change and 52-week range.
    pub price: f64,
    pub change_percent: f64,
    /// Volume and traded value.
    pub volume: f64,
    pub valuation: f64,
    pub financial: f64,
    pub foreign_ownership: f64,
    /// Foreign, institutional and individual net buying.
    pub net_flow: f64,
    /// Market cap and shares outstanding.
    pub capitalization: f64,
    /// Float shares and beta.
    pub float_and_beta: f64,
}

impl Default for ToleranceBands {
    fn default() -> Self {
        Self {
            price: 0.005,
            change_percent: 0.01,
            volume: 0.05,
            valuation: 0.01,
            financial: 0.02,
            foreign_ownership: 0.05,
            net_flow: 0.10,
            capitalization: 0.01,
            float_and_beta: 0.05,
        }
    }
}

impl ToleranceBands {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let bands = [
            ("price", self.price),
            ("changePercent", self.change_percent),
            ("volume", self.volume),
            ("valuation", self.valuation),
            ("financial", self.financial),
            ("foreignOwnership", self.foreign_ownership),
            ("netFlow", self.net_flow),
            ("capitalization", self.capitalization),
            ("floatAndBeta", self.float_and_beta),
        ];

        for (field, value) in bands {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::InvalidTolerance { field, value });
            }
        }
        Ok(())
    }
}

/// Status thresholds and base confidence per status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringPolicy {
    /// Share of reported fields that must match (with zero conflicts) for MATCH.
    pub match_ratio: f64,
    pub base_scores: BaseScores,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            match_ratio: 0.5,
            base_scores: BaseScores::default(),
        }
    }
}

impl ScoringPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.match_ratio.is_finite() || self.match_ratio <= 0.0 || self.match_ratio > 1.0 {
            return Err(ValidationError::InvalidMatchRatio {
                value: self.match_ratio,
            });
        }
        self.base_scores.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseScores {
    #[serde(rename = "MATCH")]
    pub matched: f64,
    #[serde(rename = "PARTIAL")]
    pub partial: f64,
    #[serde(rename = "CONFLICT")]
    pub conflict: f64,
    #[serde(rename = "SINGLE")]
    pub single: f64,
    #[serde(rename = "EMPTY")]
    pub empty: f64,
}

impl Default for BaseScores {
    fn default() -> Self {
        Self {
            matched: 0.98,
            partial: 0.85,
            conflict: 0.70,
            single: 0.65,
            empty: 0.0,
        }
    }
}

impl BaseScores {
    /// Scores must lie in `[0, 1]` and keep MATCH > PARTIAL > {CONFLICT, SINGLE} > EMPTY.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let scores = [
            ("MATCH", self.matched),
            ("PARTIAL", self.partial),
            ("CONFLICT", self.conflict),
            ("SINGLE", self.single),
            ("EMPTY", self.empty),
        ];
        for (status, value) in scores {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::InvalidBaseScore { status, value });
            }
        }

        let ordering = [
            ("PARTIAL", self.partial, "MATCH", self.matched),
            ("CONFLICT", self.conflict, "PARTIAL", self.partial),
            ("SINGLE", self.single, "PARTIAL", self.partial),
            ("EMPTY", self.empty, "CONFLICT", self.conflict),
            ("EMPTY", self.empty, "SINGLE", self.single),
        ];
        for (status, value, above, ceiling) in ordering {
            if value >= ceiling {
                return Err(ValidationError::BaseScoreOrder { status, above });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReconcileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collect_timeout(), Duration::from_secs(10));
        assert_eq!(config.tolerances.price, 0.005);
        assert_eq!(config.scoring.base_scores.single, 0.65);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = ReconcileConfig::from_json(
            r#"{"batchDelayMs": 250, "tolerances": {"price": 0.01}, "scoring": {"baseScores": {"SINGLE": 0.6}}}"#,
        )
        .expect("config parses");

        assert_eq!(config.batch_delay(), Duration::from_millis(250));
        assert_eq!(config.tolerances.price, 0.01);
        assert_eq!(config.tolerances.financial, 0.02);
        assert_eq!(config.scoring.base_scores.single, 0.6);
        assert_eq!(config.scoring.match_ratio, 0.5);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = ReconcileConfig::from_json(r#"{"tolerances": {"netFlow": 1.5}}"#)
            .expect_err("tolerance above one");
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidTolerance { field: "netFlow", .. })
        ));

        let err = ReconcileConfig::from_json(r#"{"scoring": {"matchRatio": 0.0}}"#)
            .expect_err("zero ratio");
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidMatchRatio { .. })
        ));

        let err = ReconcileConfig::from_json(r#"{"collectTimeoutMs": 0}"#).expect_err("zero timeout");
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::ZeroDuration { .. })
        ));
    }

    #[test]
    fn rejects_inverted_base_scores() {
        let scores = BaseScores {
            partial: 0.99,
            ..BaseScores::default()
        };
        assert_eq!(
            scores.validate(),
            Err(ValidationError::BaseScoreOrder {
                status: "PARTIAL",
                above: "MATCH",
            })
        );
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"collectTimeoutMs": 2500}}"#).expect("write config");

        let config = ReconcileConfig::from_json_file(file.path()).expect("config loads");
        assert_eq!(config.collect_timeout_ms, 2_500);

        let missing = ReconcileConfig::from_json_file("/nonexistent/crossquote.json");
        assert!(matches!(missing, Err(CoreError::ConfigRead { .. })));
    }
}
