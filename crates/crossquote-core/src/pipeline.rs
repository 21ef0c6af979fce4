//! Single-instrument reconciliation: classify, select, collect, merge, score.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::{BrowserError, SharedBrowser};
use crate::collector::CollectorOutcome;
use crate::collector::Collector;
use crate::config::ReconcileConfig;
use crate::indicators::{PriceBar, TechnicalSnapshot, HISTORY_SESSIONS};
use crate::market::{classify, Market};
use crate::parallel::{ParallelCollector, TotalFailure};
use crate::reconcile::reconcile;
use crate::scoring::{score, ValidationResult};
use crate::selector::{SelectError, SourceSelector};
use crate::{ComprehensiveQuote, Provenance, ProviderId, Symbol, UtcDateTime, ValidationError};

/// One attempted provider as reported in a validated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub provider: ProviderId,
    pub provenance: Provenance,
    pub succeeded: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<&CollectorOutcome<T>> for SourceReport {
    fn from(outcome: &CollectorOutcome<T>) -> Self {
        Self {
            provider: outcome.provider,
            provenance: outcome.provenance,
            succeeded: outcome.succeeded,
            latency_ms: outcome.latency_ms,
            error: outcome.error.clone(),
        }
    }
}

/// Merged record with its verdict and the providers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedRecord {
    pub symbol: Symbol,
    pub market: Market,
    pub data: ComprehensiveQuote,
    pub validation: ValidationResult,
    /// Primary first, then secondary.
    pub sources: Vec<SourceReport>,
    pub collected_at: UtcDateTime,
}

impl ValidatedRecord {
    /// Provenances of the providers whose data made it into `data`.
    pub fn provenances_used(&self) -> Vec<Provenance> {
        let mut used = Vec::new();
        for source in self.sources.iter().filter(|source| source.succeeded) {
            if !used.contains(&source.provenance) {
                used.push(source.provenance);
            }
        }
        used
    }

    pub fn primary(&self) -> Option<&SourceReport> {
        self.sources.first()
    }

    pub fn secondary(&self) -> Option<&SourceReport> {
        self.sources.get(1)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReconcileError {
    #[error("invalid identifier: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    TotalFailure(#[from] TotalFailure),
    #[error("no price history for {symbol}: {message}")]
    NoHistory { symbol: Symbol, message: String },
}

impl ReconcileError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "reconcile.invalid_identifier",
            Self::Select(_) => "reconcile.no_provider",
            Self::TotalFailure(_) => "reconcile.total_failure",
            Self::NoHistory { .. } => "indicators.no_history",
        }
    }
}

/// Composition root for reconciliation.
///
/// Owns the selector, the timeout-bounded parallel collector and the policy
/// config. When a shared browser is attached, [`shutdown`](Self::shutdown)
/// releases it.
pub struct ReconcileEngine {
    selector: SourceSelector,
    collector: ParallelCollector,
    config: ReconcileConfig,
    browser: Option<Arc<SharedBrowser>>,
}

impl ReconcileEngine {
    /// Fails when `config` does not pass [`ReconcileConfig::validate`].
    pub fn new(
        selector: SourceSelector,
        config: ReconcileConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            collector: ParallelCollector::new(config.collect_timeout()),
            selector,
            config,
            browser: None,
        })
    }

    pub fn with_browser(mut self, browser: Arc<SharedBrowser>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    /// Reconciles one identifier end to end.
    ///
    /// Fails only for an unparseable identifier, when no provider pair can be
    /// selected, or when both providers fail. Partial data and disagreement
    /// are reported in the record's validation result instead.
    pub async fn reconcile(&self, identifier: &str) -> Result<ValidatedRecord, ReconcileError> {
        let symbol = Symbol::parse(identifier)?;
        let market = classify(&symbol);
        let pair = self.selector.select(market)?;
        debug!(
            %symbol,
            %market,
            primary = %pair.primary.id(),
            secondary = %pair.secondary.id(),
            "providers selected"
        );

        let collected = self.collector.collect(&symbol, &pair).await?;
        let merged = reconcile(
            collected.primary_payload(),
            collected.secondary_payload(),
            &self.config.tolerances,
        );
        let validation = score(&merged, &self.config.scoring);

        info!(
            %symbol,
            status = %validation.status,
            confidence = validation.confidence,
            matched = merged.matched(),
            conflicting = merged.conflicting(),
            supplemented = merged.supplemented(),
            "reconciled"
        );

        Ok(ValidatedRecord {
            symbol,
            market,
            data: merged.merged,
            validation,
            sources: vec![
                SourceReport::from(&collected.primary),
                SourceReport::from(&collected.secondary),
            ],
            collected_at: UtcDateTime::now(),
        })
    }

    /// Daily history and technical indicators for one identifier.
    ///
    /// History comes from the selected primary; the secondary baseline is
    /// asked only when the primary has none. Each request is bounded by the
    /// collection timeout.
    pub async fn indicators(&self, identifier: &str) -> Result<TechnicalSnapshot, ReconcileError> {
        let symbol = Symbol::parse(identifier)?;
        let market = classify(&symbol);
        let pair = self.selector.select(market)?;

        let mut failures = Vec::new();
        for collector in [&pair.primary, &pair.secondary] {
            let provider = collector.id();
            match self.history_from(collector.as_ref(), &symbol).await {
                Ok(bars) => {
                    if let Some(snapshot) =
                        TechnicalSnapshot::from_history(symbol.clone(), market, provider, bars)
                    {
                        info!(
                            %symbol,
                            %provider,
                            rsi = snapshot.rsi,
                            sessions = snapshot.historical_data.len(),
                            "indicators computed"
                        );
                        return Ok(snapshot);
                    }
                    failures.push(format!("{provider}: no usable closes"));
                }
                Err(error) => {
                    warn!(%symbol, %provider, %error, "price history unavailable");
                    failures.push(format!("{provider}: {error}"));
                }
            }
        }

        Err(ReconcileError::NoHistory {
            symbol,
            message: failures.join("; "),
        })
    }

    async fn history_from(
        &self,
        collector: &dyn Collector,
        symbol: &Symbol,
    ) -> Result<Vec<PriceBar>, String> {
        let timeout = self.config.collect_timeout();
        let history = collector.price_history(symbol, HISTORY_SESSIONS);
        let outcome = tokio::time::timeout(timeout, history)
            .await
            .map_err(|_| format!("timed out after {}ms", timeout.as_millis()))?;
        match outcome.payload {
            Some(bars) if outcome.succeeded => Ok(bars),
            _ => Err(outcome.error_message().to_owned()),
        }
    }

    /// Releases the shared browser, if any. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), BrowserError> {
        match &self.browser {
            Some(browser) => browser.shutdown().await,
            None => Ok(()),
        }
    }
}
