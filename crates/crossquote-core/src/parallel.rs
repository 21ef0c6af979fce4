//! Concurrent two-provider collection with per-branch timeouts.
//!
//! Each branch runs as its own task so a panicking collector is contained,
//! and is raced against its own timer so a hung provider never holds up the
//! other one. Both outcomes are resolved before this module returns.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinError;
use tracing::warn;

use crate::collector::{elapsed_ms, Collector, CollectorOutcome};
use crate::selector::SourcePair;
use crate::{ComprehensiveQuote, ProviderId, Symbol};

/// Both resolved outcomes of one reconciliation, at least one successful.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedPair {
    pub primary: CollectorOutcome<ComprehensiveQuote>,
    pub secondary: CollectorOutcome<ComprehensiveQuote>,
}

impl CollectedPair {
    pub fn primary_payload(&self) -> Option<&ComprehensiveQuote> {
        payload_of(&self.primary)
    }

    pub fn secondary_payload(&self) -> Option<&ComprehensiveQuote> {
        payload_of(&self.secondary)
    }
}

fn payload_of(outcome: &CollectorOutcome<ComprehensiveQuote>) -> Option<&ComprehensiveQuote> {
    if outcome.succeeded {
        outcome.payload.as_ref()
    } else {
        None
    }
}

/// Both providers failed; no merge is attempted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "both providers failed for {symbol}: {primary}: {primary_error}; {secondary}: {secondary_error}"
)]
pub struct TotalFailure {
    pub symbol: Symbol,
    pub primary: ProviderId,
    pub primary_error: String,
    pub secondary: ProviderId,
    pub secondary_error: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ParallelCollector {
    timeout: Duration,
}

impl ParallelCollector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `collect_all` on both providers concurrently.
    pub async fn collect(
        &self,
        symbol: &Symbol,
        pair: &SourcePair,
    ) -> Result<CollectedPair, TotalFailure> {
        let (primary, secondary) = tokio::join!(
            guarded(Arc::clone(&pair.primary), symbol.clone(), self.timeout),
            guarded(Arc::clone(&pair.secondary), symbol.clone(), self.timeout),
        );

        for outcome in [&primary, &secondary] {
            if !outcome.succeeded {
                warn!(
                    symbol = %symbol,
                    provider = %outcome.provider,
                    latency_ms = outcome.latency_ms,
                    error = outcome.error_message(),
                    "provider collection failed"
                );
            }
        }

        if !primary.succeeded && !secondary.succeeded {
            return Err(TotalFailure {
                symbol: symbol.clone(),
                primary: primary.provider,
                primary_error: primary.error_message().to_owned(),
                secondary: secondary.provider,
                secondary_error: secondary.error_message().to_owned(),
            });
        }

        Ok(CollectedPair { primary, secondary })
    }
}

async fn guarded(
    collector: Arc<dyn Collector>,
    symbol: Symbol,
    timeout: Duration,
) -> CollectorOutcome<ComprehensiveQuote> {
    let provider = collector.id();
    let started = Instant::now();
    let mut task = tokio::spawn(async move { collector.collect_all(&symbol).await });

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(error)) => {
            CollectorOutcome::failure(provider, join_message(error), elapsed_ms(started))
        }
        Err(_) => {
            task.abort();
            CollectorOutcome::failure(
                provider,
                format!("timed out after {}ms", timeout.as_millis()),
                elapsed_ms(started),
            )
        }
    }
}

fn join_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return String::from("collector task was cancelled");
    }
    match error.try_into_panic() {
        Ok(panic) => format!("collector panicked: {}", panic_text(panic.as_ref())),
        Err(_) => String::from("collector task failed"),
    }
}

fn panic_text(panic: &(dyn Any + Send)) -> &str {
    if let Some(text) = panic.downcast_ref::<&'static str>() {
        text
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.as_str()
    } else {
        "non-string panic payload"
    }
}
