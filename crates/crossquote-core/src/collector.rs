//! Collector contract and outcome envelope.
//!
//! Every provider implements [`Collector`]. Operations never return `Err`:
//! ordinary failures (missing data, non-200 responses, parse failures) are
//! folded into a failed [`CollectorOutcome`] so callers only merge data.
//!
//! | Operation | Payload |
//! |-----------|---------|
//! | [`basic_info`](Collector::basic_info) | [`BasicInfo`] |
//! | [`price_data`](Collector::price_data) | [`PriceData`] |
//! | [`valuation_data`](Collector::valuation_data) | [`ValuationData`] |
//! | [`financial_data`](Collector::financial_data) | [`FinancialData`] |
//! | [`supply_demand_data`](Collector::supply_demand_data) | [`SupplyDemandData`] |
//! | [`market_data`](Collector::market_data) | [`MarketData`] |
//! | [`collect_all`](Collector::collect_all) | [`ComprehensiveQuote`] |
//! | [`price_history`](Collector::price_history) | Daily [`PriceBar`]s, oldest first |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde::Serialize;

use crate::indicators::PriceBar;
use crate::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, Provenance, ProviderId,
    SupplyDemandData, Symbol, ValidationError, ValuationData,
};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    NotFound,
    Parse,
    Internal,
}

/// Structured error used inside provider adapters before it is folded into an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Parse, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message)
    }

    fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Unavailable | SourceErrorKind::RateLimited
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Parse => "source.parse",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_request(error.to_string())
    }
}

/// Result envelope of exactly one provider call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorOutcome<T> {
    pub provider: ProviderId,
    pub provenance: Provenance,
    #[serde(skip_serializing)]
    pub payload: Option<T>,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl<T> CollectorOutcome<T> {
    pub fn success(provider: ProviderId, payload: T, latency_ms: u64) -> Self {
        Self {
            provider,
            provenance: provider.provenance(),
            payload: Some(payload),
            succeeded: true,
            error: None,
            latency_ms,
        }
    }

    pub fn failure(provider: ProviderId, error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            provider,
            provenance: provider.provenance(),
            payload: None,
            succeeded: false,
            error: Some(error.into()),
            latency_ms,
        }
    }

    /// Folds an adapter result into an outcome, measuring latency from `started`.
    pub fn from_result(
        provider: ProviderId,
        result: Result<T, SourceError>,
        started: Instant,
    ) -> Self {
        let latency_ms = elapsed_ms(started);
        match result {
            Ok(payload) => Self::success(provider, payload, latency_ms),
            Err(error) => Self::failure(provider, error.to_string(), latency_ms),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CollectorOutcome<U> {
        CollectorOutcome {
            provider: self.provider,
            provenance: self.provenance,
            payload: self.payload.map(f),
            succeeded: self.succeeded,
            error: self.error,
            latency_ms: self.latency_ms,
        }
    }

    /// Error text for failed outcomes, empty for successful ones.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}

/// Boxed future returned by every collector operation.
pub type CollectFuture<'a, T> = Pin<Box<dyn Future<Output = CollectorOutcome<T>> + Send + 'a>>;

/// Provider contract consumed by the parallel collector.
///
/// Implementations must be `Send + Sync`; a single instance is shared by every
/// reconciliation in the process. Sub-record operations are independent; the
/// default [`collect_all`](Collector::collect_all) runs them concurrently and
/// succeeds when at least one of them succeeded. Providers that receive
/// everything in one upstream response should override it.
pub trait Collector: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    fn basic_info<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, BasicInfo>;

    fn price_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, PriceData>;

    fn valuation_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, ValuationData>;

    fn financial_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, FinancialData>;

    fn supply_demand_data<'a>(&'a self, symbol: &'a Symbol)
        -> CollectFuture<'a, SupplyDemandData>;

    fn market_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, MarketData>;

    /// Collects the full record.
    fn collect_all<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, ComprehensiveQuote> {
        Box::pin(assemble_quote(self, symbol))
    }

    /// Daily bars for at most the last `sessions` sessions, oldest first.
    ///
    /// Providers without a history endpoint keep this default, which fails.
    fn price_history<'a>(
        &'a self,
        _symbol: &'a Symbol,
        _sessions: usize,
    ) -> CollectFuture<'a, Vec<PriceBar>> {
        let provider = self.id();
        Box::pin(async move {
            let message = format!("{provider} does not serve price history");
            CollectorOutcome::failure(provider, message, 0)
        })
    }
}

/// Runs the six sub-record operations concurrently and assembles the record.
///
/// Succeeds when at least one sub-record succeeded; otherwise the failure
/// carries every part's error joined with `; `. This is the default
/// [`Collector::collect_all`], exposed for implementations that wrap it.
pub async fn assemble_quote<C>(
    collector: &C,
    symbol: &Symbol,
) -> CollectorOutcome<ComprehensiveQuote>
where
    C: Collector + ?Sized,
{
    let started = Instant::now();
    let (basic, price, valuation, financial, flows, market) = tokio::join!(
        collector.basic_info(symbol),
        collector.price_data(symbol),
        collector.valuation_data(symbol),
        collector.financial_data(symbol),
        collector.supply_demand_data(symbol),
        collector.market_data(symbol),
    );

    let mut parts = PartCollector::default();
    let quote = ComprehensiveQuote {
        basic_info: parts.absorb("basicInfo", basic),
        price_data: parts.absorb("priceData", price),
        valuation_data: parts.absorb("valuationData", valuation),
        financial_data: parts.absorb("financialData", financial),
        supply_demand_data: parts.absorb("supplyDemandData", flows),
        market_data: parts.absorb("marketData", market),
    };

    if parts.any_succeeded {
        CollectorOutcome::success(collector.id(), quote, elapsed_ms(started))
    } else {
        CollectorOutcome::failure(collector.id(), parts.errors.join("; "), elapsed_ms(started))
    }
}

#[derive(Default)]
struct PartCollector {
    any_succeeded: bool,
    errors: Vec<String>,
}

impl PartCollector {
    fn absorb<T: Default>(&mut self, part: &str, outcome: CollectorOutcome<T>) -> T {
        match outcome.payload {
            Some(payload) if outcome.succeeded => {
                self.any_succeeded = true;
                payload
            }
            _ => {
                self.errors.push(format!(
                    "{part}: {}",
                    outcome.error.as_deref().unwrap_or("no data")
                ));
                T::default()
            }
        }
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SplitCollector {
        price_fails: bool,
        everything_fails: bool,
    }

    impl SplitCollector {
        fn part<T: Default + Send + 'static>(&self, fails: bool) -> CollectFuture<'_, T> {
            let provider = self.id();
            let fails = fails || self.everything_fails;
            Box::pin(async move {
                if fails {
                    CollectorOutcome::failure(provider, "upstream returned status 503", 1)
                } else {
                    CollectorOutcome::success(provider, T::default(), 1)
                }
            })
        }
    }

    impl Collector for SplitCollector {
        fn id(&self) -> ProviderId {
            ProviderId::Naver
        }

        fn basic_info<'a>(&'a self, _symbol: &'a Symbol) -> CollectFuture<'a, BasicInfo> {
            self.part(false)
        }

        fn price_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, PriceData> {
            let provider = self.id();
            let fails = self.price_fails || self.everything_fails;
            let code = symbol.base_code().to_owned();
            Box::pin(async move {
                if fails {
                    CollectorOutcome::failure(provider, format!("price page for {code} missing"), 1)
                } else {
                    let price = PriceData {
                        current_price: Some(71_500.0),
                        ..PriceData::default()
                    };
                    CollectorOutcome::success(provider, price, 1)
                }
            })
        }

        fn valuation_data<'a>(&'a self, _symbol: &'a Symbol) -> CollectFuture<'a, ValuationData> {
            self.part(false)
        }

        fn financial_data<'a>(&'a self, _symbol: &'a Symbol) -> CollectFuture<'a, FinancialData> {
            self.part(true)
        }

        fn supply_demand_data<'a>(
            &'a self,
            _symbol: &'a Symbol,
        ) -> CollectFuture<'a, SupplyDemandData> {
            self.part(false)
        }

        fn market_data<'a>(&'a self, _symbol: &'a Symbol) -> CollectFuture<'a, MarketData> {
            self.part(false)
        }
    }

    #[tokio::test]
    async fn collect_all_keeps_successful_parts() {
        let collector = SplitCollector {
            price_fails: false,
            everything_fails: false,
        };
        let symbol = Symbol::parse("005930").expect("valid symbol");

        let outcome = collector.collect_all(&symbol).await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.provenance, Provenance::Crawling);
        let quote = outcome.payload.expect("payload present");
        assert_eq!(quote.price_data.current_price, Some(71_500.0));
        assert_eq!(quote.financial_data, FinancialData::default());
    }

    #[tokio::test]
    async fn collect_all_fails_when_every_part_fails() {
        let collector = SplitCollector {
            price_fails: true,
            everything_fails: true,
        };
        let symbol = Symbol::parse("005930").expect("valid symbol");

        let outcome = collector.collect_all(&symbol).await;

        assert!(!outcome.succeeded);
        assert!(outcome.payload.is_none());
        let message = outcome.error_message();
        assert!(message.contains("priceData: price page for 005930 missing"));
        assert!(message.contains("marketData: upstream returned status 503"));
    }

    #[tokio::test]
    async fn price_history_is_unsupported_by_default() {
        let collector = SplitCollector {
            price_fails: false,
            everything_fails: false,
        };
        let symbol = Symbol::parse("005930").expect("valid symbol");

        let outcome = collector.price_history(&symbol, 120).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_message(), "naver does not serve price history");
    }

    #[test]
    fn from_result_folds_errors_into_failed_outcome() {
        let outcome: CollectorOutcome<PriceData> = CollectorOutcome::from_result(
            ProviderId::Yahoo,
            Err(SourceError::rate_limited("quota exhausted")),
            Instant::now(),
        );

        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_message(), "quota exhausted (source.rate_limited)");
        assert_eq!(outcome.provenance, Provenance::Api);
    }
}
