use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::cache::{CacheKey, CacheStore};
use crate::circuit_breaker::CircuitBreaker;
use crate::collector::{CollectFuture, Collector, CollectorOutcome, SourceError};
use crate::http_client::{HttpClient, HttpRequest};
use crate::indicators::PriceBar;
use crate::market::classify;
use crate::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, ProviderId,
    SupplyDemandData, Symbol, ValuationData,
};

pub type SnapshotFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ComprehensiveQuote, SourceError>> + Send + 'a>>;

pub type HistoryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<PriceBar>, SourceError>> + Send + 'a>>;

/// Upstream that returns the whole record in one round trip.
pub trait SnapshotSource: Send + Sync {
    fn provider(&self) -> ProviderId;

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> SnapshotFuture<'a>;

    /// Daily bars, oldest first. Unsupported unless overridden.
    fn history<'a>(&'a self, _symbol: &'a Symbol, _sessions: usize) -> HistoryFuture<'a> {
        let provider = self.provider();
        Box::pin(async move {
            Err(SourceError::invalid_request(format!(
                "{provider} does not serve price history"
            )))
        })
    }
}

/// Adapts a [`SnapshotSource`] to the collector contract.
///
/// `collect_all` performs one fetch; sub-record operations fetch and project,
/// so with a cache attached repeated sub-record calls cost one upstream hit.
pub struct SnapshotCollector<S> {
    source: S,
    cache: CacheStore,
}

impl<S: SnapshotSource> SnapshotCollector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: CacheStore::disabled(),
        }
    }

    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = cache;
        self
    }

    async fn snapshot(&self, symbol: &Symbol) -> Result<ComprehensiveQuote, SourceError> {
        let key = CacheKey::new(self.source.provider(), classify(symbol), symbol.clone());
        if let Some(body) = self.cache.get(&key).await {
            if let Ok(quote) = serde_json::from_str::<ComprehensiveQuote>(&body) {
                debug!(%key, "snapshot cache hit");
                return Ok(quote);
            }
        }

        let quote = self.source.fetch(symbol).await?;
        if quote.is_empty() {
            return Err(SourceError::not_found(format!(
                "{} returned no figures for {symbol}",
                self.source.provider()
            )));
        }
        if let Ok(body) = serde_json::to_string(&quote) {
            self.cache.put(key, body, None).await;
        }
        Ok(quote)
    }

    fn project<'a, T, F>(&'a self, symbol: &'a Symbol, part: F) -> CollectFuture<'a, T>
    where
        T: Send + 'a,
        F: FnOnce(ComprehensiveQuote) -> T + Send + 'a,
    {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.snapshot(symbol).await.map(part);
            CollectorOutcome::from_result(self.source.provider(), result, started)
        })
    }
}

impl<S: SnapshotSource> Collector for SnapshotCollector<S> {
    fn id(&self) -> ProviderId {
        self.source.provider()
    }

    fn basic_info<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, BasicInfo> {
        self.project(symbol, |quote| quote.basic_info)
    }

    fn price_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, PriceData> {
        self.project(symbol, |quote| quote.price_data)
    }

    fn valuation_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, ValuationData> {
        self.project(symbol, |quote| quote.valuation_data)
    }

    fn financial_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, FinancialData> {
        self.project(symbol, |quote| quote.financial_data)
    }

    fn supply_demand_data<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> CollectFuture<'a, SupplyDemandData> {
        self.project(symbol, |quote| quote.supply_demand_data)
    }

    fn market_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, MarketData> {
        self.project(symbol, |quote| quote.market_data)
    }

    fn collect_all<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, ComprehensiveQuote> {
        self.project(symbol, |quote| quote)
    }

    fn price_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        sessions: usize,
    ) -> CollectFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.source.history(symbol, sessions).await.and_then(|bars| {
                if bars.is_empty() {
                    Err(SourceError::not_found(format!(
                        "{} returned no price history for {symbol}",
                        self.source.provider()
                    )))
                } else {
                    Ok(bars)
                }
            });
            CollectorOutcome::from_result(self.source.provider(), result, started)
        })
    }
}

/// HTTP plumbing shared by the reference sources: circuit breaker, status
/// mapping and transport error mapping.
pub(crate) struct Upstream {
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: CircuitBreaker,
}

impl Upstream {
    pub(crate) fn new(provider: ProviderId, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            provider,
            http_client,
            circuit_breaker: CircuitBreaker::for_provider(provider),
        }
    }

    pub(crate) async fn fetch_text(&self, request: HttpRequest) -> Result<String, SourceError> {
        if let Err(cooldown) = self.circuit_breaker.admit() {
            return Err(SourceError::unavailable(format!(
                "{} circuit is open; retry in {}s",
                self.provider,
                cooldown.as_secs().max(1)
            )));
        }

        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            if error.retryable() {
                SourceError::unavailable(format!("{} transport error: {error}", self.provider))
            } else {
                SourceError::internal(format!("{} transport error: {error}", self.provider))
            }
        })?;

        match response.status {
            200..=299 => {
                self.circuit_breaker.record_success();
                Ok(response.body)
            }
            404 => {
                self.circuit_breaker.record_success();
                Err(SourceError::not_found(format!(
                    "{} has no data for this symbol",
                    self.provider
                )))
            }
            429 => {
                self.circuit_breaker.record_failure();
                Err(SourceError::rate_limited(format!(
                    "{} upstream returned status 429",
                    self.provider
                )))
            }
            status => {
                self.circuit_breaker.record_failure();
                Err(SourceError::unavailable(format!(
                    "{} upstream returned status {status}",
                    self.provider
                )))
            }
        }
    }

    pub(crate) async fn fetch_json<T>(&self, request: HttpRequest) -> Result<T, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.fetch_text(request).await?;
        serde_json::from_str(&body).map_err(|error| {
            SourceError::parse(format!("failed to parse {} response: {error}", self.provider))
        })
    }
}

/// Drops non-finite values so they never reach reconciliation.
pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite())
}

/// Parses a figure that may carry thousands separators, a percent sign or a
/// sentinel such as `N/A` or `-`.
pub(crate) fn parse_figure(raw: &str) -> Option<f64> {
    let cleaned = raw
        .trim()
        .trim_end_matches('%')
        .replace(',', "");
    if cleaned.is_empty() || matches!(cleaned.as_str(), "-" | "N/A" | "None" | "N/D") {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Non-blank owned string.
pub(crate) fn text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::http_client::{HttpError, ScriptedHttpClient};

    struct CountingSource {
        calls: AtomicUsize,
        empty: bool,
    }

    impl SnapshotSource for CountingSource {
        fn provider(&self) -> ProviderId {
            ProviderId::Stooq
        }

        fn fetch<'a>(&'a self, _symbol: &'a Symbol) -> SnapshotFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let empty = self.empty;
            Box::pin(async move {
                let mut quote = ComprehensiveQuote::default();
                if !empty {
                    quote.price_data.current_price = Some(189.5);
                }
                Ok(quote)
            })
        }
    }

    #[tokio::test]
    async fn cache_serves_sub_record_calls() {
        let collector = SnapshotCollector::new(CountingSource {
            calls: AtomicUsize::new(0),
            empty: false,
        })
        .with_cache(CacheStore::with_default_ttl());
        let symbol = Symbol::parse("AAPL").expect("valid symbol");

        let all = collector.collect_all(&symbol).await;
        let price = collector.price_data(&symbol).await;

        assert!(all.succeeded);
        assert_eq!(price.payload.and_then(|p| p.current_price), Some(189.5));
        assert_eq!(collector.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_snapshot_is_not_found() {
        let collector = SnapshotCollector::new(CountingSource {
            calls: AtomicUsize::new(0),
            empty: true,
        });
        let symbol = Symbol::parse("ZZZZ").expect("valid symbol");

        let outcome = collector.collect_all(&symbol).await;

        assert!(!outcome.succeeded);
        assert!(outcome.error_message().contains("source.not_found"));
    }

    #[tokio::test]
    async fn history_is_unsupported_without_an_override() {
        let collector = SnapshotCollector::new(CountingSource {
            calls: AtomicUsize::new(0),
            empty: false,
        });
        let symbol = Symbol::parse("AAPL").expect("valid symbol");

        let outcome = collector.price_history(&symbol, 120).await;

        assert!(!outcome.succeeded);
        assert_eq!(
            outcome.error_message(),
            "stooq does not serve price history (source.invalid_request)"
        );
    }

    #[tokio::test]
    async fn upstream_maps_statuses_and_opens_breaker() {
        let client = Arc::new(
            ScriptedHttpClient::new()
                .route("/missing", 404, "")
                .route("/busy", 429, "")
                .fail("/down", HttpError::new("connection reset")),
        );
        let upstream = Upstream::new(ProviderId::Yahoo, client);

        let missing = upstream
            .fetch_text(HttpRequest::get("https://example.test/missing"))
            .await
            .expect_err("404");
        let busy = upstream
            .fetch_text(HttpRequest::get("https://example.test/busy"))
            .await
            .expect_err("429");
        assert_eq!(missing.kind(), crate::SourceErrorKind::NotFound);
        assert_eq!(busy.kind(), crate::SourceErrorKind::RateLimited);

        for _ in 0..2 {
            let _ = upstream
                .fetch_text(HttpRequest::get("https://example.test/down"))
                .await;
        }
        let blocked = upstream
            .fetch_text(HttpRequest::get("https://example.test/missing"))
            .await
            .expect_err("breaker open");
        assert!(blocked.message().contains("circuit is open"));
    }

    #[test]
    fn figures_tolerate_formatting_noise() {
        assert_eq!(parse_figure("1,234.5"), Some(1_234.5));
        assert_eq!(parse_figure(" 12.5% "), Some(12.5));
        assert_eq!(parse_figure("N/A"), None);
        assert_eq!(parse_figure("-"), None);
        assert_eq!(parse_figure("NaN"), None);
        assert_eq!(text(Some("  ")), None);
    }
}
