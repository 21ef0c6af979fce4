use std::time::{Duration, Instant};

use crate::collector::{assemble_quote, CollectFuture, Collector, CollectorOutcome, SourceError};
use crate::indicators::PriceBar;
use crate::market::{classify, Market};
use crate::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, ProviderId,
    SupplyDemandData, Symbol, ValuationData,
};

/// Deterministic offline collector.
///
/// Figures are derived from the symbol alone, so two fixtures for different
/// providers agree exactly unless a skew is applied. Used by `--mock` runs and
/// by tests that need scripted providers (fixed payloads, failures, latency,
/// panics).
#[derive(Debug, Clone)]
pub struct FixtureCollector {
    provider: ProviderId,
    skew: f64,
    latency: Duration,
    failure: Option<String>,
    panics: bool,
    quote: Option<ComprehensiveQuote>,
}

impl FixtureCollector {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            skew: 0.0,
            latency: Duration::ZERO,
            failure: None,
            panics: false,
            quote: None,
        }
    }

    /// Scales every generated number by `1 + skew`.
    pub fn with_skew(mut self, skew: f64) -> Self {
        self.skew = skew;
        self
    }

    /// Sleeps this long inside every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every operation fails with `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// `collect_all` panics; exercises fault isolation in callers.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Returns `quote` verbatim instead of generated figures.
    pub fn with_quote(mut self, quote: ComprehensiveQuote) -> Self {
        self.quote = Some(quote);
        self
    }

    fn snapshot(&self, symbol: &Symbol) -> Result<ComprehensiveQuote, SourceError> {
        if let Some(message) = &self.failure {
            return Err(SourceError::unavailable(message.clone()));
        }
        Ok(self
            .quote
            .clone()
            .unwrap_or_else(|| generate(symbol, 1.0 + self.skew)))
    }

    fn part<'a, T, F>(&'a self, symbol: &'a Symbol, project: F) -> CollectFuture<'a, T>
    where
        T: Send + 'a,
        F: FnOnce(ComprehensiveQuote) -> Result<T, SourceError> + Send + 'a,
    {
        Box::pin(async move {
            let started = Instant::now();
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let result = self.snapshot(symbol).and_then(project);
            CollectorOutcome::from_result(self.provider, result, started)
        })
    }
}

impl Collector for FixtureCollector {
    fn id(&self) -> ProviderId {
        self.provider
    }

    fn basic_info<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, BasicInfo> {
        self.part(symbol, |quote| Ok(quote.basic_info))
    }

    fn price_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, PriceData> {
        self.part(symbol, |quote| Ok(quote.price_data))
    }

    fn valuation_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, ValuationData> {
        self.part(symbol, |quote| Ok(quote.valuation_data))
    }

    fn financial_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, FinancialData> {
        self.part(symbol, |quote| Ok(quote.financial_data))
    }

    fn supply_demand_data<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> CollectFuture<'a, SupplyDemandData> {
        let scripted = self.quote.is_some();
        self.part(symbol, move |quote| {
            if !scripted && classify(symbol) == Market::Us {
                return Err(SourceError::not_found(
                    "investor flows are not published for us listings",
                ));
            }
            Ok(quote.supply_demand_data)
        })
    }

    fn market_data<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, MarketData> {
        self.part(symbol, |quote| Ok(quote.market_data))
    }

    fn collect_all<'a>(&'a self, symbol: &'a Symbol) -> CollectFuture<'a, ComprehensiveQuote> {
        Box::pin(async move {
            if self.panics {
                panic!("fixture collector for {} was scripted to panic", self.provider);
            }
            if let Some(message) = &self.failure {
                let started = Instant::now();
                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                return CollectorOutcome::from_result(
                    self.provider,
                    Err(SourceError::unavailable(message.clone())),
                    started,
                );
            }
            assemble_quote(self, symbol).await
        })
    }

    fn price_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        sessions: usize,
    ) -> CollectFuture<'a, Vec<PriceBar>> {
        self.part(symbol, move |quote| {
            let last = quote.price_data.current_price.ok_or_else(|| {
                SourceError::not_found(format!("fixture has no price for {symbol}"))
            })?;
            Ok(history(symbol, last, sessions))
        })
    }
}

/// Calendar-day bars ending today whose final close is `last`.
fn history(symbol: &Symbol, last: f64, sessions: usize) -> Vec<PriceBar> {
    let phase = (symbol_seed(symbol) % 7) as f64;
    let wave = |step: usize| (step as f64 * 0.9 + phase).sin();
    let today = time::OffsetDateTime::now_utc().date();
    let final_step = sessions.saturating_sub(1);

    (0..sessions)
        .map(|step| {
            let back = (final_step - step) as f64;
            let close = last * (1.0 - 0.001 * back + 0.015 * (wave(step) - wave(final_step)));
            let date = today - time::Duration::days((final_step - step) as i64);
            PriceBar {
                date: date.to_string(),
                open: close * 0.996,
                high: close * 1.011,
                low: close * 0.985,
                close,
                volume: 100_000 + symbol_seed(symbol).wrapping_add(step as u64 * 7_919) % 900_000,
            }
        })
        .collect()
}

fn generate(symbol: &Symbol, scale: f64) -> ComprehensiveQuote {
    let seed = symbol_seed(symbol);
    let market = classify(symbol);
    let code = symbol.base_code();

    let price = match market {
        Market::Korea => (100 + seed % 900) as f64 * 100.0,
        Market::Us => 20.0 + (seed % 4_000) as f64 / 10.0,
    };
    let previous_close = price * 0.99;
    let volume = (100_000 + seed % 900_000) as f64;
    let shares = (50_000_000 + (seed % 5_000) * 1_000_000) as f64;
    let eps = price / (8.0 + (seed % 300) as f64 / 10.0);
    let bps = price / (0.6 + (seed % 40) as f64 / 10.0);
    let revenue = shares * price * 0.8;

    let (listing, exchange) = match (market, symbol.suffix()) {
        (Market::Korea, Some(".KQ")) => ("KOSDAQ", "KRX"),
        (Market::Korea, _) => ("KOSPI", "KRX"),
        (Market::Us, _) => ("NASDAQ", "NMS"),
    };

    let scaled = |value: f64| Some(value * scale);

    ComprehensiveQuote {
        basic_info: BasicInfo {
            symbol: Some(symbol.as_str().to_owned()),
            name: Some(format!("Fixture {code}")),
            market: Some(listing.to_owned()),
            exchange: Some(exchange.to_owned()),
        },
        price_data: PriceData {
            current_price: scaled(price),
            previous_close: scaled(previous_close),
            open: scaled(price * 0.995),
            high: scaled(price * 1.012),
            low: scaled(price * 0.982),
            change: scaled(price - previous_close),
            change_percent: scaled((price - previous_close) / previous_close * 100.0),
            volume: scaled(volume),
            trading_value: scaled(volume * price),
            high_52_week: scaled(price * 1.35),
            low_52_week: scaled(price * 0.72),
        },
        valuation_data: ValuationData {
            per: scaled(price / eps),
            pbr: scaled(price / bps),
            eps: scaled(eps),
            bps: scaled(bps),
            roe: scaled(eps / bps * 100.0),
            dividend_yield: scaled(0.5 + (seed % 40) as f64 / 10.0),
            forward_per: scaled(price / (eps * 1.08)),
            forward_eps: scaled(eps * 1.08),
        },
        financial_data: FinancialData {
            revenue: scaled(revenue),
            operating_income: scaled(revenue * 0.14),
            net_income: scaled(revenue * 0.1),
            operating_margin: scaled(14.0),
            net_margin: scaled(10.0),
            fiscal_period: Some(String::from("2024-12")),
        },
        supply_demand_data: SupplyDemandData {
            foreign_ownership: scaled(10.0 + (seed % 400) as f64 / 10.0),
            foreign_net_buy: scaled((seed % 20_000) as f64 - 10_000.0),
            institutional_net_buy: scaled((seed % 12_000) as f64 - 6_000.0),
            individual_net_buy: scaled(6_000.0 - (seed % 12_000) as f64),
        },
        market_data: MarketData {
            market_cap: scaled(shares * price),
            shares_outstanding: scaled(shares),
            float_shares: scaled(shares * 0.78),
            beta: scaled(0.6 + (seed % 90) as f64 / 100.0),
        },
    }
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.base_code().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}
