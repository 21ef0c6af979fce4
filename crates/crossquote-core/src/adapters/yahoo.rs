use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;

use super::snapshot::{finite, text, HistoryFuture, SnapshotFuture, SnapshotSource, Upstream};
use crate::collector::{SourceError, SourceErrorKind};
use crate::http_client::{HttpClient, HttpRequest};
use crate::indicators::PriceBar;
use crate::market::{classify, Market};
use crate::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, ProviderId, Symbol,
    SupplyDemandData, ValuationData,
};

const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData";
const CRUMB_ENDPOINTS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];

/// Yahoo Finance `quoteSummary`. Keyless, cookie + crumb session.
pub struct YahooSource {
    upstream: Upstream,
    http_client: Arc<dyn HttpClient>,
    crumb: Mutex<Option<String>>,
}

impl YahooSource {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Yahoo, Arc::clone(&http_client)),
            http_client,
            crumb: Mutex::new(None),
        }
    }

    /// Yahoo ticker for `symbol`: home-market codes get an exchange suffix.
    pub fn ticker(symbol: &Symbol) -> String {
        match (classify(symbol), symbol.suffix()) {
            (Market::Korea, Some(_)) => symbol.as_str().to_owned(),
            (Market::Korea, None) => format!("{}.KS", symbol.base_code()),
            (Market::Us, _) => symbol.as_str().to_owned(),
        }
    }

    async fn crumb(&self) -> Result<String, SourceError> {
        let mut slot = self.crumb.lock().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }

        // Session cookie lands in the transport's cookie jar.
        let _ = self
            .http_client
            .execute(
                HttpRequest::get("https://fc.yahoo.com")
                    .with_header("referer", "https://finance.yahoo.com/"),
            )
            .await;

        for endpoint in CRUMB_ENDPOINTS {
            let request =
                HttpRequest::get(endpoint).with_header("referer", "https://finance.yahoo.com/");
            let Ok(response) = self.http_client.execute(request).await else {
                continue;
            };
            let body = response.body.trim();
            if response.is_success() && !body.is_empty() && body.len() < 100 && !body.contains(' ')
            {
                *slot = Some(body.to_owned());
                return Ok(body.to_owned());
            }
        }

        Err(SourceError::unavailable("failed to obtain yahoo crumb"))
    }

    async fn summary(&self, symbol: &Symbol) -> Result<SummaryResult, SourceError> {
        let ticker = Self::ticker(symbol);
        let crumb = self.crumb().await?;
        let endpoint = format!(
            "https://query2.finance.yahoo.com/v10/finance/quoteSummary/{}?modules={}&crumb={}",
            urlencoding::encode(&ticker),
            SUMMARY_MODULES,
            urlencoding::encode(&crumb)
        );

        let response: SummaryResponse = match self
            .upstream
            .fetch_json(HttpRequest::get(endpoint).with_header("referer", "https://finance.yahoo.com/"))
            .await
        {
            Err(error) if error.kind() == SourceErrorKind::Unavailable => {
                // A stale crumb surfaces as 401; the next call fetches a fresh one.
                *self.crumb.lock().await = None;
                return Err(error);
            }
            other => other?,
        };

        if let Some(error) = response.quote_summary.error {
            return Err(SourceError::not_found(format!(
                "yahoo quoteSummary error for {ticker}: {}",
                error.description.unwrap_or(error.code)
            )));
        }
        response
            .quote_summary
            .result
            .and_then(|mut results| results.pop())
            .ok_or_else(|| SourceError::not_found(format!("yahoo has no summary for {ticker}")))
    }
}

impl SnapshotSource for YahooSource {
    fn provider(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> SnapshotFuture<'a> {
        Box::pin(async move {
            let result = self.summary(symbol).await?;
            Ok(normalize(symbol, result))
        })
    }

    fn history<'a>(&'a self, symbol: &'a Symbol, sessions: usize) -> HistoryFuture<'a> {
        Box::pin(async move {
            let ticker = Self::ticker(symbol);
            let endpoint = format!(
                "https://query2.finance.yahoo.com/v8/finance/chart/{}?range=1y&interval=1d",
                urlencoding::encode(&ticker)
            );
            let response: ChartResponse = self
                .upstream
                .fetch_json(
                    HttpRequest::get(endpoint).with_header("referer", "https://finance.yahoo.com/"),
                )
                .await?;

            if let Some(error) = response.chart.error {
                return Err(SourceError::not_found(format!(
                    "yahoo chart error for {ticker}: {}",
                    error.description.unwrap_or(error.code)
                )));
            }
            let result = response
                .chart
                .result
                .and_then(|mut results| results.pop())
                .ok_or_else(|| SourceError::not_found(format!("yahoo has no chart for {ticker}")))?;

            let mut bars = chart_bars(result)?;
            if bars.len() > sessions {
                bars.drain(..bars.len() - sessions);
            }
            Ok(bars)
        })
    }
}

/// Zips the chart columns into bars. Sessions without a close are skipped;
/// missing open, high or low fall back to the close.
fn chart_bars(result: ChartResult) -> Result<Vec<PriceBar>, SourceError> {
    let offset = result.meta.map_or(0, |meta| meta.gmtoffset);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let column =
        |values: &[Option<f64>], index: usize| finite(values.get(index).copied().flatten());

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (index, &timestamp) in result.timestamp.iter().enumerate() {
        let Some(close) = column(&quote.close, index) else {
            continue;
        };
        let local = time::OffsetDateTime::from_unix_timestamp(timestamp.saturating_add(offset))
            .map_err(|error| {
                SourceError::parse(format!("invalid yahoo chart timestamp: {error}"))
            })?;
        bars.push(PriceBar {
            date: local.date().to_string(),
            open: column(&quote.open, index).unwrap_or(close),
            high: column(&quote.high, index).unwrap_or(close),
            low: column(&quote.low, index).unwrap_or(close),
            close,
            volume: column(&quote.volume, index).map_or(0, |volume| volume.max(0.0) as u64),
        });
    }
    Ok(bars)
}

fn normalize(symbol: &Symbol, result: SummaryResult) -> ComprehensiveQuote {
    let price = result.price.unwrap_or_default();
    let detail = result.summary_detail.unwrap_or_default();
    let stats = result.default_key_statistics.unwrap_or_default();
    let financial = result.financial_data.unwrap_or_default();

    let revenue = raw(&financial.total_revenue);
    let operating_margin = percent(&financial.operating_margins);

    ComprehensiveQuote {
        basic_info: BasicInfo {
            symbol: text(price.symbol.as_deref()).or_else(|| Some(symbol.as_str().to_owned())),
            name: text(price.long_name.as_deref()).or_else(|| text(price.short_name.as_deref())),
            market: text(price.exchange_name.as_deref()),
            exchange: text(price.exchange.as_deref()),
        },
        price_data: PriceData {
            current_price: raw(&price.regular_market_price),
            previous_close: raw(&price.regular_market_previous_close),
            open: raw(&price.regular_market_open),
            high: raw(&price.regular_market_day_high),
            low: raw(&price.regular_market_day_low),
            change: raw(&price.regular_market_change),
            change_percent: percent(&price.regular_market_change_percent),
            volume: raw(&price.regular_market_volume),
            trading_value: match (raw(&price.regular_market_volume), raw(&price.regular_market_price)) {
                (Some(volume), Some(last)) => Some(volume * last),
                _ => None,
            },
            high_52_week: raw(&detail.fifty_two_week_high),
            low_52_week: raw(&detail.fifty_two_week_low),
        },
        valuation_data: ValuationData {
            per: raw(&detail.trailing_pe),
            pbr: raw(&stats.price_to_book),
            eps: raw(&stats.trailing_eps),
            bps: raw(&stats.book_value),
            roe: percent(&financial.return_on_equity),
            dividend_yield: percent(&detail.dividend_yield),
            forward_per: raw(&detail.forward_pe).or_else(|| raw(&stats.forward_pe)),
            forward_eps: raw(&stats.forward_eps),
        },
        financial_data: FinancialData {
            revenue,
            operating_income: match (revenue, operating_margin) {
                (Some(revenue), Some(margin)) => Some(revenue * margin / 100.0),
                _ => None,
            },
            net_income: raw(&stats.net_income_to_common),
            operating_margin,
            net_margin: percent(&financial.profit_margins),
            fiscal_period: stats
                .most_recent_quarter
                .as_ref()
                .and_then(|value| text(value.fmt.as_deref())),
        },
        supply_demand_data: SupplyDemandData::default(),
        market_data: MarketData {
            market_cap: raw(&price.market_cap).or_else(|| raw(&detail.market_cap)),
            shares_outstanding: raw(&stats.shares_outstanding),
            float_shares: raw(&stats.float_shares),
            beta: raw(&detail.beta).or_else(|| raw(&stats.beta)),
        },
    }
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    finite(value.as_ref().and_then(|value| value.raw))
}

/// Yahoo reports ratios as fractions.
fn percent(value: &Option<RawValue>) -> Option<f64> {
    raw(value).map(|fraction| fraction * 100.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryEnvelope,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(default)]
    result: Option<Vec<SummaryResult>>,
    #[serde(default)]
    error: Option<SummaryError>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<SummaryError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartMeta {
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SummaryError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryResult {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetailModule>,
    default_key_statistics: Option<KeyStatisticsModule>,
    financial_data: Option<FinancialDataModule>,
}

#[derive(Debug, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
    #[serde(default)]
    fmt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PriceModule {
    symbol: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
    exchange: Option<String>,
    exchange_name: Option<String>,
    regular_market_price: Option<RawValue>,
    regular_market_previous_close: Option<RawValue>,
    regular_market_open: Option<RawValue>,
    regular_market_day_high: Option<RawValue>,
    regular_market_day_low: Option<RawValue>,
    regular_market_change: Option<RawValue>,
    regular_market_change_percent: Option<RawValue>,
    regular_market_volume: Option<RawValue>,
    market_cap: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryDetailModule {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawValue>,
    dividend_yield: Option<RawValue>,
    fifty_two_week_high: Option<RawValue>,
    fifty_two_week_low: Option<RawValue>,
    market_cap: Option<RawValue>,
    beta: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KeyStatisticsModule {
    price_to_book: Option<RawValue>,
    trailing_eps: Option<RawValue>,
    forward_eps: Option<RawValue>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawValue>,
    book_value: Option<RawValue>,
    shares_outstanding: Option<RawValue>,
    float_shares: Option<RawValue>,
    net_income_to_common: Option<RawValue>,
    most_recent_quarter: Option<RawValue>,
    beta: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FinancialDataModule {
    total_revenue: Option<RawValue>,
    operating_margins: Option<RawValue>,
    profit_margins: Option<RawValue>,
    return_on_equity: Option<RawValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{NoopHttpClient, ScriptedHttpClient};

    const SUMMARY: &str = r#"{"quoteSummary":{"result":[{
        "price":{"symbol":"005930.KS","longName":"Samsung Electronics Co., Ltd.","exchange":"KSC","exchangeName":"KSE",
            "regularMarketPrice":{"raw":71500.0,"fmt":"71,500.00"},"regularMarketPreviousClose":{"raw":70800.0},
            "regularMarketChangePercent":{"raw":0.00988},"regularMarketVolume":{"raw":12345678},"marketCap":{"raw":4.27e14}},
        "summaryDetail":{"trailingPE":{"raw":14.2},"dividendYield":{"raw":0.0202},"fiftyTwoWeekHigh":{"raw":88800.0},"beta":{}},
        "defaultKeyStatistics":{"priceToBook":{"raw":1.21},"mostRecentQuarter":{"raw":1727654400,"fmt":"2024-09-30"}},
        "financialData":{"totalRevenue":{"raw":3.0e14},"operatingMargins":{"raw":0.1}}
    }],"error":null}}"#;

    #[test]
    fn home_market_codes_get_a_suffix() {
        let bare = Symbol::parse("005930").expect("valid symbol");
        let kosdaq = Symbol::parse("035720.KQ").expect("valid symbol");
        let foreign = Symbol::parse("AAPL").expect("valid symbol");

        assert_eq!(YahooSource::ticker(&bare), "005930.KS");
        assert_eq!(YahooSource::ticker(&kosdaq), "035720.KQ");
        assert_eq!(YahooSource::ticker(&foreign), "AAPL");
    }

    #[tokio::test]
    async fn normalizes_summary_modules() {
        let client = Arc::new(
            ScriptedHttpClient::new()
                .route("getcrumb", 200, "abcCrumb")
                .route("quoteSummary/005930.KS", 200, SUMMARY),
        );
        let source = YahooSource::new(Arc::clone(&client) as Arc<dyn HttpClient>);
        let symbol = Symbol::parse("005930").expect("valid symbol");

        let quote = source.fetch(&symbol).await.expect("summary parses");

        assert_eq!(quote.price_data.current_price, Some(71_500.0));
        assert!((quote.price_data.change_percent.expect("percent") - 0.988).abs() < 1e-9);
        assert!((quote.valuation_data.dividend_yield.expect("yield") - 2.02).abs() < 1e-9);
        assert_eq!(quote.market_data.beta, None);
        assert_eq!(quote.financial_data.operating_income, Some(3.0e13));
        assert_eq!(quote.financial_data.fiscal_period.as_deref(), Some("2024-09-30"));
        assert_eq!(quote.basic_info.name.as_deref(), Some("Samsung Electronics Co., Ltd."));
        assert!(client
            .requests()
            .iter()
            .any(|request| request.url.contains("crumb=abcCrumb")));
    }

    const CHART: &str = r#"{"chart":{"result":[{
        "meta":{"symbol":"005930.KS","gmtoffset":32400},
        "timestamp":[1730851200,1730937600,1731024000],
        "indicators":{"quote":[{
            "open":[70100.0,null,71000.0],"high":[70900.0,null,71900.0],
            "low":[69800.0,null,70700.0],"close":[70600.0,null,71500.0],
            "volume":[9876543,null,12345678]}]}}],"error":null}}"#;

    #[tokio::test]
    async fn chart_history_skips_sessions_without_close() {
        let client = Arc::new(
            ScriptedHttpClient::new().route("v8/finance/chart/005930.KS", 200, CHART),
        );
        let source = YahooSource::new(client);
        let symbol = Symbol::parse("005930").expect("valid symbol");

        let bars = source.history(&symbol, 120).await.expect("chart parses");

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, "2024-11-06");
        assert_eq!(bars[1].date, "2024-11-08");
        assert_eq!(bars[1].close, 71_500.0);
        assert_eq!(bars[1].volume, 12_345_678);
        assert_eq!(bars[1].low, 70_700.0);
    }

    #[tokio::test]
    async fn chart_history_keeps_the_latest_sessions() {
        let client = Arc::new(
            ScriptedHttpClient::new().route("v8/finance/chart/005930.KS", 200, CHART),
        );
        let source = YahooSource::new(client);
        let symbol = Symbol::parse("005930.KS").expect("valid symbol");

        let bars = source.history(&symbol, 1).await.expect("chart parses");

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 71_500.0);
    }

    #[tokio::test]
    async fn summary_error_is_not_found() {
        let client = Arc::new(
            ScriptedHttpClient::new()
                .route("getcrumb", 200, "abcCrumb")
                .route(
                    "quoteSummary",
                    200,
                    r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found for symbol: ZZZZ"}}}"#,
                ),
        );
        let source = YahooSource::new(client);
        let symbol = Symbol::parse("ZZZZ").expect("valid symbol");

        let error = source.fetch(&symbol).await.expect_err("unknown symbol");

        assert_eq!(error.kind(), SourceErrorKind::NotFound);
        assert!(error.message().contains("Quote not found"));
    }

    #[tokio::test]
    async fn offline_transport_yields_parse_error() {
        let source = YahooSource::new(Arc::new(NoopHttpClient));
        let symbol = Symbol::parse("MSFT").expect("valid symbol");

        let error = source.fetch(&symbol).await.expect_err("empty body offline");

        assert_eq!(error.kind(), SourceErrorKind::Parse);
    }
}
