use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::snapshot::{parse_figure, text, SnapshotFuture, SnapshotSource, Upstream};
use crate::collector::SourceError;
use crate::http_client::{HttpClient, HttpRequest};
use crate::market::{classify, Market};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::ThrottlingQueue;
use crate::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, ProviderId, Symbol,
    SupplyDemandData, ValuationData,
};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage `GLOBAL_QUOTE` + `OVERVIEW`. Keyed; free tier allows five
/// calls a minute, enforced client-side before each request.
pub struct AlphaVantageSource {
    upstream: Upstream,
    api_key: String,
    throttling: ThrottlingQueue,
}

impl AlphaVantageSource {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_policy(http_client, api_key, &ProviderPolicy::alphavantage_default())
    }

    pub fn with_policy(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        policy: &ProviderPolicy,
    ) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Alphavantage, http_client),
            api_key: api_key.into(),
            throttling: ThrottlingQueue::from_policy(policy),
        }
    }

    async fn query(
        &self,
        function: &str,
        ticker: &str,
    ) -> Result<HashMap<String, String>, SourceError> {
        if let Err(wait) = self.throttling.acquire_with_backoff().await {
            return Err(SourceError::rate_limited(format!(
                "alphavantage free-tier limit exceeded; retry in {:.2}s",
                wait.as_secs_f64()
            )));
        }

        let endpoint = format!(
            "{BASE_URL}?function={function}&symbol={}&apikey={}",
            urlencoding::encode(ticker),
            urlencoding::encode(&self.api_key)
        );
        let body: Response = self
            .upstream
            .fetch_json(HttpRequest::get(endpoint).with_timeout_ms(5_000))
            .await?;

        // Quota and key problems come back as 200 with an explanatory field.
        if let Some(note) = body.note.or(body.information) {
            return Err(SourceError::rate_limited(format!("alphavantage: {note}")));
        }
        if let Some(message) = body.error_message {
            return Err(SourceError::invalid_request(format!("alphavantage: {message}")));
        }
        Ok(body.global_quote.unwrap_or(body.fields))
    }
}

impl SnapshotSource for AlphaVantageSource {
    fn provider(&self) -> ProviderId {
        ProviderId::Alphavantage
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> SnapshotFuture<'a> {
        Box::pin(async move {
            if classify(symbol) != Market::Us {
                return Err(SourceError::invalid_request(format!(
                    "alphavantage is only wired for us listings, got {symbol}"
                )));
            }

            let quote = self.query("GLOBAL_QUOTE", symbol.as_str()).await?;
            if quote.is_empty() {
                return Err(SourceError::not_found(format!(
                    "alphavantage has no quote for {symbol}"
                )));
            }
            // Overview is best effort; the quote alone is a usable record.
            let overview = match self.query("OVERVIEW", symbol.as_str()).await {
                Ok(overview) => overview,
                Err(error) => {
                    debug!(%symbol, %error, "alphavantage overview unavailable");
                    HashMap::new()
                }
            };
            Ok(normalize(symbol, &quote, &overview))
        })
    }
}

fn normalize(
    symbol: &Symbol,
    quote: &HashMap<String, String>,
    overview: &HashMap<String, String>,
) -> ComprehensiveQuote {
    let q = |key: &str| quote.get(key).and_then(|value| parse_figure(value));
    let o = |key: &str| overview.get(key).and_then(|value| parse_figure(value));
    // Overview ratios are fractions.
    let pct = |key: &str| o(key).map(|fraction| fraction * 100.0);
    let label = |key: &str| text(overview.get(key).map(String::as_str));

    let revenue = o("RevenueTTM");
    let operating_margin = pct("OperatingMarginTTM");
    let net_margin = pct("ProfitMargin");
    let price = q("05. price");
    let volume = q("06. volume");

    ComprehensiveQuote {
        basic_info: BasicInfo {
            symbol: text(quote.get("01. symbol").map(String::as_str))
                .or_else(|| Some(symbol.as_str().to_owned())),
            name: label("Name"),
            market: label("Exchange"),
            exchange: label("Exchange"),
        },
        price_data: PriceData {
            current_price: price,
            previous_close: q("08. previous close"),
            open: q("02. open"),
            high: q("03. high"),
            low: q("04. low"),
            change: q("09. change"),
            change_percent: q("10. change percent"),
            volume,
            trading_value: price.zip(volume).map(|(price, volume)| price * volume),
            high_52_week: o("52WeekHigh"),
            low_52_week: o("52WeekLow"),
        },
        valuation_data: ValuationData {
            per: o("PERatio"),
            pbr: o("PriceToBookRatio"),
            eps: o("EPS"),
            bps: o("BookValue"),
            roe: pct("ReturnOnEquityTTM"),
            dividend_yield: pct("DividendYield"),
            forward_per: o("ForwardPE"),
            forward_eps: None,
        },
        financial_data: FinancialData {
            revenue,
            operating_income: revenue
                .zip(operating_margin)
                .map(|(revenue, margin)| revenue * margin / 100.0),
            net_income: revenue
                .zip(net_margin)
                .map(|(revenue, margin)| revenue * margin / 100.0),
            operating_margin,
            net_margin,
            fiscal_period: label("LatestQuarter"),
        },
        supply_demand_data: SupplyDemandData::default(),
        market_data: MarketData {
            market_cap: o("MarketCapitalization"),
            shares_outstanding: o("SharesOutstanding"),
            float_shares: o("SharesFloat"),
            beta: o("Beta"),
        },
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(rename = "Global Quote", default)]
    global_quote: Option<HashMap<String, String>>,
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Information", default)]
    information: Option<String>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
    #[serde(flatten)]
    fields: HashMap<String, String>,
}
