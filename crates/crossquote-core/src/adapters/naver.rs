use std::sync::Arc;

use serde::Deserialize;

use super::snapshot::{parse_figure, text, SnapshotFuture, SnapshotSource, Upstream};
use crate::collector::SourceError;
use crate::http_client::{HttpClient, HttpRequest};
use crate::market::{classify, Market};
use crate::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, ProviderId, Symbol,
    SupplyDemandData, ValuationData,
};

const BASE_URL: &str = "https://m.stock.naver.com/api/stock";

/// Naver Finance mobile pages. Home market only.
///
/// Three documents are read per identifier: the price header, the summary
/// table (`integration`) and the daily investor trend.
pub struct NaverSource {
    upstream: Upstream,
}

impl NaverSource {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            upstream: Upstream::new(ProviderId::Naver, http_client),
        }
    }

    fn request(code: &str, page: &str) -> HttpRequest {
        HttpRequest::get(format!("{BASE_URL}/{code}/{page}"))
            .with_header("referer", "https://m.stock.naver.com/")
    }

    async fn pages(&self, code: &str) -> Result<Pages, SourceError> {
        let (basic, integration, trend) = tokio::join!(
            self.upstream.fetch_json::<BasicPage>(Self::request(code, "basic")),
            self.upstream
                .fetch_json::<IntegrationPage>(Self::request(code, "integration")),
            self.upstream
                .fetch_json::<Vec<TrendRow>>(Self::request(code, "trend?pageSize=1")),
        );

        // The header is mandatory; the other pages only enrich it.
        Ok(Pages {
            basic: basic?,
            integration: integration.unwrap_or_default(),
            trend: trend.ok().and_then(|rows| rows.into_iter().next()),
        })
    }
}

impl SnapshotSource for NaverSource {
    fn provider(&self) -> ProviderId {
        ProviderId::Naver
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> SnapshotFuture<'a> {
        Box::pin(async move {
            if classify(symbol) != Market::Korea {
                return Err(SourceError::invalid_request(format!(
                    "naver only lists home-market codes, got {symbol}"
                )));
            }
            let pages = self.pages(symbol.base_code()).await?;
            if pages.basic.close_price.is_none() {
                return Err(SourceError::not_found(format!("naver has no quote for {symbol}")));
            }
            Ok(normalize(symbol, pages))
        })
    }
}

struct Pages {
    basic: BasicPage,
    integration: IntegrationPage,
    trend: Option<TrendRow>,
}

fn normalize(symbol: &Symbol, pages: Pages) -> ComprehensiveQuote {
    let Pages {
        basic,
        integration,
        trend,
    } = pages;
    let info = |code: &str| {
        integration
            .total_infos
            .iter()
            .find(|item| item.code == code)
            .and_then(|item| item.value.as_deref())
    };
    let figure = |code: &str| info(code).and_then(parse_unit_figure);
    let amount = |code: &str| info(code).and_then(parse_korean_amount);

    let current_price = basic.close_price.as_deref().and_then(parse_figure);
    let change = basic
        .compare_to_previous_close_price
        .as_deref()
        .and_then(parse_figure)
        .map(|magnitude| signed(magnitude, basic.compare_to_previous_price.as_ref()));
    let change_percent = basic.fluctuations_ratio.as_deref().and_then(parse_figure);
    let previous_close = figure("lastClosePrice").or_else(|| match (current_price, change) {
        (Some(price), Some(change)) => Some(price - change),
        _ => None,
    });
    let trend = trend.unwrap_or_default();

    ComprehensiveQuote {
        basic_info: BasicInfo {
            symbol: Some(symbol.base_code().to_owned()),
            name: text(basic.stock_name.as_deref()),
            market: basic
                .stock_exchange_type
                .as_ref()
                .and_then(|exchange| text(exchange.name.as_deref())),
            exchange: Some(String::from("KRX")),
        },
        price_data: PriceData {
            current_price,
            previous_close,
            open: figure("openPrice"),
            high: figure("highPrice"),
            low: figure("lowPrice"),
            change,
            change_percent,
            volume: figure("accumulatedTradingVolume"),
            trading_value: amount("accumulatedTradingValue"),
            high_52_week: figure("highPriceOf52Weeks"),
            low_52_week: figure("lowPriceOf52Weeks"),
        },
        valuation_data: ValuationData {
            per: figure("per"),
            pbr: figure("pbr"),
            eps: figure("eps"),
            bps: figure("bps"),
            roe: None,
            dividend_yield: figure("dividendYieldRatio"),
            forward_per: figure("cnsPer"),
            forward_eps: figure("cnsEps"),
        },
        financial_data: FinancialData::default(),
        supply_demand_data: SupplyDemandData {
            foreign_ownership: figure("foreignRate")
                .or_else(|| trend.foreigner_hold_ratio.as_deref().and_then(parse_figure)),
            foreign_net_buy: trend.foreigner_pure_buy_quant.as_deref().and_then(parse_figure),
            institutional_net_buy: trend.organ_pure_buy_quant.as_deref().and_then(parse_figure),
            individual_net_buy: trend
                .individual_pure_buy_quant
                .as_deref()
                .and_then(parse_figure),
        },
        market_data: MarketData {
            market_cap: amount("marketValue"),
            ..MarketData::default()
        },
    }
}

/// Price deltas are unsigned on the page; direction lives in a separate code.
fn signed(magnitude: f64, direction: Option<&Direction>) -> f64 {
    let falling = direction
        .and_then(|direction| direction.name.as_deref())
        .is_some_and(|name| matches!(name, "FALLING" | "LOWER_LIMIT"));
    if falling {
        -magnitude.abs()
    } else {
        magnitude
    }
}

/// Strips the won, times and shares markers Naver appends to plain figures.
fn parse_unit_figure(raw: &str) -> Option<f64> {
    parse_figure(raw.trim().trim_end_matches(['원', '배', '주']))
}

/// Parses figures such as `427조 1,234억`, `1,234백만`, `14.20배` or `5,041원`
/// into a plain number of won (or a bare ratio).
pub(crate) fn parse_korean_amount(raw: &str) -> Option<f64> {
    const UNITS: [(&str, f64); 3] = [("조", 1e12), ("억", 1e8), ("백만", 1e6)];

    let raw = raw.trim();
    if !UNITS.iter().any(|(unit, _)| raw.contains(unit)) {
        return parse_unit_figure(raw);
    }

    let mut total = 0.0;
    let mut rest = raw;
    for (unit, scale) in UNITS {
        if let Some((head, tail)) = rest.split_once(unit) {
            total += parse_figure(head)? * scale;
            rest = tail;
        }
    }
    let leftover = rest.trim().trim_end_matches('원');
    if !leftover.is_empty() {
        total += parse_figure(leftover)?;
    }
    Some(total).filter(|value| value.is_finite())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BasicPage {
    stock_name: Option<String>,
    close_price: Option<String>,
    compare_to_previous_close_price: Option<String>,
    compare_to_previous_price: Option<Direction>,
    fluctuations_ratio: Option<String>,
    stock_exchange_type: Option<ExchangeType>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Direction {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExchangeType {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IntegrationPage {
    total_infos: Vec<InfoItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InfoItem {
    code: String,
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TrendRow {
    foreigner_pure_buy_quant: Option<String>,
    organ_pure_buy_quant: Option<String>,
    individual_pure_buy_quant: Option<String>,
    foreigner_hold_ratio: Option<String>,
}
