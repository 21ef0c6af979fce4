//! Comprehensive quote record and its independently reconciled sub-records.
//!
//! Every scalar is optional so a missing field never blocks reconciliation of
//! the others. Serialized names are camelCase and match the qualified names in
//! [`crate::fields`].

use serde::{Deserialize, Serialize};

/// Identity of the instrument as reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicInfo {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub market: Option<String>,
    pub exchange: Option<String>,
}

/// Session and 52-week price figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceData {
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub trading_value: Option<f64>,
    pub high_52_week: Option<f64>,
    pub low_52_week: Option<f64>,
}

/// Per-share valuation ratios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValuationData {
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub eps: Option<f64>,
    pub bps: Option<f64>,
    pub roe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub forward_per: Option<f64>,
    pub forward_eps: Option<f64>,
}

/// Income-statement figures for one fiscal period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancialData {
    pub revenue: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub fiscal_period: Option<String>,
}

/// Ownership and investor-flow figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupplyDemandData {
    pub foreign_ownership: Option<f64>,
    pub foreign_net_buy: Option<f64>,
    pub institutional_net_buy: Option<f64>,
    pub individual_net_buy: Option<f64>,
}

/// Capital-structure figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketData {
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub float_shares: Option<f64>,
    pub beta: Option<f64>,
}

/// Full record returned by one provider, and the merged result of two.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComprehensiveQuote {
    pub basic_info: BasicInfo,
    pub price_data: PriceData,
    pub valuation_data: ValuationData,
    pub financial_data: FinancialData,
    pub supply_demand_data: SupplyDemandData,
    pub market_data: MarketData,
}

impl ComprehensiveQuote {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
