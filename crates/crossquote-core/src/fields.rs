//! Qualified field names reported in reconciliation results.
//!
//! Downstream consumers key off these strings; they must not change.

pub mod basic_info {
    pub const SYMBOL: &str = "basicInfo.symbol";
    pub const NAME: &str = "basicInfo.name";
    pub const MARKET: &str = "basicInfo.market";
    pub const EXCHANGE: &str = "basicInfo.exchange";

    pub const ALL: [&str; 4] = [SYMBOL, NAME, MARKET, EXCHANGE];
}

pub mod price_data {
    pub const CURRENT_PRICE: &str = "priceData.currentPrice";
    pub const PREVIOUS_CLOSE: &str = "priceData.previousClose";
    pub const OPEN: &str = "priceData.open";
    pub const HIGH: &str = "priceData.high";
    pub const LOW: &str = "priceData.low";
    pub const CHANGE: &str = "priceData.change";
    pub const CHANGE_PERCENT: &str = "priceData.changePercent";
    pub const VOLUME: &str = "priceData.volume";
    pub const TRADING_VALUE: &str = "priceData.tradingValue";
    pub const HIGH_52_WEEK: &str = "priceData.high52Week";
    pub const LOW_52_WEEK: &str = "priceData.low52Week";

    pub const ALL: [&str; 11] = [
        CURRENT_PRICE,
        PREVIOUS_CLOSE,
        OPEN,
        HIGH,
        LOW,
        CHANGE,
        CHANGE_PERCENT,
        VOLUME,
        TRADING_VALUE,
        HIGH_52_WEEK,
        LOW_52_WEEK,
    ];
}

pub mod valuation_data {
    pub const PER: &str = "valuationData.per";
    pub const PBR: &str = "valuationData.pbr";
    pub const EPS: &str = "valuationData.eps";
    pub const BPS: &str = "valuationData.bps";
    pub const ROE: &str = "valuationData.roe";
    pub const DIVIDEND_YIELD: &str = "valuationData.dividendYield";
    pub const FORWARD_PER: &str = "valuationData.forwardPer";
    pub const FORWARD_EPS: &str = "valuationData.forwardEps";

    pub const ALL: [&str; 8] = [
        PER,
        PBR,
        EPS,
        BPS,
        ROE,
        DIVIDEND_YIELD,
        FORWARD_PER,
        FORWARD_EPS,
    ];
}

pub mod financial_data {
    pub const REVENUE: &str = "financialData.revenue";
    pub const OPERATING_INCOME: &str = "financialData.operatingIncome";
    pub const NET_INCOME: &str = "financialData.netIncome";
    pub const OPERATING_MARGIN: &str = "financialData.operatingMargin";
    pub const NET_MARGIN: &str = "financialData.netMargin";
    pub const FISCAL_PERIOD: &str = "financialData.fiscalPeriod";

    pub const ALL: [&str; 6] = [
        REVENUE,
        OPERATING_INCOME,
        NET_INCOME,
        OPERATING_MARGIN,
        NET_MARGIN,
        FISCAL_PERIOD,
    ];
}

pub mod supply_demand_data {
    pub const FOREIGN_OWNERSHIP: &str = "supplyDemandData.foreignOwnership";
    pub const FOREIGN_NET_BUY: &str = "supplyDemandData.foreignNetBuy";
    pub const INSTITUTIONAL_NET_BUY: &str = "supplyDemandData.institutionalNetBuy";
    pub const INDIVIDUAL_NET_BUY: &str = "supplyDemandData.individualNetBuy";

    pub const ALL: [&str; 4] = [
        FOREIGN_OWNERSHIP,
        FOREIGN_NET_BUY,
        INSTITUTIONAL_NET_BUY,
        INDIVIDUAL_NET_BUY,
    ];
}

pub mod market_data {
    pub const MARKET_CAP: &str = "marketData.marketCap";
    pub const SHARES_OUTSTANDING: &str = "marketData.sharesOutstanding";
    pub const FLOAT_SHARES: &str = "marketData.floatShares";
    pub const BETA: &str = "marketData.beta";

    pub const ALL: [&str; 4] = [MARKET_CAP, SHARES_OUTSTANDING, FLOAT_SHARES, BETA];
}

/// Number of reconciled fields across all sub-records.
pub const FIELD_COUNT: usize = basic_info::ALL.len()
    + price_data::ALL.len()
    + valuation_data::ALL.len()
    + financial_data::ALL.len()
    + supply_demand_data::ALL.len()
    + market_data::ALL.len();

/// Every qualified field name, in reconciliation order.
pub fn all() -> impl Iterator<Item = &'static str> {
    basic_info::ALL
        .into_iter()
        .chain(price_data::ALL)
        .chain(valuation_data::ALL)
        .chain(financial_data::ALL)
        .chain(supply_demand_data::ALL)
        .chain(market_data::ALL)
}
