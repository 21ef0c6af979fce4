//! Field-by-field merge of a primary and a secondary record.
//!
//! Every field is reconciled on its own: agreement within the category
//! tolerance averages the two values, disagreement keeps the primary value,
//! a value reported by one side only is taken as-is. The qualified name of
//! each reported field lands in exactly one of the matched, conflicting or
//! supplemented lists; fields absent on both sides are not listed.

use serde::{Deserialize, Serialize};

use crate::config::ToleranceBands;
use crate::fields;
use crate::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, SupplyDemandData,
    ValuationData,
};

/// Agreement class of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTag {
    Matched,
    Conflicting,
    Supplemented,
    Empty,
}

/// Merged record plus the qualified field names partitioned by tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub merged: ComprehensiveQuote,
    pub matched_fields: Vec<&'static str>,
    pub conflicting_fields: Vec<&'static str>,
    pub supplemented_fields: Vec<&'static str>,
}

impl Reconciliation {
    pub fn matched(&self) -> usize {
        self.matched_fields.len()
    }

    pub fn conflicting(&self) -> usize {
        self.conflicting_fields.len()
    }

    pub fn supplemented(&self) -> usize {
        self.supplemented_fields.len()
    }

    /// Tag recorded for `field`; [`FieldTag::Empty`] when it is in no list.
    pub fn tag_of(&self, field: &str) -> FieldTag {
        if self.matched_fields.contains(&field) {
            FieldTag::Matched
        } else if self.conflicting_fields.contains(&field) {
            FieldTag::Conflicting
        } else if self.supplemented_fields.contains(&field) {
            FieldTag::Supplemented
        } else {
            FieldTag::Empty
        }
    }

    fn record(&mut self, field: &'static str, tag: FieldTag) {
        match tag {
            FieldTag::Matched => self.matched_fields.push(field),
            FieldTag::Conflicting => self.conflicting_fields.push(field),
            FieldTag::Supplemented => self.supplemented_fields.push(field),
            FieldTag::Empty => {}
        }
    }

    fn number(
        &mut self,
        field: &'static str,
        primary: Option<f64>,
        secondary: Option<f64>,
        tolerance: f64,
    ) -> Option<f64> {
        let (value, tag) = reconcile_number(primary, secondary, tolerance);
        self.record(field, tag);
        value
    }

    fn text(
        &mut self,
        field: &'static str,
        primary: Option<&String>,
        secondary: Option<&String>,
    ) -> Option<String> {
        let (value, tag) = reconcile_text(
            primary.map(String::as_str),
            secondary.map(String::as_str),
        );
        self.record(field, tag);
        value
    }
}

/// `|a − b| / max(|a|, |b|)`; zero when both are zero.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        return 0.0;
    }
    (a - b).abs() / scale
}

/// Merges one numeric field. Non-finite inputs count as absent.
pub fn reconcile_number(
    primary: Option<f64>,
    secondary: Option<f64>,
    tolerance: f64,
) -> (Option<f64>, FieldTag) {
    let primary = primary.filter(|value| value.is_finite());
    let secondary = secondary.filter(|value| value.is_finite());

    match (primary, secondary) {
        (None, None) => (None, FieldTag::Empty),
        (Some(value), None) | (None, Some(value)) => (Some(value), FieldTag::Supplemented),
        (Some(a), Some(b)) if relative_difference(a, b) <= tolerance => {
            (Some((a + b) / 2.0), FieldTag::Matched)
        }
        (Some(a), Some(_)) => (Some(a), FieldTag::Conflicting),
    }
}

/// Merges one free-text field: first non-blank value wins and is never a match.
pub fn reconcile_text(
    primary: Option<&str>,
    secondary: Option<&str>,
) -> (Option<String>, FieldTag) {
    fn present(value: Option<&str>) -> Option<&str> {
        value.filter(|value| !value.trim().is_empty())
    }

    match present(primary).or_else(|| present(secondary)) {
        Some(value) => (Some(value.to_owned()), FieldTag::Supplemented),
        None => (None, FieldTag::Empty),
    }
}

/// Reconciles two records. Either side may be missing entirely.
pub fn reconcile(
    primary: Option<&ComprehensiveQuote>,
    secondary: Option<&ComprehensiveQuote>,
    tolerances: &ToleranceBands,
) -> Reconciliation {
    let empty = ComprehensiveQuote::default();
    let a = primary.unwrap_or(&empty);
    let b = secondary.unwrap_or(&empty);

    let mut out = Reconciliation::default();
    let basic_info = merge_basic_info(&mut out, &a.basic_info, &b.basic_info);
    let price_data = merge_price_data(&mut out, &a.price_data, &b.price_data, tolerances);
    let valuation_data =
        merge_valuation_data(&mut out, &a.valuation_data, &b.valuation_data, tolerances);
    let financial_data =
        merge_financial_data(&mut out, &a.financial_data, &b.financial_data, tolerances);
    let supply_demand_data = merge_supply_demand_data(
        &mut out,
        &a.supply_demand_data,
        &b.supply_demand_data,
        tolerances,
    );
    let market_data = merge_market_data(&mut out, &a.market_data, &b.market_data, tolerances);

    out.merged = ComprehensiveQuote {
        basic_info,
        price_data,
        valuation_data,
        financial_data,
        supply_demand_data,
        market_data,
    };
    out
}

fn merge_basic_info(out: &mut Reconciliation, a: &BasicInfo, b: &BasicInfo) -> BasicInfo {
    use fields::basic_info::*;

    BasicInfo {
        symbol: out.text(SYMBOL, a.symbol.as_ref(), b.symbol.as_ref()),
        name: out.text(NAME, a.name.as_ref(), b.name.as_ref()),
        market: out.text(MARKET, a.market.as_ref(), b.market.as_ref()),
        exchange: out.text(EXCHANGE, a.exchange.as_ref(), b.exchange.as_ref()),
    }
}

fn merge_price_data(
    out: &mut Reconciliation,
    a: &PriceData,
    b: &PriceData,
    t: &ToleranceBands,
) -> PriceData {
    use fields::price_data::*;

    PriceData {
        current_price: out.number(CURRENT_PRICE, a.current_price, b.current_price, t.price),
        previous_close: out.number(PREVIOUS_CLOSE, a.previous_close, b.previous_close, t.price),
        open: out.number(OPEN, a.open, b.open, t.price),
        high: out.number(HIGH, a.high, b.high, t.price),
        low: out.number(LOW, a.low, b.low, t.price),
        change: out.number(CHANGE, a.change, b.change, t.price),
        change_percent: out.number(
            CHANGE_PERCENT,
            a.change_percent,
            b.change_percent,
            t.change_percent,
        ),
        volume: out.number(VOLUME, a.volume, b.volume, t.volume),
        trading_value: out.number(TRADING_VALUE, a.trading_value, b.trading_value, t.volume),
        high_52_week: out.number(HIGH_52_WEEK, a.high_52_week, b.high_52_week, t.price),
        low_52_week: out.number(LOW_52_WEEK, a.low_52_week, b.low_52_week, t.price),
    }
}

fn merge_valuation_data(
    out: &mut Reconciliation,
    a: &ValuationData,
    b: &ValuationData,
    t: &ToleranceBands,
) -> ValuationData {
    use fields::valuation_data::*;

    let band = t.valuation;
    ValuationData {
        per: out.number(PER, a.per, b.per, band),
        pbr: out.number(PBR, a.pbr, b.pbr, band),
        eps: out.number(EPS, a.eps, b.eps, band),
        bps: out.number(BPS, a.bps, b.bps, band),
        roe: out.number(ROE, a.roe, b.roe, band),
        dividend_yield: out.number(DIVIDEND_YIELD, a.dividend_yield, b.dividend_yield, band),
        forward_per: out.number(FORWARD_PER, a.forward_per, b.forward_per, band),
        forward_eps: out.number(FORWARD_EPS, a.forward_eps, b.forward_eps, band),
    }
}

fn merge_financial_data(
    out: &mut Reconciliation,
    a: &FinancialData,
    b: &FinancialData,
    t: &ToleranceBands,
) -> FinancialData {
    use fields::financial_data::*;

    let band = t.financial;
    FinancialData {
        revenue: out.number(REVENUE, a.revenue, b.revenue, band),
        operating_income: out.number(
            OPERATING_INCOME,
            a.operating_income,
            b.operating_income,
            band,
        ),
        net_income: out.number(NET_INCOME, a.net_income, b.net_income, band),
        operating_margin: out.number(
            OPERATING_MARGIN,
            a.operating_margin,
            b.operating_margin,
            band,
        ),
        net_margin: out.number(NET_MARGIN, a.net_margin, b.net_margin, band),
        fiscal_period: out.text(
            FISCAL_PERIOD,
            a.fiscal_period.as_ref(),
            b.fiscal_period.as_ref(),
        ),
    }
}

fn merge_supply_demand_data(
    out: &mut Reconciliation,
    a: &SupplyDemandData,
    b: &SupplyDemandData,
    t: &ToleranceBands,
) -> SupplyDemandData {
    use fields::supply_demand_data::*;

    SupplyDemandData {
        foreign_ownership: out.number(
            FOREIGN_OWNERSHIP,
            a.foreign_ownership,
            b.foreign_ownership,
            t.foreign_ownership,
        ),
        foreign_net_buy: out.number(
            FOREIGN_NET_BUY,
            a.foreign_net_buy,
            b.foreign_net_buy,
            t.net_flow,
        ),
        institutional_net_buy: out.number(
            INSTITUTIONAL_NET_BUY,
            a.institutional_net_buy,
            b.institutional_net_buy,
            t.net_flow,
        ),
        individual_net_buy: out.number(
            INDIVIDUAL_NET_BUY,
            a.individual_net_buy,
            b.individual_net_buy,
            t.net_flow,
        ),
    }
}

fn merge_market_data(
    out: &mut Reconciliation,
    a: &MarketData,
    b: &MarketData,
    t: &ToleranceBands,
) -> MarketData {
    use fields::market_data::*;

    MarketData {
        market_cap: out.number(MARKET_CAP, a.market_cap, b.market_cap, t.capitalization),
        shares_outstanding: out.number(
            SHARES_OUTSTANDING,
            a.shares_outstanding,
            b.shares_outstanding,
            t.capitalization,
        ),
        float_shares: out.number(FLOAT_SHARES, a.float_shares, b.float_shares, t.float_and_beta),
        beta: out.number(BETA, a.beta, b.beta, t.float_and_beta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{basic_info, price_data, supply_demand_data, valuation_data};

    fn quote_with_price(price: f64) -> ComprehensiveQuote {
        let mut quote = ComprehensiveQuote::default();
        quote.price_data.current_price = Some(price);
        quote
    }

    #[test]
    fn relative_difference_handles_zero_operands() {
        assert_eq!(relative_difference(0.0, 0.0), 0.0);
        assert_eq!(relative_difference(0.0, 5.0), 1.0);
        assert!((relative_difference(-2.0, -1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn numbers_follow_tolerance_rules() {
        let (merged, tag) = reconcile_number(Some(100.0), Some(100.3), 0.005);
        assert_eq!(tag, FieldTag::Matched);
        assert!((merged.expect("merged") - 100.15).abs() < 1e-9);

        assert_eq!(
            reconcile_number(Some(100.0), Some(110.0), 0.005),
            (Some(100.0), FieldTag::Conflicting)
        );
        assert_eq!(
            reconcile_number(None, Some(15.2), 0.01),
            (Some(15.2), FieldTag::Supplemented)
        );
        assert_eq!(reconcile_number(None, None, 0.01), (None, FieldTag::Empty));
        assert_eq!(reconcile_number(Some(0.0), Some(0.0), 0.0), (Some(0.0), FieldTag::Matched));
    }

    #[test]
    fn non_finite_values_count_as_absent() {
        assert_eq!(
            reconcile_number(Some(f64::NAN), Some(42.0), 0.01),
            (Some(42.0), FieldTag::Supplemented)
        );
        assert_eq!(
            reconcile_number(Some(f64::INFINITY), Some(f64::NEG_INFINITY), 0.01),
            (None, FieldTag::Empty)
        );
    }

    #[test]
    fn text_prefers_primary_and_never_matches() {
        assert_eq!(
            reconcile_text(Some("Samsung Electronics"), Some("삼성전자")),
            (Some(String::from("Samsung Electronics")), FieldTag::Supplemented)
        );
        assert_eq!(
            reconcile_text(Some("  "), Some("KOSPI")),
            (Some(String::from("KOSPI")), FieldTag::Supplemented)
        );
        assert_eq!(reconcile_text(None, Some("")), (None, FieldTag::Empty));
    }

    #[test]
    fn records_partition_reported_fields() {
        let mut primary = quote_with_price(71_500.0);
        primary.price_data.volume = Some(1_000_000.0);
        primary.basic_info.name = Some(String::from("Samsung Electronics"));
        primary.supply_demand_data.foreign_net_buy = Some(-100.0);
        let mut secondary = quote_with_price(71_600.0);
        secondary.price_data.volume = Some(2_000_000.0);
        secondary.valuation_data.per = Some(14.2);
        secondary.supply_demand_data.foreign_net_buy = Some(-105.0);

        let result = reconcile(Some(&primary), Some(&secondary), &ToleranceBands::default());

        assert_eq!(
            result.matched_fields,
            vec![price_data::CURRENT_PRICE, supply_demand_data::FOREIGN_NET_BUY]
        );
        assert_eq!(result.conflicting_fields, vec![price_data::VOLUME]);
        assert_eq!(
            result.supplemented_fields,
            vec![basic_info::NAME, valuation_data::PER]
        );
        assert_eq!(result.merged.price_data.volume, Some(1_000_000.0));
        assert_eq!(result.merged.valuation_data.per, Some(14.2));
        assert_eq!(result.tag_of(price_data::OPEN), FieldTag::Empty);
        assert_eq!(result.tag_of(price_data::VOLUME), FieldTag::Conflicting);
    }

    #[test]
    fn missing_side_supplements_everything_reported() {
        let primary = quote_with_price(189.5);

        let result = reconcile(Some(&primary), None, &ToleranceBands::default());

        assert_eq!(result.matched(), 0);
        assert_eq!(result.conflicting(), 0);
        assert_eq!(result.supplemented_fields, vec![price_data::CURRENT_PRICE]);
        assert_eq!(result.merged, primary);
    }

    #[test]
    fn both_missing_is_empty() {
        let result = reconcile(None, None, &ToleranceBands::default());

        assert_eq!(result, Reconciliation::default());
    }
}
