//! # Domain Models
//!
//! Canonical domain types for crossquote reconciliation.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Normalized instrument identifier |
//! | [`ComprehensiveQuote`] | Six sub-records returned by one provider |
//! | [`BasicInfo`], [`PriceData`], [`ValuationData`] | Identity, price and valuation figures |
//! | [`FinancialData`], [`SupplyDemandData`], [`MarketData`] | Statements, flows, capital structure |
//! | [`UtcDateTime`] | UTC timestamp |

mod record;
mod symbol;
mod timestamp;

pub use record::{
    BasicInfo, ComprehensiveQuote, FinancialData, MarketData, PriceData, SupplyDemandData,
    ValuationData,
};
pub use symbol::{Symbol, HOME_MARKET_SUFFIXES};
pub use timestamp::UtcDateTime;
