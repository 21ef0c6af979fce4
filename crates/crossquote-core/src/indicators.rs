//! Technical indicators over a daily price history.
//!
//! | Indicator | Rule |
//! |-----------|------|
//! | RSI(14) | Wilder smoothing, seeded with the simple mean of the first 14 moves |
//! | MA5 / MA20 / MA60 / MA120 | Trailing means; a window longer than the history uses the next shorter one |
//! | Disparity | `price / MA20 * 100`, 100 when MA20 is not positive |
//!
//! Every published figure is rounded to two decimals.

use serde::{Deserialize, Serialize};

use crate::market::Market;
use crate::scoring::round_cents;
use crate::{ProviderId, Symbol, UtcDateTime};

pub const RSI_PERIOD: usize = 14;
/// RSI reported when there are not enough moves to seed the averages.
pub const NEUTRAL_RSI: f64 = 50.0;
/// Sessions requested from providers; enough for MA120.
pub const HISTORY_SESSIONS: usize = 120;

/// One daily OHLCV bar. `date` is `YYYY-MM-DD` in exchange local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub ma5: f64,
    pub ma20: f64,
    pub ma60: f64,
    pub ma120: f64,
}

/// Latest price, indicators and the bars they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSnapshot {
    pub symbol: Symbol,
    pub market: Market,
    pub provider: ProviderId,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub rsi: f64,
    pub moving_averages: MovingAverages,
    pub disparity: f64,
    /// Oldest first.
    pub historical_data: Vec<PriceBar>,
    pub collected_at: UtcDateTime,
}

impl TechnicalSnapshot {
    /// Builds the snapshot from bars ordered oldest first. `None` when no bar
    /// carries a usable close.
    pub fn from_history(
        symbol: Symbol,
        market: Market,
        provider: ProviderId,
        bars: Vec<PriceBar>,
    ) -> Option<Self> {
        let bars: Vec<PriceBar> = bars
            .into_iter()
            .filter(|bar| bar.close.is_finite())
            .collect();
        let latest = bars.last()?;
        let previous = bars.len().checked_sub(2).map_or(latest, |index| &bars[index]);

        let price = latest.close;
        let change = price - previous.close;
        let change_percent = if previous.close > 0.0 {
            change / previous.close * 100.0
        } else {
            0.0
        };

        let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
        let moving_averages = moving_averages(&closes);

        Some(Self {
            symbol,
            market,
            provider,
            price: round_cents(price),
            change: round_cents(change),
            change_percent: round_cents(change_percent),
            volume: latest.volume,
            rsi: rsi(&closes, RSI_PERIOD),
            disparity: disparity(price, moving_averages.ma20),
            moving_averages,
            historical_data: bars,
            collected_at: UtcDateTime::now(),
        })
    }
}

/// Relative strength index over `closes` (oldest first).
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return NEUTRAL_RSI;
    }

    let moves: Vec<f64> = closes.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let (seed, rest) = moves.split_at(period);
    let weight = period as f64;

    let mut avg_gain = seed.iter().map(|delta| delta.max(0.0)).sum::<f64>() / weight;
    let mut avg_loss = seed.iter().map(|delta| (-delta).max(0.0)).sum::<f64>() / weight;
    for delta in rest {
        avg_gain = (avg_gain * (weight - 1.0) + delta.max(0.0)) / weight;
        avg_loss = (avg_loss * (weight - 1.0) + (-delta).max(0.0)) / weight;
    }

    if avg_loss == 0.0 {
        return 100.0;
    }
    let value = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
    if value.is_finite() {
        round_cents(value)
    } else {
        NEUTRAL_RSI
    }
}

/// MA5 through MA120. Under five closes every average is the latest close
/// (zero for an empty history).
pub fn moving_averages(closes: &[f64]) -> MovingAverages {
    if closes.len() < 5 {
        let latest = closes.last().copied().unwrap_or(0.0);
        return MovingAverages {
            ma5: latest,
            ma20: latest,
            ma60: latest,
            ma120: latest,
        };
    }

    let ma5 = trailing_mean(closes, 5).unwrap_or_default();
    let ma20 = trailing_mean(closes, 20).unwrap_or(ma5);
    let ma60 = trailing_mean(closes, 60).unwrap_or(ma20);
    let ma120 = trailing_mean(closes, 120).unwrap_or(ma60);

    MovingAverages {
        ma5: round_cents(ma5),
        ma20: round_cents(ma20),
        ma60: round_cents(ma60),
        ma120: round_cents(ma120),
    }
}

pub fn disparity(price: f64, ma20: f64) -> f64 {
    if ma20 > 0.0 {
        round_cents(price / ma20 * 100.0)
    } else {
        100.0
    }
}

fn trailing_mean(closes: &[f64], window: usize) -> Option<f64> {
    let tail = closes.get(closes.len().checked_sub(window)?..)?;
    Some(tail.iter().sum::<f64>() / window as f64)
}
