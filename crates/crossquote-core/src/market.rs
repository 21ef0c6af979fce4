//! Market classification for instrument identifiers.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

const HOME_CODE_LEN: usize = 6;

/// Region used to pick provider chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Home market: KRX-listed six-digit codes.
    #[serde(rename = "kr")]
    Korea,
    /// Foreign/default market.
    Us,
}

impl Market {
    pub const ALL: [Self; 2] = [Self::Korea, Self::Us];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Korea => "kr",
            Self::Us => "us",
        }
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kr" | "korea" => Ok(Self::Korea),
            "us" => Ok(Self::Us),
            other => Err(ValidationError::InvalidMarket {
                value: other.to_owned(),
            }),
        }
    }
}

/// Classifies an identifier by stripping a home-market suffix and testing the
/// remainder for the six-digit code pattern. Total: never fails.
pub fn classify(symbol: &Symbol) -> Market {
    let code = symbol.base_code();
    if code.len() == HOME_CODE_LEN && code.bytes().all(|byte| byte.is_ascii_digit()) {
        Market::Korea
    } else {
        Market::Us
    }
}
