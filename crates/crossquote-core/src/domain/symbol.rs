use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 20;

/// Exchange suffixes recognised on home-market codes (KOSPI, KOSDAQ).
pub const HOME_MARKET_SUFFIXES: [&str; 2] = [".KS", ".KQ"];

/// Normalized instrument identifier.
///
/// Accepts both foreign tickers (`AAPL`, `BRK-B`) and home-market codes with or
/// without an exchange suffix (`005930`, `035720.KQ`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and normalize an identifier to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '.' || ch == '-';
            if !valid {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier with a recognised home-market suffix removed.
    pub fn base_code(&self) -> &str {
        match self.suffix() {
            Some(suffix) => &self.0[..self.0.len() - suffix.len()],
            None => &self.0,
        }
    }

    /// Recognised home-market suffix, if present.
    pub fn suffix(&self) -> Option<&'static str> {
        HOME_MARKET_SUFFIXES
            .into_iter()
            .find(|suffix| self.0.len() > suffix.len() && self.0.ends_with(suffix))
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}
