use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// How a provider obtains its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Api,
    Crawling,
    VisionAssisted,
}

impl Provenance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Crawling => "crawling",
            Self::VisionAssisted => "vision_assisted",
        }
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical provider identifiers used in selection, outcomes and envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Korea Investment & Securities official brokerage API.
    Kis,
    Alphavantage,
    Yahoo,
    Naver,
    Stooq,
    /// Browser screenshot read back by a vision model.
    Vision,
}

impl ProviderId {
    pub const ALL: [Self; 6] = [
        Self::Kis,
        Self::Alphavantage,
        Self::Yahoo,
        Self::Naver,
        Self::Stooq,
        Self::Vision,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kis => "kis",
            Self::Alphavantage => "alphavantage",
            Self::Yahoo => "yahoo",
            Self::Naver => "naver",
            Self::Stooq => "stooq",
            Self::Vision => "vision",
        }
    }

    pub const fn provenance(self) -> Provenance {
        match self {
            Self::Kis | Self::Alphavantage | Self::Yahoo => Provenance::Api,
            Self::Naver | Self::Stooq => Provenance::Crawling,
            Self::Vision => Provenance::VisionAssisted,
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kis" => Ok(Self::Kis),
            "alphavantage" => Ok(Self::Alphavantage),
            "yahoo" => Ok(Self::Yahoo),
            "naver" => Ok(Self::Naver),
            "stooq" => Ok(Self::Stooq),
            "vision" => Ok(Self::Vision),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_ids_round_trip_through_strings() {
        for provider in ProviderId::ALL {
            assert_eq!(provider.as_str().parse::<ProviderId>(), Ok(provider));
        }
        assert!(matches!(
            "bloomberg".parse::<ProviderId>(),
            Err(ValidationError::InvalidSource { .. })
        ));
    }

    #[test]
    fn provenance_follows_fetch_technique() {
        assert_eq!(ProviderId::Kis.provenance(), Provenance::Api);
        assert_eq!(ProviderId::Naver.provenance(), Provenance::Crawling);
        assert_eq!(ProviderId::Vision.provenance(), Provenance::VisionAssisted);
    }
}
