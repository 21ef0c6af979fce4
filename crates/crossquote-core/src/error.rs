use thiserror::Error;

/// Validation and contract errors exposed by `crossquote-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid source '{value}', expected one of kis, alphavantage, yahoo, naver, stooq, vision")]
    InvalidSource { value: String },
    #[error("invalid market '{value}', expected one of kr, us")]
    InvalidMarket { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("tolerance '{field}' must be a finite fraction in [0, 1], got {value}")]
    InvalidTolerance { field: &'static str, value: f64 },
    #[error("match ratio must be within (0, 1], got {value}")]
    InvalidMatchRatio { value: f64 },
    #[error("base score for '{status}' must be within [0, 1], got {value}")]
    InvalidBaseScore { status: &'static str, value: f64 },
    #[error("base score for '{status}' must not exceed the score of '{above}'")]
    BaseScoreOrder {
        status: &'static str,
        above: &'static str,
    },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },

    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read config '{path}': {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
