//! Error types for rusty_fxrates

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for rusty_fxrates
#[derive(Error, Debug)]
pub enum FxError {
    #[error("No quote for {symbol} on {date}")]
    MissingQuote { symbol: String, date: NaiveDate },

    #[error(
        "No exchange rate has been found for {symbol} from {date} within {max_days} days"
    )]
    UnresolvedConversion {
        symbol: String,
        date: NaiveDate,
        max_days: u32,
    },

    #[error("Malformed factor for {symbol} on {date}: {factor}")]
    MalformedFactor {
        symbol: String,
        date: NaiveDate,
        factor: f64,
    },

    #[error("Currency catalog is empty")]
    CatalogEmpty,

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Price source timed out after {0}s")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Result type alias for rusty_fxrates operations
pub type Result<T> = std::result::Result<T, FxError>;
