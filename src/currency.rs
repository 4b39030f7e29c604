//! Currency codes, data sources and quotable currency pairs

use crate::error::{FxError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-letter currency code, case preserved.
///
/// Codes differing only in case are distinct currencies: `GBp` (pence) is
/// not `GBP`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub const USD: Currency = Currency(*b"USD");
    pub const EUR: Currency = Currency(*b"EUR");
    pub const GBP: Currency = Currency(*b"GBP");
    pub const CHF: Currency = Currency(*b"CHF");
    pub const JPY: Currency = Currency(*b"JPY");

    /// Parse a code of three ASCII letters, keeping its case
    pub fn new(code: &str) -> Result<Self> {
        let bytes = code.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(FxError::ParseError(format!(
                "Invalid currency code: '{}'",
                code
            )));
        }

        let mut letters = [0u8; 3];
        letters.copy_from_slice(bytes);
        Ok(Currency(letters))
    }

    /// Code exactly as parsed
    pub fn code(&self) -> &str {
        // Only ASCII letters are ever stored
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for Currency {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = FxError;

    fn try_from(value: String) -> Result<Self> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.code())
    }
}

/// Market-data vendor a pair is requested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    #[default]
    Yahoo,
    AlphaVantage,
    Quandl,
    Manual,
    Csv,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSource::Yahoo => "YAHOO",
            DataSource::AlphaVantage => "ALPHA_VANTAGE",
            DataSource::Quandl => "QUANDL",
            DataSource::Manual => "MANUAL",
            DataSource::Csv => "CSV",
        };
        f.write_str(name)
    }
}

/// Currency pair requested from a price source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub currency1: Currency,
    pub currency2: Currency,
    pub data_source: DataSource,
}

impl CurrencyPair {
    /// Create new currency pair
    pub fn new(currency1: Currency, currency2: Currency, data_source: DataSource) -> Self {
        Self {
            currency1,
            currency2,
            data_source,
        }
    }

    /// Six-character symbol, e.g. `EURUSD`
    pub fn symbol(&self) -> String {
        pair_symbol(self.currency1, self.currency2)
    }

    /// Get the inverse pair
    pub fn inverse(&self) -> Self {
        Self {
            currency1: self.currency2,
            currency2: self.currency1,
            data_source: self.data_source,
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.currency1, self.currency2)
    }
}

/// Concatenate two codes into a pair symbol
pub fn pair_symbol(currency1: Currency, currency2: Currency) -> String {
    format!("{}{}", currency1, currency2)
}

/// Split a six-character symbol into its two three-character halves
pub fn split_symbol(symbol: &str) -> Result<(Currency, Currency)> {
    if symbol.len() != 6 || !symbol.is_ascii() {
        return Err(FxError::ParseError(format!(
            "Invalid currency pair symbol: '{}'",
            symbol
        )));
    }
    Ok((Currency::new(&symbol[0..3])?, Currency::new(&symbol[3..6])?))
}
