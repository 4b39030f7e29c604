//! Core types and constants

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar day used as the key of every rate lookup
pub type Day = NaiveDate;

/// Price type (using f64 for precision)
pub type Price = f64;

/// Multiplier converting an amount in currency1 into currency2
pub type Factor = f64;

/// Canonical `YYYY-MM-DD` format for all date keys
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Granularity requested from a historical price source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
}

/// Observed market price for one symbol on one day.
///
/// `market_price` is `None` when the source listed the day but could not
/// supply a numeric price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPrice {
    pub market_price: Option<Price>,
}

impl MarketPrice {
    /// Create a market price with a known value
    pub fn new(price: Price) -> Self {
        Self {
            market_price: Some(price),
        }
    }

    /// A listed day without a numeric price
    pub fn missing() -> Self {
        Self { market_price: None }
    }

    /// Price when it is a finite positive number
    pub fn valid(&self) -> Option<Price> {
        self.market_price.filter(|p| p.is_finite() && *p > 0.0)
    }
}

/// Check that a factor is usable for conversion
pub fn is_valid_factor(factor: Factor) -> bool {
    factor.is_finite() && factor > 0.0
}
