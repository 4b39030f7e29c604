//! Collaborators the exchange-rate engine pulls data from
//!
//! The engine never talks to a vendor or a database directly. It consumes:
//! - a historical price source (daily prices plus latest quotes),
//! - a currency directory (currencies used by accounts, settings, profiles),
//! - a property store holding the operator's custom currency list,
//! - an activity calendar giving the earliest day conversions must cover.
//!
//! In-memory and CSV-backed implementations live alongside the traits.

pub mod csv_source;
pub mod in_memory;

pub use csv_source::CsvPriceSource;
pub use in_memory::{
    InMemoryPriceSource, StaticActivityCalendar, StaticCurrencyDirectory, StaticPropertyStore,
};

use crate::currency::{Currency, CurrencyPair, DataSource};
use crate::error::Result;
use crate::types::{Day, Granularity, MarketPrice, Price};
use async_trait::async_trait;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prices per symbol per day, as returned by a price source.
///
/// Symbols or days the source could not resolve are simply absent.
pub type PriceMatrix = HashMap<String, BTreeMap<Day, MarketPrice>>;

/// One (data source, symbol) item to request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    pub data_source: DataSource,
    pub symbol: String,
}

impl From<&CurrencyPair> for PriceRequest {
    fn from(pair: &CurrencyPair) -> Self {
        Self {
            data_source: pair.data_source,
            symbol: pair.symbol(),
        }
    }
}

/// Single point-in-time quote
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestQuote {
    pub market_price: Price,
    pub currency: Currency,
}

/// Source of historical and latest market prices
#[async_trait]
pub trait HistoricalPriceSource: Send + Sync {
    /// Daily prices for every requested item over `[from, to]`
    async fn historical_prices(
        &self,
        items: &[PriceRequest],
        granularity: Granularity,
        from: Day,
        to: Day,
    ) -> Result<PriceMatrix>;

    /// Latest quote for every requested item the source can resolve
    async fn latest_quotes(&self, items: &[PriceRequest]) -> Result<HashMap<String, LatestQuote>>;

    /// Get the source name
    fn name(&self) -> &str;
}

/// Distinct currencies referenced by stored records; `None` entries are
/// records without a currency.
#[async_trait]
pub trait CurrencyDirectory: Send + Sync {
    async fn account_currencies(&self) -> Result<Vec<Option<String>>>;

    async fn settings_currencies(&self) -> Result<Vec<Option<String>>>;

    async fn profile_currencies(&self) -> Result<Vec<Option<String>>>;
}

/// Operator-managed properties
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Custom currencies to include in the catalog, if configured
    async fn custom_currencies(&self) -> Result<Option<Vec<String>>>;
}

/// Activity history the table has to cover
#[async_trait]
pub trait ActivityCalendar: Send + Sync {
    /// Earliest non-draft activity day on or after `floor`
    async fn first_relevant_date(&self, floor: Day) -> Result<Option<Day>>;
}
