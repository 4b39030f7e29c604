//! CSV-backed price source
//!
//! Expected columns: `date,symbol,price` with dates as `YYYY-MM-DD`. An empty
//! price cell lists the day without a numeric price.

use super::in_memory::InMemoryPriceSource;
use super::{HistoricalPriceSource, LatestQuote, PriceMatrix, PriceRequest};
use crate::calendar::parse_date;
use crate::currency::Currency;
use crate::error::{FxError, Result};
use crate::types::{Day, Granularity, MarketPrice};
use async_trait::async_trait;
use hashbrown::HashMap;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    symbol: String,
    price: Option<f64>,
}

/// Price source loaded from CSV data
#[derive(Debug)]
pub struct CsvPriceSource {
    inner: InMemoryPriceSource,
    rows: usize,
}

impl CsvPriceSource {
    /// Load prices from a CSV file
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load prices from any reader producing CSV text
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);
        let mut inner = InMemoryPriceSource::new();
        let mut rows = 0;

        for (line, result) in reader.deserialize().enumerate() {
            let row: CsvRow = result?;
            let day = parse_date(&row.date)?;
            let symbol = row.symbol;
            crate::currency::split_symbol(&symbol).map_err(|e| {
                FxError::ParseError(format!("Invalid symbol at row {}: {}", line + 1, e))
            })?;

            let price = match row.price {
                Some(p) => MarketPrice::new(p),
                None => MarketPrice::missing(),
            };
            inner.insert_price(&symbol, day, price);
            rows += 1;
        }

        inner.derive_latest_from_history();
        log::info!(
            "Loaded {} price rows for {} symbols from CSV",
            rows,
            inner.num_symbols()
        );

        Ok(Self { inner, rows })
    }

    /// Number of rows loaded
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Sorted currencies appearing on either side of a loaded symbol
    pub fn currencies(&self) -> Vec<Currency> {
        let currencies: BTreeSet<Currency> = self
            .inner
            .symbols()
            .filter_map(|symbol| crate::currency::split_symbol(symbol).ok())
            .flat_map(|(currency1, currency2)| [currency1, currency2])
            .collect();
        currencies.into_iter().collect()
    }
}

#[async_trait]
impl HistoricalPriceSource for CsvPriceSource {
    async fn historical_prices(
        &self,
        items: &[PriceRequest],
        granularity: Granularity,
        from: Day,
        to: Day,
    ) -> Result<PriceMatrix> {
        self.inner
            .historical_prices(items, granularity, from, to)
            .await
    }

    async fn latest_quotes(&self, items: &[PriceRequest]) -> Result<HashMap<String, LatestQuote>> {
        self.inner.latest_quotes(items).await
    }

    fn name(&self) -> &str {
        "csv"
    }
}
