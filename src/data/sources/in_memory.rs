//! In-memory collaborators
//!
//! Preloaded price data and static currency lists. Used by the CLI (through
//! the CSV source) and by tests that need to count or delay source calls.

use super::{
    ActivityCalendar, CurrencyDirectory, HistoricalPriceSource, LatestQuote, PriceMatrix,
    PriceRequest, PropertyStore,
};
use crate::calendar::{Clock, SystemClock};
use crate::currency::Currency;
use crate::error::{FxError, Result};
use crate::types::{Day, Granularity, MarketPrice, Price};
use async_trait::async_trait;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Price source answering from preloaded data
#[derive(Debug, Default)]
pub struct InMemoryPriceSource {
    prices: PriceMatrix,
    latest: HashMap<String, LatestQuote>,
    /// Artificial latency applied to every call
    delay: Option<Duration>,
    failing: AtomicBool,
    historical_calls: AtomicUsize,
    latest_calls: AtomicUsize,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a daily price
    pub fn with_price(mut self, symbol: &str, day: Day, price: Price) -> Self {
        self.insert_price(symbol, day, MarketPrice::new(price));
        self
    }

    /// List a day for `symbol` without a numeric price
    pub fn with_missing_price(mut self, symbol: &str, day: Day) -> Self {
        self.insert_price(symbol, day, MarketPrice::missing());
        self
    }

    pub fn with_latest(mut self, symbol: &str, price: Price, currency: Currency) -> Self {
        self.latest.insert(
            symbol.to_string(),
            LatestQuote {
                market_price: price,
                currency,
            },
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert_price(&mut self, symbol: &str, day: Day, price: MarketPrice) {
        self.prices
            .entry(symbol.to_string())
            .or_default()
            .insert(day, price);
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of historical requests served
    pub fn historical_calls(&self) -> usize {
        self.historical_calls.load(Ordering::SeqCst)
    }

    /// Number of latest-quote requests served
    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    /// Latest valid price per symbol, quoted in the symbol's second currency
    pub fn derive_latest_from_history(&mut self) {
        for (symbol, series) in &self.prices {
            if self.latest.contains_key(symbol) {
                continue;
            }
            let Ok((_, currency2)) = crate::currency::split_symbol(symbol) else {
                continue;
            };
            if let Some(price) = series.values().rev().find_map(MarketPrice::valid) {
                self.latest.insert(
                    symbol.clone(),
                    LatestQuote {
                        market_price: price,
                        currency: currency2,
                    },
                );
            }
        }
    }

    /// Number of symbols with at least one listed day
    pub fn num_symbols(&self) -> usize {
        self.prices.len()
    }

    /// Symbols with at least one listed day
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.prices.keys().map(String::as_str)
    }

    async fn before_call(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FxError::DataError(
                "In-memory price source is set to fail".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoricalPriceSource for InMemoryPriceSource {
    async fn historical_prices(
        &self,
        items: &[PriceRequest],
        _granularity: Granularity,
        from: Day,
        to: Day,
    ) -> Result<PriceMatrix> {
        self.historical_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        let mut result = PriceMatrix::new();
        for item in items {
            let Some(series) = self.prices.get(&item.symbol) else {
                continue;
            };
            let window: std::collections::BTreeMap<Day, MarketPrice> = series
                .range(from..=to)
                .map(|(day, price)| (*day, *price))
                .collect();
            if !window.is_empty() {
                result.insert(item.symbol.clone(), window);
            }
        }
        Ok(result)
    }

    async fn latest_quotes(&self, items: &[PriceRequest]) -> Result<HashMap<String, LatestQuote>> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        Ok(items
            .iter()
            .filter_map(|item| {
                self.latest
                    .get(&item.symbol)
                    .map(|quote| (item.symbol.clone(), *quote))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Currency directory backed by fixed lists
#[derive(Debug, Clone, Default)]
pub struct StaticCurrencyDirectory {
    pub accounts: Vec<Option<String>>,
    pub settings: Vec<Option<String>>,
    pub profiles: Vec<Option<String>>,
}

impl StaticCurrencyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(mut self, codes: &[&str]) -> Self {
        self.accounts.extend(codes.iter().map(|c| Some(c.to_string())));
        self
    }

    pub fn with_settings(mut self, codes: &[&str]) -> Self {
        self.settings.extend(codes.iter().map(|c| Some(c.to_string())));
        self
    }

    pub fn with_profiles(mut self, codes: &[&str]) -> Self {
        self.profiles.extend(codes.iter().map(|c| Some(c.to_string())));
        self
    }
}

#[async_trait]
impl CurrencyDirectory for StaticCurrencyDirectory {
    async fn account_currencies(&self) -> Result<Vec<Option<String>>> {
        Ok(self.accounts.clone())
    }

    async fn settings_currencies(&self) -> Result<Vec<Option<String>>> {
        Ok(self.settings.clone())
    }

    async fn profile_currencies(&self) -> Result<Vec<Option<String>>> {
        Ok(self.profiles.clone())
    }
}

/// Property store with a fixed custom currency list
#[derive(Debug, Clone, Default)]
pub struct StaticPropertyStore {
    custom_currencies: Option<Vec<String>>,
}

impl StaticPropertyStore {
    pub fn new(custom_currencies: Option<Vec<String>>) -> Self {
        Self { custom_currencies }
    }
}

#[async_trait]
impl PropertyStore for StaticPropertyStore {
    async fn custom_currencies(&self) -> Result<Option<Vec<String>>> {
        Ok(self.custom_currencies.clone())
    }
}

/// Activity calendar over a fixed list of activity days.
///
/// Days after today are drafts and never count as relevant.
#[derive(Debug, Clone)]
pub struct StaticActivityCalendar {
    activity_days: Vec<Day>,
    clock: Arc<dyn Clock>,
}

impl StaticActivityCalendar {
    pub fn new(activity_days: Vec<Day>) -> Self {
        Self {
            activity_days,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl ActivityCalendar for StaticActivityCalendar {
    async fn first_relevant_date(&self, floor: Day) -> Result<Option<Day>> {
        let today = self.clock.today();
        Ok(self
            .activity_days
            .iter()
            .copied()
            .filter(|day| *day >= floor && *day <= today)
            .min())
    }
}
