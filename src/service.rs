//! Exchange-rate service
//!
//! Owns the current initialization epoch (catalog, pairs and rate table) and
//! answers conversions against it. A new epoch is built off to the side and
//! swapped in whole; readers keep whatever table they already hold.

use crate::calendar::{Clock, SystemClock};
use crate::config::FxConfig;
use crate::currency::{Currency, CurrencyPair};
use crate::data::fx::{
    build_currency_pairs, CatalogBuilder, Conversion, ConversionResolver, ExchangeRateObservation,
    RateTable, ReconcileStats, Reconciler,
};
use crate::data::sources::{
    ActivityCalendar, CurrencyDirectory, HistoricalPriceSource, PropertyStore,
    StaticActivityCalendar, StaticCurrencyDirectory, StaticPropertyStore,
};
use crate::error::Result;
use crate::types::Day;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

/// Everything produced by one initialization
#[derive(Debug, Default)]
struct Epoch {
    currencies: Vec<Currency>,
    pairs: Vec<CurrencyPair>,
    table: Arc<RateTable>,
    stats: ReconcileStats,
    range: Option<(Day, Day)>,
}

/// Currency conversion service with self-healing initialization
pub struct ExchangeRateService {
    config: FxConfig,
    prices: Arc<dyn HistoricalPriceSource>,
    directory: Arc<dyn CurrencyDirectory>,
    properties: Arc<dyn PropertyStore>,
    activities: Arc<dyn ActivityCalendar>,
    clock: Arc<dyn Clock>,
    reconciler: Reconciler,
    resolver: ConversionResolver,
    current: RwLock<Arc<Epoch>>,
    /// Serializes initializations
    init_lock: Mutex<()>,
    /// Completed initializations
    epoch: AtomicU64,
}

impl ExchangeRateService {
    /// Create a service with empty collaborators; nothing is loaded until
    /// `initialize` runs or the first conversion finds the table empty.
    pub fn new(config: FxConfig, prices: Arc<dyn HistoricalPriceSource>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            reconciler: Reconciler::new(
                config.pivot_currency,
                config.fetch_timeout(),
                clock.clone(),
            ),
            resolver: ConversionResolver::new(
                config.pivot_currency,
                config.base_currency,
                config.max_forward_days,
                clock.clone(),
            ),
            directory: Arc::new(StaticCurrencyDirectory::new()),
            properties: Arc::new(StaticPropertyStore::default()),
            activities: Arc::new(StaticActivityCalendar::new(Vec::new())),
            clock,
            config,
            prices,
            current: RwLock::new(Arc::new(Epoch::default())),
            init_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn with_currency_directory(mut self, directory: Arc<dyn CurrencyDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_property_store(mut self, properties: Arc<dyn PropertyStore>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_activity_calendar(mut self, activities: Arc<dyn ActivityCalendar>) -> Self {
        self.activities = activities;
        self
    }

    /// Replace the clock used for "today" everywhere in the service
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.reconciler = Reconciler::new(
            self.config.pivot_currency,
            self.config.fetch_timeout(),
            clock.clone(),
        );
        self.resolver = ConversionResolver::new(
            self.config.pivot_currency,
            self.config.base_currency,
            self.config.max_forward_days,
            clock.clone(),
        );
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &FxConfig {
        &self.config
    }

    /// Today according to the service clock
    pub fn today(&self) -> Day {
        self.clock.today()
    }

    fn snapshot(&self) -> Arc<Epoch> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Catalog currencies, never empty
    pub fn currencies(&self) -> Vec<Currency> {
        let epoch = self.snapshot();
        if epoch.currencies.is_empty() {
            vec![self.config.base_currency]
        } else {
            epoch.currencies.clone()
        }
    }

    /// Pairs requested from the price source in the current epoch
    pub fn currency_pairs(&self) -> Vec<CurrencyPair> {
        self.snapshot().pairs.clone()
    }

    /// Table of the current epoch
    pub fn table(&self) -> Arc<RateTable> {
        self.snapshot().table.clone()
    }

    /// Copy of every observation in the current table
    pub fn observations(&self) -> Vec<ExchangeRateObservation> {
        self.snapshot().table.snapshot()
    }

    pub fn stats(&self) -> ReconcileStats {
        self.snapshot().stats.clone()
    }

    /// Day range covered by the current table
    pub fn loaded_range(&self) -> Option<(Day, Day)> {
        self.snapshot().range
    }

    /// Number of completed initializations
    pub fn initializations(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Rebuild catalog, pairs and table from the first relevant day to today
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        self.rebuild(None).await
    }

    /// Same as `initialize`, for periodic refreshes
    pub async fn reload(&self) -> Result<()> {
        self.initialize().await
    }

    /// Rebuild from a fixed day up to today
    pub async fn reload_from(&self, from: Day) -> Result<()> {
        let today = self.clock.today();
        self.load_range(from, today).await
    }

    /// Rebuild the table for an explicit day range
    pub async fn load_range(&self, from: Day, to: Day) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        self.rebuild(Some((from, to))).await
    }

    /// Caller must hold `init_lock`
    async fn rebuild(&self, range: Option<(Day, Day)>) -> Result<()> {
        let currencies =
            CatalogBuilder::new(self.directory.as_ref(), self.properties.as_ref())
                .build()
                .await;
        let pairs = build_currency_pairs(
            &currencies,
            self.config.base_currency,
            self.config.primary_data_source,
        );

        let (from, to) = match range {
            Some(range) => range,
            None => (self.first_relevant_date().await, self.clock.today()),
        };

        let outcome = self
            .reconciler
            .reconcile(self.prices.as_ref(), &pairs, from, to)
            .await?;

        let epoch = Epoch {
            currencies,
            pairs,
            table: Arc::new(outcome.table),
            stats: outcome.stats,
            range: Some((from, to)),
        };
        log::info!(
            "Exchange rates initialized: {} currencies, {} pairs, {} observations",
            epoch.currencies.len(),
            epoch.pairs.len(),
            epoch.table.len()
        );

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(epoch);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn first_relevant_date(&self) -> Day {
        let floor = self.config.fx_start_date;
        match self.activities.first_relevant_date(floor).await {
            Ok(Some(day)) => day.max(floor),
            Ok(None) => floor,
            Err(e) => {
                log::warn!("Could not determine first activity date: {}", e);
                floor
            }
        }
    }

    /// Reinitialize once if the table is empty; concurrent callers share
    /// a single rebuild.
    async fn ensure_loaded(&self) {
        let seen = self.epoch.load(Ordering::SeqCst);
        if !self.snapshot().table.is_empty() {
            return;
        }

        let _guard = self.init_lock.lock().await;
        if self.epoch.load(Ordering::SeqCst) != seen {
            return;
        }

        log::info!("Reinitialize because exchange rate data is not loaded");
        if let Err(e) = self.rebuild(None).await {
            log::error!("Reinitialization of exchange rates failed: {}", e);
        }
    }

    /// Convert `value` on `date`; never fails, an unresolved pair returns
    /// `value` unchanged.
    pub async fn convert(&self, value: f64, from: Currency, to: Currency, date: Day) -> f64 {
        self.ensure_loaded().await;
        let table = self.table();
        self.resolver.convert(&table, value, from, to, date)
    }

    /// Convert `value` at today's rate
    pub async fn convert_today(&self, value: f64, from: Currency, to: Currency) -> f64 {
        self.convert(value, from, to, self.today()).await
    }

    /// Convert `value` on `date`, reporting how the factor was found
    pub async fn try_convert(
        &self,
        value: f64,
        from: Currency,
        to: Currency,
        date: Day,
    ) -> Result<Conversion> {
        self.ensure_loaded().await;
        let table = self.table();
        self.resolver.try_convert(&table, value, from, to, date)
    }

    /// Convert several amounts into one currency
    pub async fn convert_amounts(&self, amounts: &[(f64, Currency)], to: Currency, date: Day) -> Vec<f64> {
        let mut converted = Vec::with_capacity(amounts.len());
        for &(amount, from) in amounts {
            converted.push(self.convert(amount, from, to, date).await);
        }
        converted
    }

    /// Sum of positions valued in `target`
    pub async fn portfolio_value(&self, positions: &[(f64, Currency)], target: Currency, date: Day) -> f64 {
        self.convert_amounts(positions, target, date)
            .await
            .iter()
            .sum()
    }
}
