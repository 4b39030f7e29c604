//! Reconciliation of raw price data into a complete rate table
//!
//! Steps, in order, for one initialization epoch:
//! 1. fetch daily prices for every pair over the requested range,
//! 2. seed yesterday's latest quote for pairs the history did not cover,
//! 3. synthesize the reverse direction of every returned symbol,
//! 4. store valid prices and record the remaining (symbol, day) gaps,
//! 5. triangulate each gap through the pivot currency.

use super::rate_table::{ExchangeRateObservation, RateTable};
use crate::calendar::Clock;
use crate::currency::{pair_symbol, split_symbol, Currency, CurrencyPair};
use crate::data::sources::{HistoricalPriceSource, LatestQuote, PriceMatrix, PriceRequest};
use crate::error::{FxError, Result};
use crate::types::{Day, Factor, Granularity, MarketPrice};
use hashbrown::HashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Counters describing one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub requested_pairs: usize,
    pub returned_symbols: usize,
    /// Symbols seeded from latest quotes
    pub latest_fallbacks: usize,
    pub observations: usize,
    pub missing_pairs: usize,
    pub triangulated: usize,
    /// Gaps whose pivot legs were unavailable
    pub unresolved: usize,
}

/// Result of a reconciliation run
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub table: RateTable,
    pub stats: ReconcileStats,
}

/// A (symbol, day) with no usable direct quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPair {
    pub currency1: Currency,
    pub currency2: Currency,
    pub date: Day,
}

/// Builds rate tables from a historical price source
#[derive(Debug, Clone)]
pub struct Reconciler {
    pivot: Currency,
    fetch_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(pivot: Currency, fetch_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            pivot,
            fetch_timeout,
            clock,
        }
    }

    /// Fetch prices for `pairs` over `[from, to]` and build a fresh table
    pub async fn reconcile(
        &self,
        source: &dyn HistoricalPriceSource,
        pairs: &[CurrencyPair],
        from: Day,
        to: Day,
    ) -> Result<ReconcileOutcome> {
        if from > to {
            return Err(FxError::DataError(format!(
                "Invalid reconciliation range: {} is after {}",
                from, to
            )));
        }

        let requests: Vec<PriceRequest> = pairs.iter().map(PriceRequest::from).collect();

        let mut prices = self
            .bounded(
                &format!("historical prices from {}", source.name()),
                source.historical_prices(&requests, Granularity::Day, from, to),
            )
            .await
            .unwrap_or_default();
        let returned_symbols = prices.len();

        let missing: Vec<PriceRequest> = requests
            .iter()
            .filter(|request| !prices.contains_key(&request.symbol))
            .cloned()
            .collect();

        let mut latest_fallbacks = 0;
        if !missing.is_empty() {
            log::info!(
                "Historical data covers {} of {} pairs, loading latest quotes for the rest",
                returned_symbols,
                requests.len()
            );
            let quotes: HashMap<String, LatestQuote> = self
                .bounded(
                    &format!("latest quotes from {}", source.name()),
                    source.latest_quotes(&missing),
                )
                .await
                .unwrap_or_default();
            latest_fallbacks = seed_latest_quotes(&mut prices, &quotes, self.clock.yesterday());
        }

        let mut outcome = build_table(&prices, self.pivot);
        outcome.stats.requested_pairs = pairs.len();
        outcome.stats.returned_symbols = returned_symbols;
        outcome.stats.latest_fallbacks = latest_fallbacks;

        log::info!(
            "Reconciled {} pairs from {} to {}: {} observations, {} gaps, {} triangulated",
            pairs.len(),
            from,
            to,
            outcome.stats.observations,
            outcome.stats.missing_pairs,
            outcome.stats.triangulated
        );

        Ok(outcome)
    }

    /// Run a source call under the fetch timeout; failures count as "no data"
    async fn bounded<T, F>(&self, what: &str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                log::warn!("Failed to load {}: {}", what, e);
                None
            }
            Err(_) => {
                log::warn!(
                    "Failed to load {}: {}",
                    what,
                    FxError::Timeout(self.fetch_timeout.as_secs())
                );
                None
            }
        }
    }
}

/// Seed one observation dated `yesterday` per latest quote; returns how many
/// symbols were seeded
fn seed_latest_quotes(
    prices: &mut PriceMatrix,
    quotes: &HashMap<String, LatestQuote>,
    yesterday: Day,
) -> usize {
    let mut seeded = 0;
    for (symbol, quote) in quotes {
        if prices.contains_key(symbol) {
            continue;
        }
        let mut series = BTreeMap::new();
        series.insert(yesterday, MarketPrice::new(quote.market_price));
        prices.insert(symbol.clone(), series);
        seeded += 1;
    }
    seeded
}

/// Add the reverse direction of every symbol with reciprocal prices.
///
/// A synthesized price never replaces a valid direct quote. When a source
/// quotes both directions on the same day, the symbol that sorts first keeps
/// its price and the other direction becomes its reciprocal.
fn with_inverse_directions(
    prices: &PriceMatrix,
) -> BTreeMap<(Currency, Currency), BTreeMap<Day, MarketPrice>> {
    let mut parsed = BTreeMap::new();
    for (symbol, series) in prices {
        match split_symbol(symbol) {
            Ok((currency1, currency2)) if currency1 != currency2 => {
                parsed.insert((currency1, currency2), series);
            }
            Ok(_) => log::warn!("Ignoring same-currency symbol {}", symbol),
            Err(e) => log::warn!("Ignoring price series: {}", e),
        }
    }

    let mut extended: BTreeMap<(Currency, Currency), BTreeMap<Day, MarketPrice>> =
        BTreeMap::new();
    let mut quoted: BTreeSet<(Currency, Currency, Day)> = BTreeSet::new();

    for (&(currency1, currency2), series) in &parsed {
        for (&day, price) in series.iter() {
            match price.valid() {
                Some(_) if quoted.contains(&(currency1, currency2, day)) => {
                    log::debug!(
                        "Ignoring {} on {}: the reverse direction is already quoted",
                        pair_symbol(currency1, currency2),
                        day
                    );
                }
                Some(p) => {
                    extended
                        .entry((currency1, currency2))
                        .or_default()
                        .insert(day, MarketPrice::new(p));
                    extended
                        .entry((currency2, currency1))
                        .or_default()
                        .insert(day, MarketPrice::new(1.0 / p));
                    quoted.insert((currency1, currency2, day));
                    quoted.insert((currency2, currency1, day));
                }
                None => {
                    for key in [(currency1, currency2), (currency2, currency1)] {
                        extended
                            .entry(key)
                            .or_default()
                            .entry(day)
                            .or_insert_with(MarketPrice::missing);
                    }
                }
            }
        }
    }

    extended
}

/// Build a table from an already fetched price matrix (steps 3-5)
pub fn build_table(prices: &PriceMatrix, pivot: Currency) -> ReconcileOutcome {
    let table = RateTable::new();
    let mut stats = ReconcileStats::default();

    let extended = with_inverse_directions(prices);

    // A symbol lacking a day that any other symbol has is a gap on that day
    let all_days: BTreeSet<Day> = extended
        .values()
        .flat_map(|series| series.keys().copied())
        .collect();

    let mut missing = Vec::new();
    for (&(currency1, currency2), series) in &extended {
        for &day in &all_days {
            match series.get(&day).and_then(MarketPrice::valid) {
                Some(price) => {
                    if table
                        .append(ExchangeRateObservation::new(currency1, currency2, day, price))
                        .is_ok()
                    {
                        stats.observations += 1;
                    }
                }
                None => missing.push(MissingPair {
                    currency1,
                    currency2,
                    date: day,
                }),
            }
        }
    }
    stats.missing_pairs = missing.len();

    for gap in missing {
        if table.contains(gap.currency1, gap.currency2, gap.date) {
            // Already filled when its reverse direction was triangulated
            continue;
        }

        let factor = pivot_leg(&table, gap.currency1, pivot, gap.date)
            .zip(pivot_leg(&table, pivot, gap.currency2, gap.date))
            .map(|(leg1, leg2)| leg1 * leg2)
            .unwrap_or(Factor::NAN);

        match table.append_with_inverse(ExchangeRateObservation::new(
            gap.currency1,
            gap.currency2,
            gap.date,
            factor,
        )) {
            Ok(()) => stats.triangulated += 1,
            Err(e) => {
                log::debug!(
                    "Could not triangulate {} via {}: {}",
                    pair_symbol(gap.currency1, gap.currency2),
                    pivot,
                    e
                );
                stats.unresolved += 1;
            }
        }
    }

    ReconcileOutcome { table, stats }
}

/// Factor for one leg of a pivot path; identical currencies are factor 1
fn pivot_leg(table: &RateTable, from: Currency, to: Currency, day: Day) -> Option<Factor> {
    if from == to {
        Some(1.0)
    } else {
        table.exact(from, to, day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::FixedClock;
    use crate::currency::DataSource;
    use crate::data::sources::InMemoryPriceSource;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn day(d: u32) -> Day {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn matrix(entries: &[(&str, u32, Option<f64>)]) -> PriceMatrix {
        let mut prices = PriceMatrix::new();
        for (symbol, d, price) in entries {
            prices
                .entry(symbol.to_string())
                .or_default()
                .insert(day(*d), MarketPrice { market_price: *price });
        }
        prices
    }

    fn currency(code: &str) -> Currency {
        Currency::new(code).unwrap()
    }

    fn reconciler(today: Day) -> Reconciler {
        Reconciler::new(
            Currency::USD,
            Duration::from_secs(5),
            Arc::new(FixedClock::new(today)),
        )
    }

    #[test]
    fn test_inverse_synthesis() {
        let outcome = build_table(&matrix(&[("EURUSD", 2, Some(1.25))]), Currency::USD);
        let table = outcome.table;

        assert_eq!(table.exact(Currency::EUR, Currency::USD, day(2)), Some(1.25));
        assert_relative_eq!(
            table.exact(Currency::USD, Currency::EUR, day(2)).unwrap(),
            0.8,
            epsilon = 1e-12
        );
        assert_eq!(outcome.stats.observations, 2);
        assert!(table.inverse_violations(1e-12).is_empty());
    }

    #[test]
    fn test_both_directions_quoted_stay_reciprocal() {
        let outcome = build_table(
            &matrix(&[
                ("EURUSD", 2, Some(1.25)),
                ("USDEUR", 2, Some(0.81)),
                ("USDEUR", 3, Some(0.82)),
                ("EURUSD", 3, None),
            ]),
            Currency::USD,
        );
        let table = outcome.table;

        // EURUSD sorts first and keeps its quote on day 2
        assert_eq!(table.exact(Currency::EUR, Currency::USD, day(2)), Some(1.25));
        assert_relative_eq!(
            table.exact(Currency::USD, Currency::EUR, day(2)).unwrap(),
            0.8,
            epsilon = 1e-12
        );

        // A listing without a price does not displace the reverse quote
        assert_eq!(table.exact(Currency::USD, Currency::EUR, day(3)), Some(0.82));
        assert_relative_eq!(
            table.exact(Currency::EUR, Currency::USD, day(3)).unwrap(),
            1.0 / 0.82,
            epsilon = 1e-12
        );
        assert_eq!(outcome.stats.missing_pairs, 0);
        assert!(table.inverse_violations(1e-12).is_empty());
    }

    #[test]
    fn test_gap_triangulated_through_pivot() {
        // AAA->USD = 2.0 and USD->BBB = 0.5 known, AAABBB listed without a price
        let outcome = build_table(
            &matrix(&[
                ("AAAUSD", 3, Some(2.0)),
                ("USDBBB", 3, Some(0.5)),
                ("AAABBB", 3, None),
            ]),
            Currency::USD,
        );
        let table = outcome.table;

        assert_relative_eq!(
            table.exact(currency("AAA"), currency("BBB"), day(3)).unwrap(),
            1.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            table.exact(currency("BBB"), currency("AAA"), day(3)).unwrap(),
            1.0,
            epsilon = 1e-12
        );
        assert_eq!(outcome.stats.missing_pairs, 2);
        assert_eq!(outcome.stats.triangulated, 1);
        assert!(table.inverse_violations(1e-9).is_empty());
    }

    #[test]
    fn test_absent_day_is_a_gap() {
        // EURUSD has day 2 and 3, EURCHF only day 2, USDCHF covers day 3
        let outcome = build_table(
            &matrix(&[
                ("EURUSD", 2, Some(1.10)),
                ("EURUSD", 3, Some(1.20)),
                ("EURCHF", 2, Some(0.95)),
                ("USDCHF", 3, Some(0.80)),
            ]),
            Currency::USD,
        );

        let factor = outcome
            .table
            .exact(Currency::EUR, Currency::CHF, day(3))
            .unwrap();
        assert_relative_eq!(factor, 1.20 * 0.80, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_pivot_leg_is_not_stored() {
        let outcome = build_table(
            &matrix(&[("EURGBP", 2, Some(0.86)), ("EURGBP", 3, None)]),
            Currency::USD,
        );

        assert!(!outcome.table.contains(Currency::EUR, Currency::GBP, day(3)));
        assert_eq!(outcome.stats.triangulated, 0);
        assert_eq!(outcome.stats.unresolved, 2);
        assert!(outcome
            .table
            .snapshot()
            .iter()
            .all(|obs| obs.factor.is_finite() && obs.factor > 0.0));
    }

    #[test]
    fn test_non_numeric_prices_are_gaps() {
        let outcome = build_table(
            &matrix(&[("EURUSD", 2, Some(f64::NAN)), ("EURUSD", 3, Some(0.0))]),
            Currency::USD,
        );
        assert!(outcome.table.is_empty());
        assert_eq!(outcome.stats.missing_pairs, 4);
    }

    #[test]
    fn test_malformed_symbols_are_ignored() {
        let outcome = build_table(
            &matrix(&[("EURUSDX", 2, Some(1.1)), ("EUREUR", 2, Some(1.0))]),
            Currency::USD,
        );
        assert!(outcome.table.is_empty());
    }

    #[tokio::test]
    async fn test_latest_quote_fallback() {
        let source = InMemoryPriceSource::new()
            .with_price("USDEUR", day(2), 0.9)
            .with_latest("USDCHF", 0.88, Currency::CHF);
        let pairs = vec![
            CurrencyPair::new(Currency::USD, Currency::EUR, DataSource::Yahoo),
            CurrencyPair::new(Currency::USD, Currency::CHF, DataSource::Yahoo),
        ];

        let outcome = reconciler(day(10))
            .reconcile(&source, &pairs, day(1), day(10))
            .await
            .unwrap();

        assert_eq!(outcome.stats.returned_symbols, 1);
        assert_eq!(outcome.stats.latest_fallbacks, 1);
        assert_eq!(source.latest_calls(), 1);
        assert_eq!(
            outcome.table.exact(Currency::USD, Currency::CHF, day(9)),
            Some(0.88)
        );
        assert!(outcome
            .table
            .contains(Currency::CHF, Currency::USD, day(9)));
    }

    #[tokio::test]
    async fn test_no_latest_request_when_history_complete() {
        let source = InMemoryPriceSource::new().with_price("USDEUR", day(2), 0.9);
        let pairs = vec![CurrencyPair::new(
            Currency::USD,
            Currency::EUR,
            DataSource::Yahoo,
        )];

        reconciler(day(10))
            .reconcile(&source, &pairs, day(1), day(10))
            .await
            .unwrap();
        assert_eq!(source.latest_calls(), 0);
    }

    #[tokio::test]
    async fn test_source_failure_degrades_to_empty_table() {
        let source = InMemoryPriceSource::new().with_price("USDEUR", day(2), 0.9);
        source.set_failing(true);
        let pairs = vec![CurrencyPair::new(
            Currency::USD,
            Currency::EUR,
            DataSource::Yahoo,
        )];

        let outcome = reconciler(day(10))
            .reconcile(&source, &pairs, day(1), day(10))
            .await
            .unwrap();
        assert!(outcome.table.is_empty());
        assert_eq!(source.latest_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_unavailable() {
        let source = InMemoryPriceSource::new()
            .with_price("USDEUR", day(2), 0.9)
            .with_delay(Duration::from_secs(60));
        let pairs = vec![CurrencyPair::new(
            Currency::USD,
            Currency::EUR,
            DataSource::Yahoo,
        )];

        let outcome = reconciler(day(10))
            .reconcile(&source, &pairs, day(1), day(10))
            .await
            .unwrap();
        assert!(outcome.table.is_empty());
        assert_eq!(outcome.stats.returned_symbols, 0);
    }

    #[tokio::test]
    async fn test_invalid_range() {
        let source = InMemoryPriceSource::new();
        let result = reconciler(day(10))
            .reconcile(&source, &[], day(5), day(1))
            .await;
        assert!(result.is_err());
    }
}
