//! Append-only table of exchange-rate observations
//!
//! One table lives for one initialization epoch. Rows are never mutated once
//! appended; the first row stored for a `(currency1, currency2, day)` key is
//! the one lookups return.

use crate::calendar::format_date;
use crate::currency::{pair_symbol, Currency};
use crate::error::{FxError, Result};
use crate::types::{is_valid_factor, Day, Factor};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A single conversion factor for one pair on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRateObservation {
    pub symbol: String,
    pub currency1: Currency,
    pub currency2: Currency,
    #[serde(rename = "dateString")]
    pub date: Day,
    pub factor: Factor,
}

impl ExchangeRateObservation {
    pub fn new(currency1: Currency, currency2: Currency, date: Day, factor: Factor) -> Self {
        Self {
            symbol: pair_symbol(currency1, currency2),
            currency1,
            currency2,
            date,
            factor,
        }
    }

    /// Same day, opposite direction, reciprocal factor
    pub fn inverse(&self) -> Self {
        Self::new(self.currency2, self.currency1, self.date, 1.0 / self.factor)
    }

    /// Date in the canonical `YYYY-MM-DD` form
    pub fn date_string(&self) -> String {
        format_date(self.date)
    }
}

#[derive(Debug, Default)]
struct TableInner {
    rows: Vec<ExchangeRateObservation>,
    /// (currency1, currency2, day) -> index of the first matching row
    index: HashMap<(Currency, Currency, Day), usize>,
}

impl TableInner {
    fn push(&mut self, observation: ExchangeRateObservation) {
        let key = (observation.currency1, observation.currency2, observation.date);
        let position = self.rows.len();
        self.rows.push(observation);
        self.index.entry(key).or_insert(position);
    }

    fn factor(&self, from: Currency, to: Currency, day: Day) -> Option<Factor> {
        self.index
            .get(&(from, to, day))
            .map(|&position| self.rows[position].factor)
    }
}

/// Exchange-rate table for one initialization epoch.
///
/// Rows sit behind their own lock so resolver cache fills can append while
/// other readers hold the same `Arc<RateTable>`.
#[derive(Debug, Default)]
pub struct RateTable {
    inner: RwLock<TableInner>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, TableInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TableInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate(observation: &ExchangeRateObservation) -> Result<()> {
        if is_valid_factor(observation.factor) {
            Ok(())
        } else {
            Err(FxError::MalformedFactor {
                symbol: observation.symbol.clone(),
                date: observation.date,
                factor: observation.factor,
            })
        }
    }

    /// Append an observation; non-finite or non-positive factors are rejected
    pub fn append(&self, observation: ExchangeRateObservation) -> Result<()> {
        Self::validate(&observation)?;
        self.write().push(observation);
        Ok(())
    }

    /// Append an observation together with its inverse
    pub fn append_with_inverse(&self, observation: ExchangeRateObservation) -> Result<()> {
        Self::validate(&observation)?;
        let inverse = observation.inverse();
        Self::validate(&inverse)?;

        let mut inner = self.write();
        inner.push(observation);
        inner.push(inverse);
        Ok(())
    }

    /// Append an observation and its inverse unless the pair is already
    /// present for the day; returns whether a row was added.
    ///
    /// An existing row for the reverse direction is kept as is.
    pub fn insert_with_inverse_if_absent(&self, observation: ExchangeRateObservation) -> Result<bool> {
        Self::validate(&observation)?;
        let inverse = observation.inverse();
        Self::validate(&inverse)?;

        let mut inner = self.write();
        if inner
            .factor(observation.currency1, observation.currency2, observation.date)
            .is_some()
        {
            return Ok(false);
        }
        let reverse_known = inner
            .factor(inverse.currency1, inverse.currency2, inverse.date)
            .is_some();
        inner.push(observation);
        if !reverse_known {
            inner.push(inverse);
        }
        Ok(true)
    }

    /// Factor stored for exactly this pair and day
    pub fn exact(&self, from: Currency, to: Currency, day: Day) -> Option<Factor> {
        self.read().factor(from, to, day)
    }

    /// Exact lookup, reporting a miss as `MissingQuote`
    pub fn require(&self, from: Currency, to: Currency, day: Day) -> Result<Factor> {
        self.exact(from, to, day).ok_or_else(|| FxError::MissingQuote {
            symbol: pair_symbol(from, to),
            date: day,
        })
    }

    pub fn contains(&self, from: Currency, to: Currency, day: Day) -> bool {
        self.exact(from, to, day).is_some()
    }

    /// Get total number of rows
    pub fn len(&self) -> usize {
        self.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().rows.is_empty()
    }

    /// Copy of every row in insertion order
    pub fn snapshot(&self) -> Vec<ExchangeRateObservation> {
        self.read().rows.clone()
    }

    /// Rows whose reverse direction is missing or not reciprocal within `tolerance`
    pub fn inverse_violations(&self, tolerance: f64) -> Vec<ExchangeRateObservation> {
        let inner = self.read();
        inner
            .index
            .iter()
            .filter_map(|(&(from, to, day), &position)| {
                let factor = inner.rows[position].factor;
                match inner.factor(to, from, day) {
                    Some(reverse) if (factor * reverse - 1.0).abs() <= tolerance => None,
                    _ => Some(inner.rows[position].clone()),
                }
            })
            .collect()
    }
}
