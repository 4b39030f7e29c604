//! Point-in-time conversion against a rate table
//!
//! Resolution ladder for `from != to`:
//! 1. exact factor for the pair on the day,
//! 2. pivot triangulation on the same day (cached into the table),
//! 3. for days before today, retry on the next day, a bounded number of times,
//! 4. otherwise the conversion is unresolved.

use super::rate_table::{ExchangeRateObservation, RateTable};
use crate::calendar::{next_day, Clock};
use crate::currency::{pair_symbol, Currency};
use crate::error::{FxError, Result};
use crate::types::{is_valid_factor, Day, Factor};
use serde::Serialize;
use std::sync::Arc;

/// How a conversion factor was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConversionMethod {
    /// Same currency on both sides
    Identity,
    /// Stored factor for the pair
    Exact,
    /// Derived through an intermediate currency
    Pivot(Currency),
}

/// Outcome of a resolved conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Conversion {
    pub value: f64,
    pub factor: Factor,
    /// Day the factor was found on
    pub resolved_on: Day,
    /// Days searched forward from the requested day
    pub forward_days: u32,
    pub method: ConversionMethod,
}

/// Resolves conversion factors from a rate table
#[derive(Debug, Clone)]
pub struct ConversionResolver {
    /// Intermediate currencies, tried in order
    pivots: Vec<Currency>,
    max_forward_days: u32,
    clock: Arc<dyn Clock>,
}

impl ConversionResolver {
    /// Pivot through `pivot` first and through `base` when it differs
    pub fn new(pivot: Currency, base: Currency, max_forward_days: u32, clock: Arc<dyn Clock>) -> Self {
        let mut pivots = vec![pivot];
        if base != pivot {
            pivots.push(base);
        }
        Self {
            pivots,
            max_forward_days,
            clock,
        }
    }

    pub fn pivots(&self) -> &[Currency] {
        &self.pivots
    }

    pub fn max_forward_days(&self) -> u32 {
        self.max_forward_days
    }

    /// Convert `value`, failing with `UnresolvedConversion` when the ladder is exhausted
    pub fn try_convert(
        &self,
        table: &RateTable,
        value: f64,
        from: Currency,
        to: Currency,
        date: Day,
    ) -> Result<Conversion> {
        if from == to {
            return Ok(Conversion {
                value,
                factor: 1.0,
                resolved_on: date,
                forward_days: 0,
                method: ConversionMethod::Identity,
            });
        }

        let today = self.clock.today();
        let mut day = date;
        let mut forward_days = 0;

        loop {
            if let Some((factor, method)) = self.factor_on(table, from, to, day) {
                return Ok(Conversion {
                    value: value * factor,
                    factor,
                    resolved_on: day,
                    forward_days,
                    method,
                });
            }

            if day >= today || forward_days >= self.max_forward_days {
                break;
            }

            log::warn!(
                "No exchange rate has been found for {} - {}, try with next day",
                pair_symbol(from, to),
                day
            );
            day = next_day(day);
            forward_days += 1;
        }

        Err(FxError::UnresolvedConversion {
            symbol: pair_symbol(from, to),
            date,
            max_days: self.max_forward_days,
        })
    }

    /// Convert `value`, falling back to the unconverted value with an error log
    pub fn convert(
        &self,
        table: &RateTable,
        value: f64,
        from: Currency,
        to: Currency,
        date: Day,
    ) -> f64 {
        match self.try_convert(table, value, from, to, date) {
            Ok(conversion) => conversion.value,
            Err(e) => {
                log::error!("{}", e);
                value
            }
        }
    }

    /// Exact factor, else a pivot-derived factor for the same day
    fn factor_on(
        &self,
        table: &RateTable,
        from: Currency,
        to: Currency,
        day: Day,
    ) -> Option<(Factor, ConversionMethod)> {
        match table.require(from, to, day) {
            Ok(factor) if is_valid_factor(factor) => return Some((factor, ConversionMethod::Exact)),
            Ok(_) => {}
            Err(e) => log::debug!("{}", e),
        }

        for &pivot in &self.pivots {
            if pivot == from || pivot == to {
                continue;
            }
            let (Some(leg1), Some(leg2)) = (table.exact(from, pivot, day), table.exact(pivot, to, day))
            else {
                continue;
            };

            let factor = leg1 * leg2;
            if !is_valid_factor(factor) {
                continue;
            }

            if let Err(e) = table
                .insert_with_inverse_if_absent(ExchangeRateObservation::new(from, to, day, factor))
            {
                log::debug!("Could not cache derived factor: {}", e);
            }
            return Some((factor, ConversionMethod::Pivot(pivot)));
        }

        None
    }
}
