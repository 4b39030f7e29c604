//! Foreign Exchange (FX) rate reconciliation
//!
//! Builds a complete table of conversion factors from partial market data and
//! resolves point-in-time conversions against it.
//!
//! # Components
//!
//! - **catalog**: Currency discovery and the pairs requested from the price source
//! - **rate_table**: Append-only table of (pair, day, factor) observations
//! - **reconcile**: Inverse synthesis, gap detection and pivot triangulation
//! - **resolver**: Exact / pivot / forward-search conversion ladder
//!
//! # Example
//!
//! ```rust
//! use rusty_fxrates::data::fx::{build_table, ConversionResolver};
//! use rusty_fxrates::data::sources::PriceMatrix;
//! use rusty_fxrates::calendar::FixedClock;
//! use rusty_fxrates::currency::Currency;
//! use rusty_fxrates::types::MarketPrice;
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
//! let mut prices = PriceMatrix::new();
//! prices
//!     .entry("EURUSD".to_string())
//!     .or_default()
//!     .insert(day, MarketPrice::new(1.25));
//!
//! let outcome = build_table(&prices, Currency::USD);
//! let resolver = ConversionResolver::new(
//!     Currency::USD,
//!     Currency::USD,
//!     7,
//!     Arc::new(FixedClock::new(day)),
//! );
//!
//! // 100 USD = 80 EUR, through the synthesized inverse
//! let eur = resolver.convert(&outcome.table, 100.0, Currency::USD, Currency::EUR, day);
//! assert!((eur - 80.0).abs() < 1e-9);
//! ```

pub mod catalog;
pub mod rate_table;
pub mod reconcile;
pub mod resolver;

pub use catalog::{build_currency_pairs, CatalogBuilder};
pub use rate_table::{ExchangeRateObservation, RateTable};
pub use reconcile::{build_table, MissingPair, ReconcileOutcome, ReconcileStats, Reconciler};
pub use resolver::{Conversion, ConversionMethod, ConversionResolver};
