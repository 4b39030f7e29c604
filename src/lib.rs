//! # rusty_fxrates
//!
//! Exchange-rate reconciliation engine.
//!
//! Builds a complete table of currency conversion factors from partial
//! historical market data (inverse directions, gap detection, triangulation
//! through a pivot currency) and serves point-in-time conversions with a
//! bounded forward-day search and a self-healing reload.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rusty_fxrates::prelude::*;
//! use rusty_fxrates::data::sources::{CsvPriceSource, StaticCurrencyDirectory};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> rusty_fxrates::error::Result<()> {
//! let prices = CsvPriceSource::from_path(Path::new("fx.csv"))?;
//! let service = ExchangeRateService::new(FxConfig::default(), Arc::new(prices))
//!     .with_currency_directory(Arc::new(
//!         StaticCurrencyDirectory::new().with_accounts(&["EUR", "GBP"]),
//!     ));
//! service.initialize().await?;
//!
//! let gbp = service.convert_today(100.0, Currency::EUR, Currency::GBP).await;
//! # let _ = gbp;
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod config;
pub mod currency;
pub mod data;
pub mod error;
pub mod service;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::calendar::{Clock, FixedClock, SystemClock};
    pub use crate::config::FxConfig;
    pub use crate::currency::{Currency, CurrencyPair, DataSource};
    pub use crate::data::fx::{Conversion, ConversionMethod, ExchangeRateObservation, RateTable};
    pub use crate::data::sources::HistoricalPriceSource;
    pub use crate::error::{FxError, Result};
    pub use crate::service::ExchangeRateService;
    pub use crate::types::*;
}
