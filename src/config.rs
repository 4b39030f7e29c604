//! Engine configuration loaded from TOML

use crate::currency::{Currency, DataSource};
use crate::error::{FxError, Result};
use crate::types::Day;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upper bound accepted for `max_forward_days`
pub const MAX_FORWARD_DAYS_LIMIT: u32 = 31;

/// Exchange-rate engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxConfig {
    /// Currency every catalog pair is quoted against
    #[serde(default = "default_base_currency")]
    pub base_currency: Currency,
    /// Intermediate currency used to triangulate missing pairs
    #[serde(default = "default_pivot_currency")]
    pub pivot_currency: Currency,
    #[serde(default)]
    pub primary_data_source: DataSource,
    /// Earliest day the table ever needs to cover
    #[serde(default = "default_fx_start_date")]
    pub fx_start_date: Day,
    /// How many days a conversion may search forward for a missing rate
    #[serde(default = "default_max_forward_days")]
    pub max_forward_days: u32,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_base_currency() -> Currency {
    Currency::USD
}

fn default_pivot_currency() -> Currency {
    Currency::USD
}

fn default_fx_start_date() -> Day {
    NaiveDate::from_ymd_opt(2017, 1, 1).unwrap_or_default()
}

fn default_max_forward_days() -> u32 {
    7
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            pivot_currency: default_pivot_currency(),
            primary_data_source: DataSource::default(),
            fx_start_date: default_fx_start_date(),
            max_forward_days: default_max_forward_days(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl FxConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: FxConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(FxError::ConfigError(
                "fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_forward_days > MAX_FORWARD_DAYS_LIMIT {
            return Err(FxError::ConfigError(format!(
                "max_forward_days must be at most {}, got {}",
                MAX_FORWARD_DAYS_LIMIT, self.max_forward_days
            )));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn with_base_currency(mut self, base: Currency) -> Self {
        self.base_currency = base;
        self
    }

    pub fn with_pivot_currency(mut self, pivot: Currency) -> Self {
        self.pivot_currency = pivot;
        self
    }

    pub fn with_fx_start_date(mut self, day: Day) -> Self {
        self.fx_start_date = day;
        self
    }
}
