//! Currency catalog discovery and pair generation

use crate::currency::{Currency, CurrencyPair, DataSource};
use crate::data::sources::{CurrencyDirectory, PropertyStore};
use crate::error::{FxError, Result};
use std::collections::BTreeSet;

/// Discovers the currencies in use across the collaborators
pub struct CatalogBuilder<'a> {
    directory: &'a dyn CurrencyDirectory,
    properties: &'a dyn PropertyStore,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(directory: &'a dyn CurrencyDirectory, properties: &'a dyn PropertyStore) -> Self {
        Self {
            directory,
            properties,
        }
    }

    /// Sorted, de-duplicated currencies from accounts, user settings,
    /// security profiles and the custom list.
    ///
    /// A failing collaborator contributes nothing; the result may be empty.
    pub async fn build(&self) -> Vec<Currency> {
        let mut currencies = BTreeSet::new();

        collect("accounts", self.directory.account_currencies().await, &mut currencies);
        collect("settings", self.directory.settings_currencies().await, &mut currencies);
        collect("profiles", self.directory.profile_currencies().await, &mut currencies);

        match self.properties.custom_currencies().await {
            Ok(Some(custom)) => {
                collect("custom", Ok(custom.into_iter().map(Some).collect()), &mut currencies)
            }
            Ok(None) => {}
            Err(e) => log::warn!("Could not read custom currencies: {}", e),
        }

        if currencies.is_empty() {
            log::warn!("{}, only the base currency will be served", FxError::CatalogEmpty);
        }

        currencies.into_iter().collect()
    }
}

fn collect(label: &str, codes: Result<Vec<Option<String>>>, out: &mut BTreeSet<Currency>) {
    let codes = match codes {
        Ok(codes) => codes,
        Err(e) => {
            log::warn!("Could not read {} currencies: {}", label, e);
            return;
        }
    };

    for code in codes.into_iter().flatten() {
        match Currency::new(&code) {
            Ok(currency) => {
                out.insert(currency);
            }
            Err(e) => log::warn!("Skipping {} currency: {}", label, e),
        }
    }
}

/// One `base -> currency` pair for every catalog currency other than the base
pub fn build_currency_pairs(
    catalog: &[Currency],
    base: Currency,
    data_source: DataSource,
) -> Vec<CurrencyPair> {
    catalog
        .iter()
        .filter(|&&currency| currency != base)
        .map(|&currency| CurrencyPair::new(base, currency, data_source))
        .collect()
}
