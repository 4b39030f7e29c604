//! Integration tests for the exchange-rate service
//!
//! Covers catalog discovery, reconciliation and conversion end to end.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use rusty_fxrates::data::fx::{build_table, ConversionMethod};
use rusty_fxrates::data::sources::{
    InMemoryPriceSource, PriceMatrix, StaticActivityCalendar, StaticCurrencyDirectory,
    StaticPropertyStore,
};
use rusty_fxrates::error::FxError;
use rusty_fxrates::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn day(d: u32) -> Day {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

const EURUSD: [f64; 5] = [1.10, 1.11, 1.12, 1.13, 1.14];
const EURGBP: [f64; 5] = [0.860, 0.861, 0.862, 0.863, 0.864];

/// Five days of EURUSD and EURGBP
fn eur_source() -> InMemoryPriceSource {
    let mut source = InMemoryPriceSource::new();
    for (i, (usd, gbp)) in EURUSD.iter().zip(EURGBP.iter()).enumerate() {
        let d = day(i as u32 + 1);
        source = source.with_price("EURUSD", d, *usd).with_price("EURGBP", d, *gbp);
    }
    source
}

fn eur_service(source: Arc<InMemoryPriceSource>, today: Day) -> ExchangeRateService {
    let config = FxConfig::default()
        .with_base_currency(Currency::EUR)
        .with_fx_start_date(day(1));
    ExchangeRateService::new(config, source)
        .with_currency_directory(Arc::new(
            StaticCurrencyDirectory::new()
                .with_accounts(&["EUR", "USD"])
                .with_settings(&["GBP"]),
        ))
        .with_clock(Arc::new(FixedClock::new(today)))
}

#[tokio::test]
async fn test_eur_base_cross_conversion() {
    let service = eur_service(Arc::new(eur_source()), day(8));
    service.initialize().await.unwrap();

    assert_eq!(
        service.currencies(),
        vec![Currency::EUR, Currency::GBP, Currency::USD]
    );
    let symbols: Vec<String> = service.currency_pairs().iter().map(|p| p.symbol()).collect();
    assert_eq!(symbols, vec!["EURGBP", "EURUSD"]);

    let conversion = service
        .try_convert(100.0, Currency::USD, Currency::GBP, day(3))
        .await
        .unwrap();
    assert_relative_eq!(conversion.value, 100.0 / 1.12 * 0.862, max_relative = 1e-12);
    assert_eq!(conversion.method, ConversionMethod::Pivot(Currency::EUR));
    assert_eq!(conversion.resolved_on, day(3));
    assert_eq!(conversion.forward_days, 0);

    // The derived factor is cached in both directions
    let table = service.table();
    assert!(table.contains(Currency::USD, Currency::GBP, day(3)));
    assert!(table.contains(Currency::GBP, Currency::USD, day(3)));
    assert!(table.inverse_violations(1e-12).is_empty());

    let gbp = service.convert(100.0, Currency::USD, Currency::GBP, day(3)).await;
    assert_relative_eq!(gbp, 100.0 / 1.12 * 0.862, max_relative = 1e-12);
    let cached = service
        .try_convert(100.0, Currency::USD, Currency::GBP, day(3))
        .await
        .unwrap();
    assert_eq!(cached.method, ConversionMethod::Exact);
}

#[tokio::test]
async fn test_synthesized_inverse_directions() {
    let service = eur_service(Arc::new(eur_source()), day(8));
    service.initialize().await.unwrap();

    let table = service.table();
    for i in 0..5 {
        let d = day(i + 1);
        let forward = table.exact(Currency::EUR, Currency::USD, d).unwrap();
        let reverse = table.exact(Currency::USD, Currency::EUR, d).unwrap();
        assert_relative_eq!(forward * reverse, 1.0, max_relative = 1e-12);
    }
    assert!(table.inverse_violations(1e-12).is_empty());
}

#[tokio::test]
async fn test_identity_conversion() {
    let service = eur_service(Arc::new(eur_source()), day(8));
    service.initialize().await.unwrap();

    let value = service.convert(42.5, Currency::GBP, Currency::GBP, day(30)).await;
    assert_eq!(value, 42.5);

    let conversion = service
        .try_convert(42.5, Currency::JPY, Currency::JPY, day(2))
        .await
        .unwrap();
    assert_eq!(conversion.method, ConversionMethod::Identity);
    assert_eq!(conversion.factor, 1.0);
}

#[tokio::test]
async fn test_gap_resolved_by_forward_search() {
    let source = eur_source().with_missing_price("EURGBP", day(6));
    let service = eur_service(Arc::new(source), day(8));
    service.initialize().await.unwrap();

    // Neither pair has a pivot path on day 6
    assert!(!service.table().contains(Currency::EUR, Currency::GBP, day(6)));
    assert!(service.stats().unresolved > 0);

    let conversion = service
        .try_convert(100.0, Currency::EUR, Currency::GBP, day(4))
        .await
        .unwrap();
    assert_eq!(conversion.forward_days, 0);

    // Day 6 is listed without a price; days 7 and 8 have nothing at all
    let err = service
        .try_convert(100.0, Currency::EUR, Currency::GBP, day(6))
        .await
        .unwrap_err();
    assert!(matches!(err, FxError::UnresolvedConversion { .. }));
}

#[tokio::test]
async fn test_forward_search_finds_next_day() {
    let service = eur_service(Arc::new(eur_source()), day(8));
    service.load_range(day(3), day(5)).await.unwrap();
    assert_eq!(service.loaded_range(), Some((day(3), day(5))));

    let conversion = service
        .try_convert(100.0, Currency::EUR, Currency::USD, day(1))
        .await
        .unwrap();
    assert_eq!(conversion.resolved_on, day(3));
    assert_eq!(conversion.forward_days, 2);
    assert_relative_eq!(conversion.value, 112.0, max_relative = 1e-12);
}

#[tokio::test]
async fn test_forward_search_is_bounded() {
    let today = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let service = eur_service(Arc::new(eur_source()), today);
    service.initialize().await.unwrap();

    let err = service
        .try_convert(100.0, Currency::EUR, Currency::USD, day(6))
        .await
        .unwrap_err();
    match err {
        FxError::UnresolvedConversion {
            symbol,
            date,
            max_days,
        } => {
            assert_eq!(symbol, "EURUSD");
            assert_eq!(date, day(6));
            assert_eq!(max_days, 7);
        }
        other => panic!("unexpected error: {}", other),
    }

    // The infallible variant hands back the unconverted value
    let value = service.convert(100.0, Currency::EUR, Currency::USD, day(6)).await;
    assert_eq!(value, 100.0);
}

#[tokio::test]
async fn test_forward_search_stops_at_today() {
    let service = eur_service(Arc::new(eur_source()), day(7));
    service.initialize().await.unwrap();

    let err = service
        .try_convert(100.0, Currency::EUR, Currency::USD, day(6))
        .await
        .unwrap_err();
    assert!(matches!(err, FxError::UnresolvedConversion { .. }));

    let value = service.convert(100.0, Currency::EUR, Currency::USD, day(5)).await;
    assert_relative_eq!(value, 114.0, max_relative = 1e-12);
}

#[tokio::test]
async fn test_latest_quote_fallback() {
    let source = Arc::new(eur_source().with_latest("EURCHF", 0.95, Currency::CHF));
    let service = eur_service(source.clone(), day(8)).with_property_store(Arc::new(
        StaticPropertyStore::new(Some(vec!["CHF".to_string()])),
    ));
    service.initialize().await.unwrap();

    assert_eq!(source.latest_calls(), 1);
    assert_eq!(service.stats().latest_fallbacks, 1);

    // Seeded as yesterday's price
    let chf = service.convert(100.0, Currency::EUR, Currency::CHF, day(7)).await;
    assert_relative_eq!(chf, 95.0, max_relative = 1e-12);
}

#[tokio::test]
async fn test_first_relevant_date_from_activities() {
    let service = eur_service(Arc::new(eur_source()), day(8)).with_activity_calendar(Arc::new(
        StaticActivityCalendar::new(vec![day(3), day(20)])
            .with_clock(Arc::new(FixedClock::new(day(8)))),
    ));
    service.initialize().await.unwrap();
    assert_eq!(service.loaded_range(), Some((day(3), day(8))));

    service.reload_from(day(4)).await.unwrap();
    assert_eq!(service.loaded_range(), Some((day(4), day(8))));
    assert_eq!(service.initializations(), 2);
}

#[tokio::test]
async fn test_portfolio_value() {
    let service = eur_service(Arc::new(eur_source()), day(8));
    service.initialize().await.unwrap();

    let positions = vec![(100.0, Currency::EUR), (112.0, Currency::USD)];
    let converted = service.convert_amounts(&positions, Currency::EUR, day(3)).await;
    assert_eq!(converted.len(), 2);
    assert_relative_eq!(converted[1], 100.0, max_relative = 1e-12);

    let total = service.portfolio_value(&positions, Currency::EUR, day(3)).await;
    assert_relative_eq!(total, 200.0, max_relative = 1e-12);
}

#[tokio::test]
async fn test_self_healing_after_failed_load() {
    let source = Arc::new(eur_source());
    source.set_failing(true);
    let service = eur_service(source.clone(), day(8));

    service.initialize().await.unwrap();
    assert!(service.table().is_empty());

    // Empty table triggers a reload, which still fails
    let value = service.convert(100.0, Currency::EUR, Currency::USD, day(3)).await;
    assert_eq!(value, 100.0);
    assert_eq!(source.historical_calls(), 2);

    source.set_failing(false);
    let value = service.convert(100.0, Currency::EUR, Currency::USD, day(3)).await;
    assert_relative_eq!(value, 112.0, max_relative = 1e-12);
    assert_eq!(source.historical_calls(), 3);
    assert_eq!(service.initializations(), 3);

    // Loaded now, no further reloads
    service.convert(1.0, Currency::EUR, Currency::USD, day(3)).await;
    assert_eq!(source.historical_calls(), 3);
}

#[tokio::test]
async fn test_concurrent_conversions_share_one_reload() {
    let source = Arc::new(eur_source().with_delay(Duration::from_millis(50)));
    let service = eur_service(source.clone(), day(8));

    let (a, b, c, d) = tokio::join!(
        service.convert(100.0, Currency::EUR, Currency::USD, day(1)),
        service.convert(100.0, Currency::EUR, Currency::USD, day(2)),
        service.convert(100.0, Currency::USD, Currency::GBP, day(3)),
        service.convert(100.0, Currency::GBP, Currency::EUR, day(4)),
    );

    assert_relative_eq!(a, 110.0, max_relative = 1e-12);
    assert_relative_eq!(b, 111.0, max_relative = 1e-12);
    assert_relative_eq!(c, 100.0 / 1.12 * 0.862, max_relative = 1e-12);
    assert_relative_eq!(d, 100.0 / 0.863, max_relative = 1e-12);
    assert_eq!(source.historical_calls(), 1);
    assert_eq!(service.initializations(), 1);
}

#[test]
fn test_gap_triangulated_through_pivot() {
    let mut prices = PriceMatrix::new();
    let mut put = |symbol: &str, d: u32, price: Option<f64>| {
        let market_price = match price {
            Some(p) => MarketPrice::new(p),
            None => MarketPrice::missing(),
        };
        prices
            .entry(symbol.to_string())
            .or_default()
            .insert(day(d), market_price);
    };
    put("USDEUR", 1, Some(0.90));
    put("USDEUR", 2, Some(0.91));
    put("USDGBP", 1, Some(0.80));
    put("USDGBP", 2, Some(0.79));
    put("EURGBP", 1, Some(0.88));
    put("EURGBP", 2, None);

    let outcome = build_table(&prices, Currency::USD);

    let factor = outcome.table.exact(Currency::EUR, Currency::GBP, day(2)).unwrap();
    assert_relative_eq!(factor, 0.79 / 0.91, max_relative = 1e-12);
    let reverse = outcome.table.exact(Currency::GBP, Currency::EUR, day(2)).unwrap();
    assert_relative_eq!(factor * reverse, 1.0, max_relative = 1e-12);

    // Direct quote on day 1 is kept as is
    assert_eq!(
        outcome.table.exact(Currency::EUR, Currency::GBP, day(1)),
        Some(0.88)
    );
    assert_eq!(outcome.stats.missing_pairs, 2);
    assert_eq!(outcome.stats.triangulated, 1);
    assert_eq!(outcome.stats.unresolved, 0);
}
