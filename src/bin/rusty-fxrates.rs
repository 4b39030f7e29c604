//! rusty-fxrates CLI - inspect reconciled FX tables and convert amounts
//!
//! Prices are read from a CSV file with `date,symbol,price` columns.
//!
//! ## Example Usage
//!
//! ```bash
//! # Convert 100 USD to GBP on a given day
//! rusty-fxrates convert 100 USD GBP --date 2024-01-03 --prices fx.csv
//!
//! # Dump the reconciled table as JSON
//! rusty-fxrates table --prices fx.csv --json
//!
//! # List the catalog currencies
//! rusty-fxrates currencies --prices fx.csv --currencies EUR,GBP
//! ```

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rusty_fxrates::calendar::{format_date, parse_date, FixedClock};
use rusty_fxrates::config::FxConfig;
use rusty_fxrates::currency::Currency;
use rusty_fxrates::data::fx::ConversionMethod;
use rusty_fxrates::data::sources::{CsvPriceSource, StaticPropertyStore};
use rusty_fxrates::service::ExchangeRateService;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// rusty-fxrates: Exchange-rate reconciliation engine
#[derive(Parser)]
#[command(name = "rusty-fxrates")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "Gap-filled FX tables and point-in-time currency conversion", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an amount between two currencies
    Convert {
        /// Amount to convert
        #[arg(value_name = "AMOUNT", allow_negative_numbers = true)]
        amount: f64,

        /// Source currency code (case-sensitive)
        #[arg(value_name = "FROM")]
        from: String,

        /// Target currency code
        #[arg(value_name = "TO")]
        to: String,

        /// Conversion date (YYYY-MM-DD, default: today)
        #[arg(short = 'd', long)]
        date: Option<String>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show the reconciled rate table
    Table {
        /// Only show rows for this symbol (e.g. EURUSD)
        #[arg(short = 's', long)]
        symbol: Option<String>,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// List the currencies in the catalog
    Currencies {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// CSV file with date,symbol,price rows
    #[arg(short = 'p', long)]
    prices: PathBuf,

    /// Catalog currencies (default: every currency in the price file)
    #[arg(long, value_delimiter = ',')]
    currencies: Option<Vec<String>>,

    /// Treat this day as today (YYYY-MM-DD)
    #[arg(long)]
    today: Option<String>,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FxConfig> {
    if let Some(config_path) = path {
        return FxConfig::load(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()));
    }

    if let Some(home) = dirs::home_dir() {
        let default_config = home.join(".rusty-fxrates").join("config.toml");
        if default_config.exists() {
            match FxConfig::load(&default_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    eprintln!("{} Ignoring {}: {}", "Warning:".yellow(), default_config.display(), e);
                }
            }
        }
    }

    Ok(FxConfig::default())
}

async fn build_service(config: FxConfig, source: &SourceArgs) -> anyhow::Result<ExchangeRateService> {
    let prices = CsvPriceSource::from_path(&source.prices)
        .with_context(|| format!("Failed to read prices from {}", source.prices.display()))?;

    let catalog = match &source.currencies {
        Some(codes) => codes.clone(),
        None => prices
            .currencies()
            .iter()
            .map(|c| c.code().to_string())
            .collect(),
    };

    let mut service = ExchangeRateService::new(config, Arc::new(prices))
        .with_property_store(Arc::new(StaticPropertyStore::new(Some(catalog))));
    if let Some(today) = &source.today {
        let today = parse_date(today).context("Invalid --today")?;
        service = service.with_clock(Arc::new(FixedClock::new(today)));
    }

    service
        .initialize()
        .await
        .context("Failed to build the rate table")?;
    Ok(service)
}

fn parse_currency(code: &str) -> anyhow::Result<Currency> {
    code.parse::<Currency>()
        .with_context(|| format!("Invalid currency code '{}'", code))
}

async fn run_convert(
    service: &ExchangeRateService,
    amount: f64,
    from: &str,
    to: &str,
    date: Option<&str>,
    verbose: bool,
) -> anyhow::Result<()> {
    let from = parse_currency(from)?;
    let to = parse_currency(to)?;
    let day = match date {
        Some(d) => parse_date(d).context("Invalid --date")?,
        None => service.today(),
    };

    match service.try_convert(amount, from, to, day).await {
        Ok(conversion) => {
            println!(
                "{} {} = {} {}",
                amount,
                from,
                format!("{:.6}", conversion.value).green().bold(),
                to
            );
            if verbose {
                let method = match conversion.method {
                    ConversionMethod::Identity => "identity".to_string(),
                    ConversionMethod::Exact => "exact".to_string(),
                    ConversionMethod::Pivot(pivot) => format!("via {}", pivot),
                };
                println!(
                    "  factor {} on {} ({}, {} day(s) forward)",
                    conversion.factor,
                    format_date(conversion.resolved_on),
                    method,
                    conversion.forward_days
                );
            }
        }
        Err(e) => {
            eprintln!("{} {}", "Warning:".yellow(), e);
            println!("{} {} = {} {}", amount, from, format!("{}", amount).red(), from);
        }
    }
    Ok(())
}

fn run_table(service: &ExchangeRateService, symbol: Option<&str>, json: bool, verbose: bool) -> anyhow::Result<()> {
    let mut rows = service.observations();
    if let Some(symbol) = symbol {
        rows.retain(|row| row.symbol == symbol);
    }
    rows.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.date.cmp(&b.date)));

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("{}", "No rates found".yellow());
        return Ok(());
    }

    println!("{}", format!("{:<8} {:<12} {:>14}", "SYMBOL", "DATE", "FACTOR").bold());
    for row in &rows {
        println!("{:<8} {:<12} {:>14.6}", row.symbol.cyan(), row.date_string(), row.factor);
    }

    if verbose {
        let stats = service.stats();
        println!();
        println!("Requested pairs:    {}", stats.requested_pairs);
        println!("Returned symbols:   {}", stats.returned_symbols);
        println!("Latest fallbacks:   {}", stats.latest_fallbacks);
        println!("Missing pairs:      {}", stats.missing_pairs);
        println!("Triangulated:       {}", stats.triangulated);
        println!("Unresolved:         {}", stats.unresolved);
    }
    Ok(())
}

fn run_currencies(service: &ExchangeRateService, verbose: bool) {
    let base = service.config().base_currency;
    for currency in service.currencies() {
        if currency == base {
            println!("{} {}", currency.to_string().green().bold(), "(base)".dimmed());
        } else {
            println!("{}", currency);
        }
    }
    if verbose {
        for pair in service.currency_pairs() {
            println!("  {}", pair.symbol().dimmed());
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    if cli.verbose {
        println!(
            "{} v{}",
            "rusty-fxrates".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "Base: {}  Pivot: {}  Start: {}",
            config.base_currency,
            config.pivot_currency,
            format_date(config.fx_start_date).dimmed()
        );
    }

    match cli.command {
        Commands::Convert {
            amount,
            from,
            to,
            date,
            source,
        } => {
            let service = build_service(config, &source).await?;
            run_convert(&service, amount, &from, &to, date.as_deref(), cli.verbose).await
        }
        Commands::Table {
            symbol,
            json,
            source,
        } => {
            let service = build_service(config, &source).await?;
            run_table(&service, symbol.as_deref(), json, cli.verbose)
        }
        Commands::Currencies { source } => {
            if source.currencies.as_ref().is_some_and(|c| c.is_empty()) {
                bail!("--currencies needs at least one code");
            }
            let service = build_service(config, &source).await?;
            run_currencies(&service, cli.verbose);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
