//! STRIKEBOUND command-line entry point.
//!
//! Three subcommands mirror the pipeline stages: `fetch` snapshots
//! venue quotes into the raw tables, `scan` pairs binary quotes with
//! vanilla hedges, `backtest` settles scanned pairings at expiry.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Arg, Command};
use tracing::info;

use strikebound::arbitrage::scanner::Scanner;
use strikebound::backtest::runner::{summarize, Backtester};
use strikebound::config::{Config, FetchConfig};
use strikebound::data::{loaders, reports};
use strikebound::markets::deribit::DeribitClient;
use strikebound::markets::polymarket::PolymarketClient;
use strikebound::markets::RetryPolicy;
use strikebound::types::{normalize_underlying, SpotObservation};

const BANNER: &str = r#"
 ____  _____   ____   ___ _  __  _____  ____    ___  _   _  _   _   ____
/ ___| |_   _||  _ \ |_ _|| |/ /| ____|| __ )  / _ \ | | | || \ | ||  _ \
\___ \   | |  | |_) | | | | ' / |  _|  |  _ \ | | | || | | ||  \| || | | |
 ___) |  | |  |  _ <  | | | . \ | |___ | |_) || |_| || |_| || |\  || |_| |
|____/   |_|  |_| \_\|___||_|\_\|_____||____/  \___/  \___/ |_| \_||____/

  Binary thresholds vs. vanilla strikes, cross-market
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    dotenv::dotenv().ok();

    let matches = Command::new("strikebound")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cross-market scanner pairing prediction-market binaries with vanilla option hedges")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to the TOML configuration file")
                .default_value("config.toml"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("fetch").about("Snapshot venue quotes into the raw data tables"))
        .subcommand(
            Command::new("scan").about("Scan the raw tables for admissible binary/vanilla pairings"),
        )
        .subcommand(
            Command::new("backtest").about("Settle scanned pairings at expiry and report PnL"),
        )
        .get_matches();

    init_logging();
    println!("{BANNER}");

    let config_path = matches.get_one::<String>("config").unwrap();
    let cfg = Config::load(config_path)?;
    info!(config = %config_path, "Configuration loaded");

    match matches.subcommand() {
        Some(("fetch", _)) => run_fetch(&cfg).await,
        Some(("scan", _)) => run_scan(&cfg),
        Some(("backtest", _)) => run_backtest(&cfg),
        _ => unreachable!("subcommand is required"),
    }
}

/// Snapshot both venues into the three raw tables, keyed on today's
/// UTC date and the earliest option expiry far enough out.
async fn run_fetch(cfg: &Config) -> Result<()> {
    let fetch = &cfg.fetch;
    let timeout = Duration::from_secs(fetch.http.timeout_secs);
    let retry = retry_policy(fetch);
    let deribit = DeribitClient::new(timeout, retry)?;
    let mut polymarket = PolymarketClient::new(timeout, retry)?;

    let today = Utc::now().date_naive();
    let min_expiry = today + ChronoDuration::days(fetch.min_days_to_expiry);
    let expiry = deribit
        .next_expiry_on_or_after(&fetch.underlying, min_expiry)
        .await?;
    info!(underlying = %fetch.underlying, %expiry, "Targeting option expiry");

    let spot = deribit.spot_index(&fetch.underlying).await?;
    info!(spot, "Decision-date spot from index");

    let mut spots = if fetch.spot_history_days > 0 {
        deribit
            .spot_vwap_history(
                &fetch.underlying,
                fetch.spot_history_days,
                fetch.vwap_window_minutes,
            )
            .await?
    } else {
        Vec::new()
    };
    // The VWAP window for today may be empty (or history disabled);
    // the scan needs today's row either way.
    if !spots.iter().any(|s| s.date == today) {
        spots.push(SpotObservation {
            date: today,
            underlying: normalize_underlying(&fetch.underlying),
            spot,
        });
    }
    reports::write_spot(&cfg.data.spot_csv, &spots)?;

    let vanillas = deribit
        .vanilla_snapshot(&fetch.underlying, today, expiry, spot, fetch.max_strikes)
        .await?;
    reports::write_vanilla(&cfg.data.vanilla_csv, &vanillas)?;

    let binaries = polymarket
        .threshold_markets_for_expiry(&fetch.underlying, today, expiry, fetch.gamma_page_limit)
        .await?;
    reports::write_binary(&cfg.data.binary_csv, &binaries)?;

    info!(
        spots = spots.len(),
        vanillas = vanillas.len(),
        binaries = binaries.len(),
        "Fetch complete"
    );
    Ok(())
}

/// Scan the raw tables and write the opportunity report.
fn run_scan(cfg: &Config) -> Result<()> {
    let spots = loaders::load_spot(&cfg.data.spot_csv)?;
    let binaries = loaders::load_binary(&cfg.data.binary_csv)?;
    let vanillas = loaders::load_vanilla(&cfg.data.vanilla_csv)?;
    info!(
        spots = spots.len(),
        binaries = binaries.len(),
        vanillas = vanillas.len(),
        "Input tables loaded"
    );

    let scanner = Scanner::new(cfg.scan.clone());
    let candidates = scanner.scan(&spots, &binaries, &vanillas)?;

    let out = Path::new(&cfg.data.reports_dir).join("opportunities.csv");
    reports::write_candidates(&out, &candidates)?;
    info!(candidates = candidates.len(), path = %out.display(), "Scan complete");
    Ok(())
}

/// Settle the scanned opportunities at expiry and write the result
/// table.
fn run_backtest(cfg: &Config) -> Result<()> {
    let opp_path = Path::new(&cfg.data.reports_dir).join("opportunities.csv");
    if !opp_path.exists() {
        anyhow::bail!("{} not found; run the scanner first", opp_path.display());
    }

    let candidates = loaders::load_candidates(&opp_path)?;
    let spots = loaders::load_spot(&cfg.data.spot_csv)?;

    let backtester = Backtester::new(&spots);
    let records = backtester.run(&candidates);

    let out = Path::new(&cfg.data.reports_dir).join("backtest.csv");
    reports::write_backtest(&out, &records)?;

    let summary = summarize(&records);
    info!(%summary, "Backtest complete");
    Ok(())
}

fn retry_policy(fetch: &FetchConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: fetch.http.max_retries,
        base_backoff: Duration::from_millis(fetch.http.backoff_base_ms),
        max_backoff: Duration::from_millis(fetch.http.backoff_max_ms),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strikebound=info"));

    fmt().with_env_filter(env_filter).with_target(true).init();
}
