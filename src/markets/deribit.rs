//! Deribit integration.
//!
//! Public (unauthenticated) market-data endpoints only:
//! - index price, used as the USD spot proxy for a decision date
//! - option chain discovery and per-instrument tickers
//! - USDC spot-pair trade history, for the daily VWAP spot series
//!
//! API: https://www.deribit.com/api/v2

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::markets::{get_json, RetryPolicy};
use crate::types::{normalize_underlying, OptionType, SpotObservation, VanillaQuote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const DERIBIT_API_URL: &str = "https://www.deribit.com/api/v2";

/// Parallel ticker fetches per chain snapshot.
const TICKER_CONCURRENCY: usize = 8;

/// Page size for trade-history pagination.
const TRADES_PAGE_SIZE: u32 = 1000;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct Instrument {
    #[serde(default)]
    pub instrument_name: String,
    #[serde(default)]
    pub strike: Option<f64>,
    /// "call" or "put" for options.
    #[serde(default)]
    pub option_type: Option<String>,
    /// Expiration in epoch milliseconds.
    #[serde(default)]
    pub expiration_timestamp: Option<i64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Ticker {
    #[serde(default)]
    pub best_bid_price: Option<f64>,
    #[serde(default)]
    pub best_ask_price: Option<f64>,
    #[serde(default)]
    pub mark_price: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Trade {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub price: f64,
    /// Traded base amount (BTC/ETH).
    #[serde(default)]
    pub amount: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct DeribitClient {
    http: Client,
    retry: RetryPolicy,
}

impl DeribitClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("strikebound/0.1.0")
            .build()
            .context("Failed to build Deribit HTTP client")?;
        Ok(Self { http, retry })
    }

    /// Call a public JSON-RPC method and unwrap its envelope.
    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let url = format!("{DERIBIT_API_URL}/{method}");
        let mut envelope = get_json(&self.http, &url, params, self.retry).await?;
        if let Some(error) = envelope.get("error") {
            if !error.is_null() {
                anyhow::bail!("Deribit error from {method}: {error}");
            }
        }
        envelope
            .get_mut("result")
            .map(serde_json::Value::take)
            .with_context(|| format!("Deribit response from {method} has no result"))
    }

    /// Index price in USD for the given underlying.
    pub async fn spot_index(&self, underlying: &str) -> Result<f64> {
        let index_name = format!("{}_usd", underlying.trim().to_lowercase());
        let result = self
            .call("public/get_index_price", &[("index_name", index_name)])
            .await?;
        let spot = result
            .get("index_price")
            .and_then(serde_json::Value::as_f64)
            .context("Deribit index response has no index_price")?;
        debug!(underlying, spot, "Fetched spot index");
        Ok(spot)
    }

    /// All live option instruments for the underlying.
    async fn option_instruments(&self, underlying: &str) -> Result<Vec<Instrument>> {
        let result = self
            .call(
                "public/get_instruments",
                &[
                    ("currency", normalize_underlying(underlying)),
                    ("kind", "option".to_string()),
                    ("expired", "false".to_string()),
                ],
            )
            .await?;
        serde_json::from_value(result).context("Failed to parse Deribit instruments")
    }

    /// Distinct expiry dates on the live option chain, ascending.
    pub async fn option_expiries(&self, underlying: &str) -> Result<Vec<NaiveDate>> {
        let instruments = self.option_instruments(underlying).await?;
        let mut expiries: Vec<NaiveDate> = instruments
            .iter()
            .filter_map(|ins| ins.expiration_timestamp.and_then(expiry_date))
            .collect();
        expiries.sort_unstable();
        expiries.dedup();
        Ok(expiries)
    }

    /// Earliest listed expiry on or after `min_date`. When every
    /// listed expiry is earlier, the last one is returned so a fetch
    /// still targets a real chain.
    pub async fn next_expiry_on_or_after(
        &self,
        underlying: &str,
        min_date: NaiveDate,
    ) -> Result<NaiveDate> {
        let expiries = self.option_expiries(underlying).await?;
        match expiries.iter().find(|e| **e >= min_date) {
            Some(expiry) => Ok(*expiry),
            None => expiries
                .last()
                .copied()
                .context("Deribit lists no option expiries"),
        }
    }

    async fn ticker(&self, instrument_name: &str) -> Result<Ticker> {
        let result = self
            .call(
                "public/ticker",
                &[("instrument_name", instrument_name.to_string())],
            )
            .await?;
        serde_json::from_value(result).context("Failed to parse Deribit ticker")
    }

    /// Snapshot the option chain for one expiry into vanilla rows.
    ///
    /// Keeps the `max_strikes` instruments nearest the money and
    /// prices each from its ticker: mid of best bid/ask when both
    /// sides are live, else mark price, else the instrument is
    /// dropped. Premiums stay in underlying units (`price`, not
    /// `price_usd`).
    pub async fn vanilla_snapshot(
        &self,
        underlying: &str,
        date: NaiveDate,
        expiry: NaiveDate,
        spot: f64,
        max_strikes: usize,
    ) -> Result<Vec<VanillaQuote>> {
        let instruments = self.option_instruments(underlying).await?;
        let chain = nearest_strikes(&instruments, expiry, spot, max_strikes);
        info!(underlying, %expiry, instruments = chain.len(), "Snapshotting option chain");

        let tickers = stream::iter(chain.iter().map(|ins| self.ticker(&ins.instrument_name)))
            .buffered(TICKER_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let normalized = normalize_underlying(underlying);
        let mut rows = Vec::with_capacity(chain.len());
        for (ins, ticker) in chain.iter().zip(tickers) {
            let ticker = match ticker {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        instrument = %ins.instrument_name,
                        error = %e,
                        "Ticker fetch failed; dropping instrument"
                    );
                    continue;
                }
            };
            let Some(price) = premium_from_ticker(&ticker) else {
                debug!(instrument = %ins.instrument_name, "No usable premium on ticker");
                continue;
            };
            let Some(option_type) = ins
                .option_type
                .as_deref()
                .and_then(|t| t.parse::<OptionType>().ok())
            else {
                continue;
            };
            let Some(strike) = ins.strike else { continue };
            rows.push(VanillaQuote {
                date,
                underlying: normalized.clone(),
                expiry,
                strike,
                option_type,
                price: Some(price),
                price_usd: None,
            });
        }
        info!(underlying, %expiry, rows = rows.len(), "Vanilla snapshot complete");
        Ok(rows)
    }

    /// Daily spot series from the USDC spot pair: one VWAP per day
    /// over a window centred on 08:00 UTC, covering the last `days`
    /// days up to and including today. Days with no trades in the
    /// window are skipped.
    pub async fn spot_vwap_history(
        &self,
        underlying: &str,
        days: i64,
        window_minutes: i64,
    ) -> Result<Vec<SpotObservation>> {
        let normalized = normalize_underlying(underlying);
        let instrument = format!("{normalized}_USDC");
        let end_day = Utc::now().date_naive();
        let start_day = end_day - ChronoDuration::days(days);
        let half = ChronoDuration::seconds(window_minutes * 30);

        let mut rows = Vec::new();
        let mut day = start_day;
        while day <= end_day {
            let center = day.and_hms_opt(8, 0, 0).unwrap().and_utc();
            let start_ms = (center - half).timestamp_millis();
            let end_ms = (center + half).timestamp_millis();

            let trades = self.trades_between(&instrument, start_ms, end_ms).await?;
            match vwap(&trades) {
                Some(price) => rows.push(SpotObservation {
                    date: day,
                    underlying: normalized.clone(),
                    spot: (price * 100.0).round() / 100.0,
                }),
                None => {
                    warn!(instrument = %instrument, date = %day, "No trades in VWAP window; skipping day");
                }
            }
            day = day + ChronoDuration::days(1);
        }
        info!(instrument = %instrument, rows = rows.len(), "Built spot VWAP history");
        Ok(rows)
    }

    /// All trades in `[start_ms, end_ms)`. The endpoint returns pages
    /// newest-first, so pagination walks the window end backwards
    /// until the batch reaches the window start.
    async fn trades_between(
        &self,
        instrument: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Trade>> {
        let mut all: Vec<Trade> = Vec::new();
        let mut cursor_end = end_ms;

        loop {
            let mut result = self
                .call(
                    "public/get_last_trades_by_instrument",
                    &[
                        ("instrument_name", instrument.to_string()),
                        ("start_timestamp", start_ms.to_string()),
                        ("end_timestamp", cursor_end.to_string()),
                        ("count", TRADES_PAGE_SIZE.to_string()),
                        ("include_old", "true".to_string()),
                        ("sorting", "desc".to_string()),
                    ],
                )
                .await?;

            // The result is normally {"trades": [...], "has_more": ...}
            // but some deployments return the bare array.
            let trades_value = if result.is_array() {
                result
            } else {
                result
                    .get_mut("trades")
                    .map(serde_json::Value::take)
                    .unwrap_or(serde_json::Value::Null)
            };
            let batch: Vec<Trade> = if trades_value.is_null() {
                Vec::new()
            } else {
                serde_json::from_value(trades_value).context("Failed to parse Deribit trades")?
            };
            if batch.is_empty() {
                break;
            }

            let oldest = match batch.last() {
                Some(t) => t.timestamp,
                None => break,
            };
            all.extend(batch);
            // The cursor must strictly decrease; a page of identical
            // timestamps cannot advance it.
            if oldest <= start_ms || oldest >= cursor_end {
                break;
            }
            cursor_end = oldest;
        }

        all.retain(|t| t.timestamp >= start_ms && t.timestamp < end_ms);
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// UTC date of an epoch-millisecond expiration timestamp.
fn expiry_date(ms: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Premium in underlying units: mid when both book sides are live,
/// else mark price, else nothing.
fn premium_from_ticker(ticker: &Ticker) -> Option<f64> {
    if let (Some(bid), Some(ask)) = (ticker.best_bid_price, ticker.best_ask_price) {
        if bid > 0.0 && ask > 0.0 {
            return Some((bid + ask) / 2.0);
        }
    }
    ticker.mark_price
}

/// Volume-weighted average price over a batch of trades.
fn vwap(trades: &[Trade]) -> Option<f64> {
    let mut num = 0.0;
    let mut den = 0.0;
    for t in trades {
        num += t.price * t.amount;
        den += t.amount;
    }
    if den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

/// Filter the chain to one expiry and keep the `max_strikes`
/// instruments nearest the money.
fn nearest_strikes(
    instruments: &[Instrument],
    expiry: NaiveDate,
    spot: f64,
    max_strikes: usize,
) -> Vec<&Instrument> {
    let mut chain: Vec<&Instrument> = instruments
        .iter()
        .filter(|ins| {
            ins.strike.is_some() && ins.expiration_timestamp.and_then(expiry_date) == Some(expiry)
        })
        .collect();
    chain.sort_by(|a, b| {
        let da = (a.strike.unwrap_or(f64::MAX) - spot).abs();
        let db = (b.strike.unwrap_or(f64::MAX) - spot).abs();
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });
    chain.truncate(max_strikes);
    chain
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
