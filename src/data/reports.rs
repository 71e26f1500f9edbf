//! CSV report writers.
//!
//! Every table is written with an explicit header record so that an
//! empty result still produces a well-formed, loadable file. The
//! header constants are kept in the field order of the record structs;
//! a test pins that correspondence.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::types::{BacktestRecord, BinaryQuote, SpotObservation, TradeCandidate, VanillaQuote};

const SPOT_HEADERS: &[&str] = &["date", "underlying", "spot"];
const BINARY_HEADERS: &[&str] = &["date", "underlying", "expiry", "strike", "price"];
const VANILLA_HEADERS: &[&str] = &[
    "date",
    "underlying",
    "expiry",
    "strike",
    "type",
    "price",
    "price_usd",
];
const CANDIDATE_HEADERS: &[&str] = &[
    "date",
    "underlying",
    "expiry",
    "spot",
    "binary_type",
    "Kb",
    "Pb",
    "vanilla_type",
    "Kv",
    "Pv_usd",
    "Qv",
    "Qb",
    "fee_usd",
    "kv_bound",
    "edge",
];
const BACKTEST_HEADERS: &[&str] = &[
    "date",
    "underlying",
    "expiry",
    "spot_t",
    "S_T",
    "binary_type",
    "Kb",
    "Pb",
    "E",
    "vanilla_type",
    "Kv",
    "Pv_usd",
    "Qv",
    "Qb",
    "pnl",
    "cum_pnl",
    "edge",
];

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write the scanner's opportunity table.
pub fn write_candidates(path: impl AsRef<Path>, rows: &[TradeCandidate]) -> Result<()> {
    write_table(path.as_ref(), CANDIDATE_HEADERS, rows)?;
    info!(rows = rows.len(), path = %path.as_ref().display(), "Wrote opportunities report");
    Ok(())
}

/// Write the backtest result table.
pub fn write_backtest(path: impl AsRef<Path>, rows: &[BacktestRecord]) -> Result<()> {
    write_table(path.as_ref(), BACKTEST_HEADERS, rows)?;
    info!(rows = rows.len(), path = %path.as_ref().display(), "Wrote backtest report");
    Ok(())
}

/// Write a fetched spot table in the input-contract layout.
pub fn write_spot(path: impl AsRef<Path>, rows: &[SpotObservation]) -> Result<()> {
    write_table(path.as_ref(), SPOT_HEADERS, rows)?;
    info!(rows = rows.len(), path = %path.as_ref().display(), "Wrote spot table");
    Ok(())
}

/// Write a fetched binary quote table in the input-contract layout.
pub fn write_binary(path: impl AsRef<Path>, rows: &[BinaryQuote]) -> Result<()> {
    write_table(path.as_ref(), BINARY_HEADERS, rows)?;
    info!(rows = rows.len(), path = %path.as_ref().display(), "Wrote binary table");
    Ok(())
}

/// Write a fetched vanilla quote table in the input-contract layout.
pub fn write_vanilla(path: impl AsRef<Path>, rows: &[VanillaQuote]) -> Result<()> {
    write_table(path.as_ref(), VANILLA_HEADERS, rows)?;
    info!(rows = rows.len(), path = %path.as_ref().display(), "Wrote vanilla table");
    Ok(())
}

fn write_table<T: serde::Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;
    writer
        .write_record(headers)
        .with_context(|| format!("Failed to write header to {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
