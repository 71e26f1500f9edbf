//! Hold-to-expiry backtest over scanned candidates.
//!
//! Replays each candidate against the realized spot at its expiry.
//! True prediction-market resolutions are not available, so the binary
//! leg settles by a proxy rule from terminal spot against the binary
//! strike. Candidates whose expiry has no spot observation cannot be
//! evaluated and are skipped.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::arbitrage::payoffs;
use crate::types::{
    normalize_underlying, BacktestRecord, OptionType, PairDirection, SpotObservation,
    TradeCandidate,
};

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Proxy settlement of the binary leg from terminal spot against the
/// binary strike: a call pays iff `S_T >= Kb`, a put pays iff `S_T < Kb`.
pub fn binary_outcome(binary_type: OptionType, s_t: f64, kb: f64) -> u8 {
    let paid = match binary_type {
        OptionType::Call => s_t >= kb,
        OptionType::Put => s_t < kb,
    };
    u8::from(paid)
}

// ---------------------------------------------------------------------------
// Backtester
// ---------------------------------------------------------------------------

/// Settles candidates against a realized spot history.
pub struct Backtester {
    /// Spot keyed by `(date, normalized underlying)`; later rows win
    /// on duplicates, matching the scanner's join.
    settlement: HashMap<(NaiveDate, String), f64>,
}

impl Backtester {
    pub fn new(spots: &[SpotObservation]) -> Self {
        let mut settlement = HashMap::new();
        for obs in spots {
            settlement.insert((obs.date, normalize_underlying(&obs.underlying)), obs.spot);
        }
        Self { settlement }
    }

    /// Replay candidates in input order, accumulating `cum_pnl` as
    /// each one settles. The returned records are sorted by
    /// `(date, underlying, expiry)` ascending; accumulation order is
    /// the caller's input order, which for scanner output is already
    /// that sort order.
    pub fn run(&self, candidates: &[TradeCandidate]) -> Vec<BacktestRecord> {
        let mut records: Vec<BacktestRecord> = Vec::new();
        let mut cum = 0.0;
        let mut skipped_no_settlement = 0usize;

        for cand in candidates {
            let underlying = normalize_underlying(&cand.underlying);
            let Some(&s_t) = self.settlement.get(&(cand.expiry, underlying.clone())) else {
                debug!(candidate = %cand, "Skipping candidate: no spot observation at expiry");
                skipped_no_settlement += 1;
                continue;
            };

            let outcome = binary_outcome(cand.binary_type, s_t, cand.kb);

            let settled = match cand.direction() {
                Some(PairDirection::BinaryPutVanillaCall) => payoffs::long_call_binary_put(
                    s_t, cand.kv, cand.pv_usd, cand.qv, cand.pb, cand.qb, outcome,
                ),
                Some(PairDirection::BinaryCallVanillaPut) => payoffs::long_put_binary_call(
                    s_t, cand.kv, cand.pv_usd, cand.qv, cand.pb, cand.qb, outcome,
                ),
                None => {
                    warn!(
                        binary_type = %cand.binary_type,
                        vanilla_type = %cand.vanilla_type,
                        "Skipping candidate: leg types are not an admissible pairing",
                    );
                    continue;
                }
            };

            let pnl = match settled {
                Ok(p) => p,
                Err(err) => {
                    warn!(%err, candidate = %cand, "Skipping candidate: settlement rejected");
                    continue;
                }
            };

            cum += pnl;
            records.push(BacktestRecord {
                date: cand.date,
                underlying,
                expiry: cand.expiry,
                spot_t: cand.spot,
                s_t,
                binary_type: cand.binary_type,
                kb: cand.kb,
                pb: cand.pb,
                outcome,
                vanilla_type: cand.vanilla_type,
                kv: cand.kv,
                pv_usd: cand.pv_usd,
                qv: cand.qv,
                qb: cand.qb,
                pnl,
                cum_pnl: cum,
                edge: cand.edge,
            });
        }

        records.sort_by(|a, b| {
            (a.date, &a.underlying, a.expiry).cmp(&(b.date, &b.underlying, b.expiry))
        });

        info!(
            candidates = candidates.len(),
            evaluated = records.len(),
            skipped_no_settlement,
            "Backtest complete",
        );
        records
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Aggregate statistics over one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSummary {
    pub trades: usize,
    /// Trades with strictly positive P&L.
    pub wins: usize,
    /// Trades with strictly negative P&L.
    pub losses: usize,
    pub total_pnl: f64,
    pub final_cum_pnl: f64,
}

impl BacktestSummary {
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }
}

impl fmt::Display for BacktestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trades={} (W{}/L{}) win_rate={:.1}% total_pnl=${:.2} final_cum=${:.2}",
            self.trades,
            self.wins,
            self.losses,
            self.win_rate() * 100.0,
            self.total_pnl,
            self.final_cum_pnl,
        )
    }
}

pub fn summarize(records: &[BacktestRecord]) -> BacktestSummary {
    BacktestSummary {
        trades: records.len(),
        wins: records.iter().filter(|r| r.pnl > 0.0).count(),
        losses: records.iter().filter(|r| r.pnl < 0.0).count(),
        total_pnl: records.iter().map(|r| r.pnl).sum(),
        final_cum_pnl: records.last().map(|r| r.cum_pnl).unwrap_or(0.0),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
