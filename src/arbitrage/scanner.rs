//! Cross-market scan.
//!
//! Joins the three input tables (spot, binary quotes, vanilla quotes)
//! on normalized keys and runs every joinable pairing through the
//! candidate builder. Binary quotes that cannot be joined are skipped,
//! never fatal; the one hard failure in here is a vanilla row with no
//! resolvable premium while `skip_missing_premium` is off.
//!
//! Output ordering is a contract: `(date, underlying, expiry)`
//! ascending, best edge first within each group.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::arbitrage::strategy::{infer_direction, CandidateBuilder, CandidateConfig};
use crate::types::{
    normalize_underlying, BinaryQuote, DatasetError, OptionType, SpotObservation, TradeCandidate,
    VanillaQuote,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Scan parameters. The serde defaults double as the documented
/// defaults of the `[scan]` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Vanilla contracts per pair.
    #[serde(default = "default_qv")]
    pub qv: f64,
    /// Flat fee in USD per pair, priced into the binary cover.
    #[serde(default)]
    pub fee_usd: f64,
    /// Candidates with an edge below this are discarded.
    #[serde(default)]
    pub min_edge: f64,
    /// Slack admitted on the strike bound; 0 is the strict mode.
    #[serde(default)]
    pub edge_epsilon: f64,
    /// Symmetric exclusion band at both ends of the binary price range.
    #[serde(default)]
    pub pb_clip: f64,
    /// Widest allowed |vanilla expiry - binary expiry|, in days, when no
    /// vanilla matches the binary's expiry exactly. 0 disables the
    /// fallback.
    #[serde(default)]
    pub nearest_expiry_days: i64,
    /// Skip vanilla rows with no resolvable premium instead of treating
    /// them as an input-contract violation.
    #[serde(default)]
    pub skip_missing_premium: bool,
}

fn default_qv() -> f64 {
    1.0
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            qv: 1.0,
            fee_usd: 0.0,
            min_edge: 0.0,
            edge_epsilon: 0.0,
            pb_clip: 0.0,
            nearest_expiry_days: 0,
            skip_missing_premium: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Joins the input tables and collects admissible candidates.
pub struct Scanner {
    builder: CandidateBuilder,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        let builder = CandidateBuilder::new(CandidateConfig {
            qv: config.qv,
            fee_usd: config.fee_usd,
            edge_epsilon: config.edge_epsilon,
            pb_clip: config.pb_clip,
        });
        Self { builder, config }
    }

    /// Scan every binary quote against the vanilla quotes that share
    /// its `(date, underlying)` key and required option type.
    ///
    /// Deterministic: the same inputs produce the same output in the
    /// same order.
    pub fn scan(
        &self,
        spots: &[SpotObservation],
        binaries: &[BinaryQuote],
        vanillas: &[VanillaQuote],
    ) -> Result<Vec<TradeCandidate>, DatasetError> {
        let spot_map = spot_map(spots);

        let mut candidates: Vec<TradeCandidate> = Vec::new();
        let mut skipped_no_spot = 0usize;
        let mut skipped_no_premium = 0usize;

        for binary in binaries {
            let underlying = normalize_underlying(&binary.underlying);
            let Some(&spot) = spot_map.get(&(binary.date, underlying.clone())) else {
                debug!(quote = %binary, "Skipping binary quote: no spot observation");
                skipped_no_spot += 1;
                continue;
            };

            let direction = match infer_direction(spot, binary.strike) {
                Ok(d) => d,
                Err(err) => {
                    warn!(%err, quote = %binary, "Skipping binary quote: cannot infer direction");
                    continue;
                }
            };
            let want = direction.vanilla_type();

            let mut slice: Vec<&VanillaQuote> = vanillas
                .iter()
                .filter(|v| {
                    v.date == binary.date
                        && v.expiry == binary.expiry
                        && v.option_type == want
                        && normalize_underlying(&v.underlying) == underlying
                })
                .collect();

            if slice.is_empty() && self.config.nearest_expiry_days > 0 {
                slice = nearest_expiry_slice(
                    vanillas,
                    binary,
                    &underlying,
                    want,
                    self.config.nearest_expiry_days,
                );
            }

            for vanilla in slice {
                let pv_usd = match resolve_premium(vanilla, spot) {
                    Some(p) => p,
                    None if self.config.skip_missing_premium => {
                        debug!(quote = %vanilla, "Skipping vanilla quote: no premium");
                        skipped_no_premium += 1;
                        continue;
                    }
                    None => {
                        return Err(DatasetError::MissingPremium {
                            date: vanilla.date,
                            underlying: normalize_underlying(&vanilla.underlying),
                            strike: vanilla.strike,
                        });
                    }
                };

                let Some(candidate) = self.builder.build(binary, vanilla, spot, pv_usd) else {
                    continue;
                };
                if candidate.edge < self.config.min_edge {
                    debug!(
                        edge = candidate.edge,
                        min_edge = self.config.min_edge,
                        "Discarding candidate below minimum edge",
                    );
                    continue;
                }
                candidates.push(candidate);
            }
        }

        candidates.sort_by(|a, b| {
            (a.date, &a.underlying, a.expiry)
                .cmp(&(b.date, &b.underlying, b.expiry))
                .then_with(|| b.edge.partial_cmp(&a.edge).unwrap_or(std::cmp::Ordering::Equal))
        });

        info!(
            binaries = binaries.len(),
            vanillas = vanillas.len(),
            candidates = candidates.len(),
            skipped_no_spot,
            skipped_no_premium,
            "Scan complete",
        );
        Ok(candidates)
    }
}

// ---------------------------------------------------------------------------
// Join helpers
// ---------------------------------------------------------------------------

/// Spot lookup keyed by `(date, normalized underlying)`. Later rows
/// win on duplicate keys.
fn spot_map(spots: &[SpotObservation]) -> HashMap<(NaiveDate, String), f64> {
    let mut map = HashMap::new();
    for obs in spots {
        map.insert((obs.date, normalize_underlying(&obs.underlying)), obs.spot);
    }
    map
}

/// USD premium of a vanilla quote: `price_usd` when present, else
/// `price` (underlying units) converted at spot. Non-finite values
/// count as missing.
fn resolve_premium(vanilla: &VanillaQuote, spot: f64) -> Option<f64> {
    if let Some(usd) = vanilla.price_usd.filter(|p| p.is_finite()) {
        return Some(usd);
    }
    vanilla.price.filter(|p| p.is_finite()).map(|units| units * spot)
}

/// Vanilla quotes for the same `(date, underlying, type)` whose expiry
/// lies within `tolerance_days` of the binary's, keeping every quote
/// at the minimum distance (a tie across both sides keeps both).
fn nearest_expiry_slice<'a>(
    vanillas: &'a [VanillaQuote],
    binary: &BinaryQuote,
    underlying: &str,
    want: OptionType,
    tolerance_days: i64,
) -> Vec<&'a VanillaQuote> {
    let in_range: Vec<(&VanillaQuote, i64)> = vanillas
        .iter()
        .filter(|v| {
            v.date == binary.date
                && v.option_type == want
                && normalize_underlying(&v.underlying) == underlying
        })
        .map(|v| (v, (v.expiry - binary.expiry).num_days().abs()))
        .filter(|(_, days)| *days <= tolerance_days)
        .collect();

    let Some(min_days) = in_range.iter().map(|(_, days)| *days).min() else {
        return Vec::new();
    };
    in_range
        .into_iter()
        .filter(|(_, days)| *days == min_days)
        .map(|(v, _)| v)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
