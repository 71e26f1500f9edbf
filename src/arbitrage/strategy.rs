//! Candidate admissibility.
//!
//! Decides, for one binary/vanilla pairing, whether the vanilla strike
//! clears the no-arbitrage bound, and constructs the immutable
//! [`TradeCandidate`] when it does. Rejections are `None`, never
//! errors: a pair that fails here is simply not an opportunity.

use tracing::debug;

use crate::arbitrage::conditions;
use crate::types::{
    normalize_underlying, BinaryQuote, DomainError, PairDirection, TradeCandidate, VanillaQuote,
};

/// Direction used when the binary strike sits exactly at spot. The
/// at-the-money case intentionally shares the above-spot branch.
pub const AT_THE_MONEY_DIRECTION: PairDirection = PairDirection::BinaryCallVanillaPut;

/// Infer the pairing direction from the binary strike's position
/// relative to spot: a strike below spot pairs a binary put with a
/// vanilla call, a strike above pairs a binary call with a vanilla
/// put, and the tie resolves to [`AT_THE_MONEY_DIRECTION`].
pub fn infer_direction(spot: f64, kb: f64) -> Result<PairDirection, DomainError> {
    if spot.is_nan() || spot <= 0.0 {
        return Err(DomainError::Spot(spot));
    }
    Ok(if kb < spot {
        PairDirection::BinaryPutVanillaCall
    } else if kb > spot {
        PairDirection::BinaryCallVanillaPut
    } else {
        AT_THE_MONEY_DIRECTION
    })
}

// ---------------------------------------------------------------------------
// Candidate builder
// ---------------------------------------------------------------------------

/// Admissibility knobs. Defaults give the strict mode: no fee, no
/// slack, no price clipping.
#[derive(Debug, Clone)]
pub struct CandidateConfig {
    /// Vanilla contracts per pair.
    pub qv: f64,
    /// Flat fee in USD added to the hedge-cost sizing (not the bound).
    pub fee_usd: f64,
    /// Slack added to the raw edge before the sign test. Zero is the
    /// strict mode; a positive value admits near-misses and the
    /// reported edge becomes the relaxed margin.
    pub edge_epsilon: f64,
    /// Symmetric band excluded at both ends of the binary price range:
    /// only `pb_clip < Pb < 1 - pb_clip` is considered.
    pub pb_clip: f64,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            qv: 1.0,
            fee_usd: 0.0,
            edge_epsilon: 0.0,
            pb_clip: 0.0,
        }
    }
}

/// Builds trade candidates from pre-joined legs.
pub struct CandidateBuilder {
    config: CandidateConfig,
}

impl CandidateBuilder {
    pub fn new(config: CandidateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CandidateConfig {
        &self.config
    }

    /// Test one binary quote against one vanilla quote, with the
    /// vanilla premium already resolved to USD.
    ///
    /// Returns `None` when any input fails validation, the vanilla's
    /// type does not match the inferred direction, or the strike bound
    /// (with `edge_epsilon` slack) is violated. The candidate records
    /// the vanilla quote's own expiry, which may differ from the
    /// binary's when the scanner fell back to a nearby expiry.
    pub fn build(
        &self,
        binary: &BinaryQuote,
        vanilla: &VanillaQuote,
        spot: f64,
        pv_usd: f64,
    ) -> Option<TradeCandidate> {
        let cfg = &self.config;
        if cfg.qv.is_nan() || cfg.qv <= 0.0 || cfg.fee_usd.is_nan() || cfg.fee_usd < 0.0 {
            debug!(qv = cfg.qv, fee_usd = cfg.fee_usd, "Rejecting pair: invalid sizing config");
            return None;
        }
        if spot.is_nan() || spot <= 0.0 {
            debug!(spot, "Rejecting pair: invalid spot");
            return None;
        }
        if pv_usd.is_nan() || pv_usd < 0.0 {
            debug!(pv_usd, "Rejecting pair: invalid vanilla premium");
            return None;
        }
        let pb = binary.price;
        let clip = cfg.pb_clip;
        if pb.is_nan() || pb <= clip || pb >= 1.0 - clip {
            debug!(pb, clip, "Rejecting pair: binary price outside usable band");
            return None;
        }

        let direction = infer_direction(spot, binary.strike).ok()?;
        if vanilla.option_type != direction.vanilla_type() {
            debug!(
                have = %vanilla.option_type,
                need = %direction.vanilla_type(),
                "Rejecting pair: vanilla type does not match direction",
            );
            return None;
        }

        let kv = vanilla.strike;
        let (kv_bound, raw_edge) = match direction {
            PairDirection::BinaryPutVanillaCall => {
                let bound = conditions::call_strike_bound(binary.strike, cfg.qv, pv_usd, pb).ok()?;
                (bound, bound - kv)
            }
            PairDirection::BinaryCallVanillaPut => {
                let bound = conditions::put_strike_bound(binary.strike, cfg.qv, pv_usd, pb).ok()?;
                (bound, kv - bound)
            }
        };

        let edge = raw_edge + cfg.edge_epsilon;
        if edge.is_nan() || edge <= 0.0 {
            debug!(kv, kv_bound, edge, "Rejecting pair: strike bound violated");
            return None;
        }

        let qb = conditions::binary_quantity(cfg.qv, pv_usd, cfg.fee_usd, pb).ok()?;

        let candidate = TradeCandidate {
            date: binary.date,
            underlying: normalize_underlying(&binary.underlying),
            expiry: vanilla.expiry,
            spot,
            binary_type: direction.binary_type(),
            kb: binary.strike,
            pb,
            vanilla_type: direction.vanilla_type(),
            kv,
            pv_usd,
            qv: cfg.qv,
            qb,
            fee_usd: cfg.fee_usd,
            kv_bound,
            edge,
        };
        debug!(candidate = %candidate, "Admissible pair found");
        Some(candidate)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
