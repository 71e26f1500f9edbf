//! No-arbitrage bound mathematics.
//!
//! A short binary position paying out `E in {0, 1}` per contract can be
//! hedged with vanilla options so that the worst case is covered
//! exactly. Sizing the binary leg off the vanilla premium
//! (`binary_quantity`) and bounding the vanilla strike relative to the
//! binary strike (`call_strike_bound` / `put_strike_bound`) are the
//! two conditions every candidate has to clear. Everything in here is
//! pure f64 arithmetic; violations of the input domain come back as
//! typed errors rather than NaN propagation.

use crate::types::DomainError;

/// Binary quantity that balances the hedge:
/// `Qb = Qv * (Pv_usd + fee_usd) / (1 - Pb)`.
///
/// Scales the binary leg so its worst-case loss equals the vanilla
/// premium outlay (fees included). Diverges as `Pb` approaches 1.
pub fn binary_quantity(qv: f64, pv_usd: f64, fee_usd: f64, pb: f64) -> Result<f64, DomainError> {
    if pb.is_nan() || pb <= 0.0 || pb >= 1.0 {
        return Err(DomainError::BinaryPrice(pb));
    }
    if qv.is_nan() || qv <= 0.0 {
        return Err(DomainError::VanillaQuantity(qv));
    }
    if pv_usd.is_nan() || pv_usd < 0.0 {
        return Err(DomainError::Premium(pv_usd));
    }
    if fee_usd.is_nan() || fee_usd < 0.0 {
        return Err(DomainError::Fee(fee_usd));
    }
    Ok(qv * (pv_usd + fee_usd) / (1.0 - pb))
}

/// Highest admissible vanilla call strike against a binary put at `kb`:
/// `Kv <= kb - Qv * Pv_usd / (1 - Pb)`.
///
/// The bound sits below `kb` whenever the premium is positive; a call
/// struck above it cannot recover the premium in the binary's losing
/// region.
pub fn call_strike_bound(kb: f64, qv: f64, pv_usd: f64, pb: f64) -> Result<f64, DomainError> {
    premium_offset(qv, pv_usd, pb).map(|offset| kb - offset)
}

/// Lowest admissible vanilla put strike against a binary call at `kb`:
/// `Kv >= kb + Qv * Pv_usd / (1 - Pb)`.
pub fn put_strike_bound(kb: f64, qv: f64, pv_usd: f64, pb: f64) -> Result<f64, DomainError> {
    premium_offset(qv, pv_usd, pb).map(|offset| kb + offset)
}

/// Shared offset term `Qv * Pv_usd / (1 - Pb)` with domain checks.
fn premium_offset(qv: f64, pv_usd: f64, pb: f64) -> Result<f64, DomainError> {
    if pb.is_nan() || pb <= 0.0 || pb >= 1.0 {
        return Err(DomainError::BinaryPrice(pb));
    }
    if qv.is_nan() || qv <= 0.0 {
        return Err(DomainError::VanillaQuantity(qv));
    }
    if pv_usd.is_nan() || pv_usd < 0.0 {
        return Err(DomainError::Premium(pv_usd));
    }
    Ok(qv * pv_usd / (1.0 - pb))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
