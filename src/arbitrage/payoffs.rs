//! Settlement payoffs for constructed pairs.
//!
//! Net USD payoff at expiry of the two admissible pairings, given the
//! realized spot `S_T` and the realized binary settlement `E`. Both
//! legs are long: the vanilla contributes intrinsic value minus the
//! premium paid, the binary contributes `E - Pb` per contract. When
//! the binary leg was sized by `conditions::binary_quantity`, a fee-free
//! pair floors at exactly zero in the binary's winning region.

use crate::types::DomainError;

/// Payoff of a long vanilla call hedged by a long binary put:
/// `Qv * (max(S_T - Kv, 0) - Pv_usd) + Qb * (E - Pb)`.
pub fn long_call_binary_put(
    s_t: f64,
    kv: f64,
    pv_usd: f64,
    qv: f64,
    pb: f64,
    qb: f64,
    outcome: u8,
) -> Result<f64, DomainError> {
    check_settlement_inputs(s_t, qv, qb, outcome)?;
    let vanilla_leg = qv * ((s_t - kv).max(0.0) - pv_usd);
    let binary_leg = qb * (f64::from(outcome) - pb);
    Ok(vanilla_leg + binary_leg)
}

/// Payoff of a long vanilla put hedged by a long binary call:
/// `Qv * (max(Kv - S_T, 0) - Pv_usd) + Qb * (E - Pb)`.
pub fn long_put_binary_call(
    s_t: f64,
    kv: f64,
    pv_usd: f64,
    qv: f64,
    pb: f64,
    qb: f64,
    outcome: u8,
) -> Result<f64, DomainError> {
    check_settlement_inputs(s_t, qv, qb, outcome)?;
    let vanilla_leg = qv * ((kv - s_t).max(0.0) - pv_usd);
    let binary_leg = qb * (f64::from(outcome) - pb);
    Ok(vanilla_leg + binary_leg)
}

fn check_settlement_inputs(s_t: f64, qv: f64, qb: f64, outcome: u8) -> Result<(), DomainError> {
    if s_t.is_nan() || s_t <= 0.0 {
        return Err(DomainError::TerminalSpot(s_t));
    }
    if outcome > 1 {
        return Err(DomainError::Settlement(outcome));
    }
    if qv.is_nan() || qv <= 0.0 {
        return Err(DomainError::VanillaQuantity(qv));
    }
    if qb.is_nan() || qb <= 0.0 {
        return Err(DomainError::BinaryQuantity(qb));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::conditions::binary_quantity;

    // Worked scenario: binary put K=65000 @ 0.3 hedging a vanilla call
    // K=60000 at $2000 premium, Qv=1, no fee.
    const QB: f64 = 2_000.0 / 0.7;

    // -- long call + binary put tests --

    #[test]
    fn test_call_pair_floors_at_zero_below_vanilla_strike() {
        // S_T=58000: call expires worthless, binary put pays. The binary
        // leg's profit Qb*(1-Pb)=2000 exactly cancels the lost premium.
        let pnl = long_call_binary_put(58_000.0, 60_000.0, 2_000.0, 1.0, 0.3, QB, 1).unwrap();
        assert!(pnl.abs() < 1e-9);

        let binary_leg = QB * (1.0 - 0.3);
        assert!((binary_leg - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_call_pair_gains_between_strikes() {
        // S_T=63000: call is $3000 in the money, binary put still pays.
        let pnl = long_call_binary_put(63_000.0, 60_000.0, 2_000.0, 1.0, 0.3, QB, 1).unwrap();
        assert!((pnl - 3_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_call_pair_payoff_at_binary_strike_equals_edge() {
        // S_T=65000: binary put misses (E=0); the call's intrinsic value
        // carries the pair, landing exactly on the scanner's edge.
        let pnl = long_call_binary_put(65_000.0, 60_000.0, 2_000.0, 1.0, 0.3, QB, 0).unwrap();
        let edge = 65_000.0 - 2_000.0 / 0.7 - 60_000.0;
        assert!((pnl - edge).abs() < 1e-6);
    }

    #[test]
    fn test_call_pair_at_bound_never_loses() {
        // With Kv exactly on the no-arbitrage bound the payoff is
        // non-negative for every terminal spot.
        let kv = 65_000.0 - 2_000.0 / 0.7;
        let qb = binary_quantity(1.0, 2_000.0, 0.0, 0.3).unwrap();
        let mut s_t = 30_000.0;
        while s_t <= 110_000.0 {
            let outcome = u8::from(s_t < 65_000.0);
            let pnl = long_call_binary_put(s_t, kv, 2_000.0, 1.0, 0.3, qb, outcome).unwrap();
            assert!(pnl >= -1e-9, "negative payoff {pnl} at S_T={s_t}");
            s_t += 500.0;
        }
    }

    // -- long put + binary call tests --

    #[test]
    fn test_put_pair_floors_at_zero_above_vanilla_strike() {
        // Mirrored setup: binary call K=65000 @ 0.3, vanilla put K=70000.
        let pnl = long_put_binary_call(72_000.0, 70_000.0, 2_000.0, 1.0, 0.3, QB, 1).unwrap();
        assert!(pnl.abs() < 1e-9);
    }

    #[test]
    fn test_put_pair_gains_when_spot_falls() {
        // S_T=58000: put is $12000 in the money, binary call misses.
        let pnl = long_put_binary_call(58_000.0, 70_000.0, 2_000.0, 1.0, 0.3, QB, 0).unwrap();
        let expected = 12_000.0 - 2_000.0 - QB * 0.3;
        assert!((pnl - expected).abs() < 1e-9);
        assert!(pnl > 9_000.0);
    }

    #[test]
    fn test_put_pair_at_bound_never_loses() {
        let kv = 65_000.0 + 2_000.0 / 0.7;
        let qb = binary_quantity(1.0, 2_000.0, 0.0, 0.3).unwrap();
        let mut s_t = 30_000.0;
        while s_t <= 110_000.0 {
            let outcome = u8::from(s_t >= 65_000.0);
            let pnl = long_put_binary_call(s_t, kv, 2_000.0, 1.0, 0.3, qb, outcome).unwrap();
            assert!(pnl >= -1e-9, "negative payoff {pnl} at S_T={s_t}");
            s_t += 500.0;
        }
    }

    // -- domain error tests --

    #[test]
    fn test_settlement_domain_errors() {
        assert!(matches!(
            long_call_binary_put(0.0, 60_000.0, 2_000.0, 1.0, 0.3, QB, 1),
            Err(DomainError::TerminalSpot(_)),
        ));
        assert!(matches!(
            long_call_binary_put(-5.0, 60_000.0, 2_000.0, 1.0, 0.3, QB, 1),
            Err(DomainError::TerminalSpot(_)),
        ));
        assert!(matches!(
            long_call_binary_put(f64::NAN, 60_000.0, 2_000.0, 1.0, 0.3, QB, 1),
            Err(DomainError::TerminalSpot(_)),
        ));
        assert!(matches!(
            long_call_binary_put(58_000.0, 60_000.0, 2_000.0, 1.0, 0.3, QB, 2),
            Err(DomainError::Settlement(2)),
        ));
        assert!(matches!(
            long_put_binary_call(58_000.0, 60_000.0, 2_000.0, 0.0, 0.3, QB, 1),
            Err(DomainError::VanillaQuantity(_)),
        ));
        assert!(matches!(
            long_put_binary_call(58_000.0, 60_000.0, 2_000.0, 1.0, 0.3, 0.0, 1),
            Err(DomainError::BinaryQuantity(_)),
        ));
        assert!(matches!(
            long_put_binary_call(58_000.0, 60_000.0, 2_000.0, 1.0, 0.3, -1.0, 1),
            Err(DomainError::BinaryQuantity(_)),
        ));
    }
}
