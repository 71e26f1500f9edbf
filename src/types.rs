//! Shared types for the STRIKEBOUND scanner.
//!
//! These types form the data model used across all modules: the three
//! input tables (spot, binary quotes, vanilla quotes), the candidate
//! and backtest records the pipeline produces, and the error types.
//! Field renames on the output records pin the CSV header contract.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Key normalization
// ---------------------------------------------------------------------------

/// Canonical form of an underlying symbol for join keys: trimmed and
/// uppercased, so `" btc "` and `"BTC"` land on the same key.
pub fn normalize_underlying(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Vanilla option flavor. Binary legs reuse the same labels: a binary
/// "call" pays on `S_T >= K`, a binary "put" pays on `S_T < K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// The opposite flavor. The hedge leg of a pairing is always the
    /// opposite type of the binary leg.
    pub fn opposite(&self) -> Self {
        match self {
            OptionType::Call => OptionType::Put,
            OptionType::Put => OptionType::Call,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// Attempt to parse a string into an OptionType (case-insensitive,
/// surrounding whitespace ignored).
impl std::str::FromStr for OptionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "call" => Ok(OptionType::Call),
            "put" => Ok(OptionType::Put),
            _ => Err(anyhow::anyhow!("Unknown option type: {s}")),
        }
    }
}

/// The two admissible leg pairings. The binary strike's position
/// relative to spot decides which one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairDirection {
    /// Binary put hedged by a vanilla call (binary strike below spot).
    BinaryPutVanillaCall,
    /// Binary call hedged by a vanilla put (binary strike at or above spot).
    BinaryCallVanillaPut,
}

impl PairDirection {
    /// Type of the binary leg.
    pub fn binary_type(&self) -> OptionType {
        match self {
            PairDirection::BinaryPutVanillaCall => OptionType::Put,
            PairDirection::BinaryCallVanillaPut => OptionType::Call,
        }
    }

    /// Type of the vanilla hedge leg (always opposite the binary leg).
    pub fn vanilla_type(&self) -> OptionType {
        self.binary_type().opposite()
    }

    /// Reconstruct the direction from leg types, or `None` when the
    /// combination is not one of the two admissible pairings.
    pub fn from_leg_types(binary: OptionType, vanilla: OptionType) -> Option<Self> {
        match (binary, vanilla) {
            (OptionType::Put, OptionType::Call) => Some(PairDirection::BinaryPutVanillaCall),
            (OptionType::Call, OptionType::Put) => Some(PairDirection::BinaryCallVanillaPut),
            _ => None,
        }
    }
}

impl fmt::Display for PairDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairDirection::BinaryPutVanillaCall => write!(f, "binary put + vanilla call"),
            PairDirection::BinaryCallVanillaPut => write!(f, "binary call + vanilla put"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input tables
// ---------------------------------------------------------------------------

/// One spot observation, keyed by (date, underlying).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotObservation {
    pub date: NaiveDate,
    pub underlying: String,
    /// Spot price in USD, strictly positive.
    pub spot: f64,
}

impl fmt::Display for SpotObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} spot=${:.2}", self.underlying, self.date, self.spot)
    }
}

/// A binary (digital) option quote from the prediction market.
///
/// `price` is the quoted probability of the YES outcome, in the open
/// unit interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryQuote {
    pub date: NaiveDate,
    pub underlying: String,
    pub expiry: NaiveDate,
    /// Threshold strike `Kb` in USD.
    pub strike: f64,
    /// Quoted YES price `Pb`, in (0, 1).
    pub price: f64,
}

impl fmt::Display for BinaryQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} exp {} K=${:.0} @ {:.3}",
            self.underlying, self.date, self.expiry, self.strike, self.price,
        )
    }
}

/// A vanilla option quote from the options exchange.
///
/// Premium may come quoted in USD (`price_usd`), in units of the
/// underlying (`price`), or be missing entirely; resolution order and
/// the policy for missing premiums live in the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VanillaQuote {
    pub date: NaiveDate,
    pub underlying: String,
    pub expiry: NaiveDate,
    /// Vanilla strike `Kv` in USD.
    pub strike: f64,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    /// Premium in units of the underlying, if quoted that way.
    #[serde(default)]
    pub price: Option<f64>,
    /// Premium in USD, preferred when present.
    #[serde(default)]
    pub price_usd: Option<f64>,
}

impl fmt::Display for VanillaQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let premium = match (self.price_usd, self.price) {
            (Some(usd), _) => format!("${usd:.2}"),
            (None, Some(units)) => format!("{units:.6} {}", self.underlying),
            (None, None) => "no premium".to_string(),
        };
        write!(
            f,
            "[{}] {} exp {} {} K=${:.0} {premium}",
            self.underlying, self.date, self.expiry, self.option_type, self.strike,
        )
    }
}

// ---------------------------------------------------------------------------
// Candidate & backtest records
// ---------------------------------------------------------------------------

/// An admissible binary/vanilla pairing found by the scanner.
///
/// Records are built once by the candidate builder and never mutated;
/// every candidate satisfies `0 < Pb < 1`, `Qv > 0`, `Pv_usd >= 0` and
/// the strike bound for its direction. Serde renames fix the exact CSV
/// header set reports are written (and read back) with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCandidate {
    pub date: NaiveDate,
    pub underlying: String,
    /// Expiry of the vanilla quote actually used (may differ from the
    /// binary's expiry when the nearest-expiry fallback kicked in).
    pub expiry: NaiveDate,
    /// Spot at decision time.
    pub spot: f64,
    pub binary_type: OptionType,
    #[serde(rename = "Kb")]
    pub kb: f64,
    #[serde(rename = "Pb")]
    pub pb: f64,
    pub vanilla_type: OptionType,
    #[serde(rename = "Kv")]
    pub kv: f64,
    /// Vanilla premium resolved to USD.
    #[serde(rename = "Pv_usd")]
    pub pv_usd: f64,
    #[serde(rename = "Qv")]
    pub qv: f64,
    /// Hedge quantity `Qv * (Pv_usd + fee_usd) / (1 - Pb)`.
    #[serde(rename = "Qb")]
    pub qb: f64,
    pub fee_usd: f64,
    /// The no-arbitrage strike bound the vanilla strike was tested against.
    pub kv_bound: f64,
    /// Signed margin by which `Kv` clears the bound (epsilon included).
    /// Positive for every accepted candidate.
    pub edge: f64,
}

impl TradeCandidate {
    /// The pairing direction implied by the two leg types, or `None`
    /// if the record was built outside the scanner with an invalid
    /// combination.
    pub fn direction(&self) -> Option<PairDirection> {
        PairDirection::from_leg_types(self.binary_type, self.vanilla_type)
    }

    /// Helper to build a test candidate with the worked-scenario numbers.
    #[cfg(test)]
    pub fn sample() -> Self {
        TradeCandidate {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            underlying: "BTC".to_string(),
            expiry: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            spot: 70_000.0,
            binary_type: OptionType::Put,
            kb: 65_000.0,
            pb: 0.3,
            vanilla_type: OptionType::Call,
            kv: 60_000.0,
            pv_usd: 2_000.0,
            qv: 1.0,
            qb: 2_000.0 / 0.7,
            fee_usd: 0.0,
            kv_bound: 65_000.0 - 2_000.0 / 0.7,
            edge: 65_000.0 - 2_000.0 / 0.7 - 60_000.0,
        }
    }
}

impl fmt::Display for TradeCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} exp {} | binary {} K=${:.0} @ {:.3} | {} K=${:.0} prem=${:.2} | Qb={:.4} edge={:.2}",
            self.underlying,
            self.date,
            self.expiry,
            self.binary_type,
            self.kb,
            self.pb,
            self.vanilla_type,
            self.kv,
            self.pv_usd,
            self.qb,
            self.edge,
        )
    }
}

/// One settled trade in a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub date: NaiveDate,
    pub underlying: String,
    pub expiry: NaiveDate,
    /// Spot at decision time.
    pub spot_t: f64,
    /// Realized spot at expiry.
    #[serde(rename = "S_T")]
    pub s_t: f64,
    pub binary_type: OptionType,
    #[serde(rename = "Kb")]
    pub kb: f64,
    #[serde(rename = "Pb")]
    pub pb: f64,
    /// Proxy binary settlement: 1 if the binary paid out, else 0.
    #[serde(rename = "E")]
    pub outcome: u8,
    pub vanilla_type: OptionType,
    #[serde(rename = "Kv")]
    pub kv: f64,
    #[serde(rename = "Pv_usd")]
    pub pv_usd: f64,
    #[serde(rename = "Qv")]
    pub qv: f64,
    #[serde(rename = "Qb")]
    pub qb: f64,
    pub pnl: f64,
    /// Running P&L in evaluation order.
    pub cum_pnl: f64,
    pub edge: f64,
}

impl fmt::Display for BacktestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.pnl >= 0.0 { "+" } else { "" };
        write!(
            f,
            "[{}] {} exp {} S_T=${:.2} E={} pnl={sign}{:.2} cum={:.2}",
            self.underlying, self.date, self.expiry, self.s_t, self.outcome, self.pnl, self.cum_pnl,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain violations in the pure pricing functions. Each one is fatal
/// to the single call that raised it, never to a whole run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("Binary price must lie strictly between 0 and 1, got {0}")]
    BinaryPrice(f64),

    #[error("Spot must be positive, got {0}")]
    Spot(f64),

    #[error("Terminal spot must be positive, got {0}")]
    TerminalSpot(f64),

    #[error("Vanilla quantity must be positive, got {0}")]
    VanillaQuantity(f64),

    #[error("Binary quantity must be positive, got {0}")]
    BinaryQuantity(f64),

    #[error("Vanilla premium must be non-negative, got {0}")]
    Premium(f64),

    #[error("Fee must be non-negative, got {0}")]
    Fee(f64),

    #[error("Binary settlement must be 0 or 1, got {0}")]
    Settlement(u8),
}

/// Input-contract violations on the CSV tables. These are fatal for
/// the offending dataset and name the file, line and field involved.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("{path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: String, column: String },

    #[error("{path}: need at least one premium column ('price_usd' or 'price')")]
    NoPremiumColumn { path: String },

    #[error("{path} line {line}: invalid {field}: {reason}")]
    InvalidField {
        path: String,
        line: u64,
        field: String,
        reason: String,
    },

    #[error("Vanilla quote {underlying} {date} K={strike} has no premium in USD or underlying units")]
    MissingPremium {
        date: NaiveDate,
        underlying: String,
        strike: f64,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
