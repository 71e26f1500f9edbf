//! CSV loaders for the input tables.
//!
//! Validation here is the input-contract boundary: missing columns,
//! malformed dates or numbers, unknown option types and out-of-range
//! binary prices are fatal for the offending file and name the file,
//! line and field involved. Keys are normalized on ingest (whitespace
//! trimmed, underlying uppercased, option types lowercased) so
//! downstream joins see canonical rows. Extra columns are ignored.

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::types::{
    normalize_underlying, BinaryQuote, DatasetError, OptionType, SpotObservation, TradeCandidate,
    VanillaQuote,
};

/// Required columns per table.
const SPOT_COLUMNS: &[&str] = &["date", "underlying", "spot"];
const BINARY_COLUMNS: &[&str] = &["date", "underlying", "expiry", "strike", "price"];
const VANILLA_COLUMNS: &[&str] = &["date", "underlying", "expiry", "strike", "type"];

// ---------------------------------------------------------------------------
// Public loaders
// ---------------------------------------------------------------------------

/// Load the spot table: `date, underlying, spot` with `spot` strictly
/// positive.
pub fn load_spot(path: impl AsRef<Path>) -> Result<Vec<SpotObservation>, DatasetError> {
    let name = path.as_ref().display().to_string();
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(|e| read_error(&name, e))?;
    require_columns(&name, reader.headers().map_err(|e| read_error(&name, e))?, SPOT_COLUMNS)?;

    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<RawSpotRow>().enumerate() {
        let line = idx as u64 + 2;
        let row = row.map_err(|e| read_error(&name, e))?;
        let spot = parse_finite(&name, line, "spot", &row.spot)?;
        if spot <= 0.0 {
            return Err(invalid(&name, line, "spot", format!("must be positive, got {spot}")));
        }
        out.push(SpotObservation {
            date: parse_date(&name, line, "date", &row.date)?,
            underlying: parse_underlying(&name, line, &row.underlying)?,
            spot,
        });
    }
    debug!(rows = out.len(), path = %name, "Loaded spot table");
    Ok(out)
}

/// Load the binary quote table: `date, underlying, expiry, strike,
/// price` with `price` strictly inside the unit interval.
pub fn load_binary(path: impl AsRef<Path>) -> Result<Vec<BinaryQuote>, DatasetError> {
    let name = path.as_ref().display().to_string();
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(|e| read_error(&name, e))?;
    require_columns(&name, reader.headers().map_err(|e| read_error(&name, e))?, BINARY_COLUMNS)?;

    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<RawBinaryRow>().enumerate() {
        let line = idx as u64 + 2;
        let row = row.map_err(|e| read_error(&name, e))?;
        let price = parse_finite(&name, line, "price", &row.price)?;
        if price <= 0.0 || price >= 1.0 {
            return Err(invalid(&name, line, "price", format!("must lie in (0, 1), got {price}")));
        }
        out.push(BinaryQuote {
            date: parse_date(&name, line, "date", &row.date)?,
            underlying: parse_underlying(&name, line, &row.underlying)?,
            expiry: parse_date(&name, line, "expiry", &row.expiry)?,
            strike: parse_finite(&name, line, "strike", &row.strike)?,
            price,
        });
    }
    debug!(rows = out.len(), path = %name, "Loaded binary table");
    Ok(out)
}

/// Load the vanilla quote table: `date, underlying, expiry, strike,
/// type` plus at least one of the premium columns `price_usd` (USD) or
/// `price` (underlying units). Empty or NaN premium cells count as
/// missing; negative premiums are a contract violation.
pub fn load_vanilla(path: impl AsRef<Path>) -> Result<Vec<VanillaQuote>, DatasetError> {
    let name = path.as_ref().display().to_string();
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(|e| read_error(&name, e))?;
    {
        let headers = reader.headers().map_err(|e| read_error(&name, e))?;
        require_columns(&name, headers, VANILLA_COLUMNS)?;
        let has_premium = headers
            .iter()
            .any(|h| matches!(h.trim(), "price" | "price_usd"));
        if !has_premium {
            return Err(DatasetError::NoPremiumColumn { path: name });
        }
    }

    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<RawVanillaRow>().enumerate() {
        let line = idx as u64 + 2;
        let row = row.map_err(|e| read_error(&name, e))?;
        let option_type = OptionType::from_str(&row.option_type)
            .map_err(|e| invalid(&name, line, "type", e.to_string()))?;
        out.push(VanillaQuote {
            date: parse_date(&name, line, "date", &row.date)?,
            underlying: parse_underlying(&name, line, &row.underlying)?,
            expiry: parse_date(&name, line, "expiry", &row.expiry)?,
            strike: parse_finite(&name, line, "strike", &row.strike)?,
            option_type,
            price: parse_premium(&name, line, "price", row.price.as_deref())?,
            price_usd: parse_premium(&name, line, "price_usd", row.price_usd.as_deref())?,
        });
    }
    debug!(rows = out.len(), path = %name, "Loaded vanilla table");
    Ok(out)
}

/// Read a previously written opportunities table back. The file is
/// scanner output, so the strict header contract applies as-is.
pub fn load_candidates(path: impl AsRef<Path>) -> Result<Vec<TradeCandidate>, DatasetError> {
    let name = path.as_ref().display().to_string();
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(|e| read_error(&name, e))?;
    let mut out = Vec::new();
    for row in reader.deserialize::<TradeCandidate>() {
        out.push(row.map_err(|e| read_error(&name, e))?);
    }
    debug!(rows = out.len(), path = %name, "Loaded candidate table");
    Ok(out)
}

// ---------------------------------------------------------------------------
// Raw rows and field parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawSpotRow {
    date: String,
    underlying: String,
    spot: String,
}

#[derive(Debug, Deserialize)]
struct RawBinaryRow {
    date: String,
    underlying: String,
    expiry: String,
    strike: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct RawVanillaRow {
    date: String,
    underlying: String,
    expiry: String,
    strike: String,
    #[serde(rename = "type")]
    option_type: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    price_usd: Option<String>,
}

fn read_error(path: &str, source: csv::Error) -> DatasetError {
    DatasetError::Read {
        path: path.to_string(),
        source,
    }
}

fn invalid(path: &str, line: u64, field: &str, reason: String) -> DatasetError {
    DatasetError::InvalidField {
        path: path.to_string(),
        line,
        field: field.to_string(),
        reason,
    }
}

fn require_columns(
    path: &str,
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<(), DatasetError> {
    for column in required {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(DatasetError::MissingColumn {
                path: path.to_string(),
                column: (*column).to_string(),
            });
        }
    }
    Ok(())
}

fn parse_date(path: &str, line: u64, field: &str, raw: &str) -> Result<NaiveDate, DatasetError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        invalid(path, line, field, format!("expected ISO date (YYYY-MM-DD), got '{trimmed}'"))
    })
}

fn parse_finite(path: &str, line: u64, field: &str, raw: &str) -> Result<f64, DatasetError> {
    let trimmed = raw.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| invalid(path, line, field, format!("expected a number, got '{trimmed}'")))?;
    if !value.is_finite() {
        return Err(invalid(path, line, field, format!("must be finite, got {value}")));
    }
    Ok(value)
}

fn parse_underlying(path: &str, line: u64, raw: &str) -> Result<String, DatasetError> {
    let normalized = normalize_underlying(raw);
    if normalized.is_empty() {
        return Err(invalid(path, line, "underlying", "must be non-empty".to_string()));
    }
    Ok(normalized)
}

/// Premium cells follow tabular missing-value semantics: an absent
/// column, an empty cell or a NaN all mean "no quote in this unit".
fn parse_premium(
    path: &str,
    line: u64,
    field: &str,
    raw: Option<&str>,
) -> Result<Option<f64>, DatasetError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| invalid(path, line, field, format!("expected a number, got '{trimmed}'")))?;
    if value.is_nan() {
        return Ok(None);
    }
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(path, line, field, format!("must be non-negative, got {value}")));
    }
    Ok(Some(value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_csv(hint: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("strikebound-{hint}-{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // -- spot tests --

    #[test]
    fn test_load_spot_normalizes_rows() {
        let path = temp_csv(
            "spot",
            "date,underlying,spot\n2024-01-01, btc ,70000.0\n2024-01-02,ETH,4000\n",
        );
        let rows = load_spot(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].underlying, "BTC");
        assert_eq!(rows[0].date, ymd(2024, 1, 1));
        assert_eq!(rows[0].spot, 70_000.0);
        assert_eq!(rows[1].underlying, "ETH");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_spot_missing_column() {
        let path = temp_csv("spot", "date,underlying\n2024-01-01,BTC\n");
        let err = load_spot(&path).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { column, .. } if column == "spot"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_spot_rejects_bad_rows() {
        let path = temp_csv(
            "spot",
            "date,underlying,spot\n2024-01-01,BTC,70000\nnot-a-date,BTC,70000\n",
        );
        let err = load_spot(&path).unwrap_err();
        // The bad row is the second data row, physical line 3.
        assert!(matches!(err, DatasetError::InvalidField { line: 3, ref field, .. } if field == "date"));
        let _ = std::fs::remove_file(&path);

        let path = temp_csv("spot", "date,underlying,spot\n2024-01-01,BTC,-5\n");
        let err = load_spot(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidField { ref field, .. } if field == "spot"));
        let _ = std::fs::remove_file(&path);

        let path = temp_csv("spot", "date,underlying,spot\n2024-01-01,BTC,abc\n");
        assert!(load_spot(&path).is_err());
        let _ = std::fs::remove_file(&path);

        let path = temp_csv("spot", "date,underlying,spot\n2024-01-01,  ,70000\n");
        let err = load_spot(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidField { ref field, .. } if field == "underlying"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_spot_missing_file() {
        let path = std::env::temp_dir().join(format!("strikebound-nope-{}.csv", uuid::Uuid::new_v4()));
        assert!(matches!(load_spot(&path), Err(DatasetError::Read { .. })));
    }

    // -- binary tests --

    #[test]
    fn test_load_binary_happy_path() {
        let path = temp_csv(
            "binary",
            "date,underlying,expiry,strike,price,question\n2024-01-01,btc,2024-02-01,65000,0.3,extra ignored\n",
        );
        let rows = load_binary(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].underlying, "BTC");
        assert_eq!(rows[0].expiry, ymd(2024, 2, 1));
        assert_eq!(rows[0].strike, 65_000.0);
        assert_eq!(rows[0].price, 0.3);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_binary_price_must_be_inside_unit_interval() {
        for bad in ["0.0", "1.0", "1.2", "-0.1"] {
            let path = temp_csv(
                "binary",
                &format!("date,underlying,expiry,strike,price\n2024-01-01,BTC,2024-02-01,65000,{bad}\n"),
            );
            let err = load_binary(&path).unwrap_err();
            assert!(
                matches!(err, DatasetError::InvalidField { ref field, .. } if field == "price"),
                "price {bad} should be rejected",
            );
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn test_load_binary_missing_column() {
        let path = temp_csv("binary", "date,underlying,expiry,strike\n2024-01-01,BTC,2024-02-01,65000\n");
        let err = load_binary(&path).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { column, .. } if column == "price"));
        let _ = std::fs::remove_file(&path);
    }

    // -- vanilla tests --

    #[test]
    fn test_load_vanilla_premium_variants() {
        let path = temp_csv(
            "vanilla",
            "date,underlying,expiry,strike,type,price,price_usd\n\
             2024-01-01,BTC,2024-02-01,60000,call,0.0286,2000\n\
             2024-01-01,BTC,2024-02-01,62000, CALL ,0.05,\n\
             2024-01-01,BTC,2024-02-01,64000,put,,1500\n\
             2024-01-01,BTC,2024-02-01,66000,call,NaN,\n",
        );
        let rows = load_vanilla(&path).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].price, Some(0.0286));
        assert_eq!(rows[0].price_usd, Some(2_000.0));
        assert_eq!(rows[1].option_type, OptionType::Call);
        assert_eq!(rows[1].price_usd, None);
        assert_eq!(rows[2].option_type, OptionType::Put);
        assert_eq!(rows[2].price, None);
        // NaN premium cells count as missing, not invalid.
        assert_eq!(rows[3].price, None);
        assert_eq!(rows[3].price_usd, None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_vanilla_requires_a_premium_column() {
        let path = temp_csv(
            "vanilla",
            "date,underlying,expiry,strike,type\n2024-01-01,BTC,2024-02-01,60000,call\n",
        );
        let err = load_vanilla(&path).unwrap_err();
        assert!(matches!(err, DatasetError::NoPremiumColumn { .. }));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_vanilla_rejects_unknown_type() {
        let path = temp_csv(
            "vanilla",
            "date,underlying,expiry,strike,type,price_usd\n2024-01-01,BTC,2024-02-01,60000,straddle,2000\n",
        );
        let err = load_vanilla(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidField { ref field, .. } if field == "type"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_vanilla_rejects_negative_premium() {
        let path = temp_csv(
            "vanilla",
            "date,underlying,expiry,strike,type,price_usd\n2024-01-01,BTC,2024-02-01,60000,call,-2000\n",
        );
        let err = load_vanilla(&path).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidField { ref field, .. } if field == "price_usd"));
        let _ = std::fs::remove_file(&path);
    }
}
