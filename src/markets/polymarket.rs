//! Polymarket integration.
//!
//! Market discovery via the Gamma API, YES-token pricing via the
//! public CLOB midpoint endpoint. Both are unauthenticated and
//! read-only; no wallet or order placement is involved.
//!
//! Gamma API: https://gamma-api.polymarket.com
//! CLOB API: https://clob.polymarket.com

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::markets::{get_json, RetryPolicy};
use crate::types::{normalize_underlying, BinaryQuote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
const CLOB_API_URL: &str = "https://clob.polymarket.com";

// ---------------------------------------------------------------------------
// Gamma API response types
// ---------------------------------------------------------------------------

/// Raw Gamma market. `outcomePrices` and `clobTokenIds` arrive as
/// JSON embedded in strings: "[\"0.65\",\"0.35\"]".
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GammaMarket {
    #[serde(default)]
    pub question: String,
    #[serde(default, rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(default, rename = "endDateIso")]
    pub end_date_iso: Option<String>,
    #[serde(default, rename = "outcomePrices")]
    pub outcome_prices: Option<String>,
    #[serde(default, rename = "clobTokenIds")]
    pub clob_token_ids: Option<String>,
}

/// Pre-price screening result for one Gamma market.
struct ThresholdCandidate {
    expiry: NaiveDate,
    strike: f64,
    token_id: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct PolymarketClient {
    http: Client,
    retry: RetryPolicy,
    /// CLOB midpoints already looked up this run; `None` records a
    /// token whose midpoint was unavailable.
    midpoints: HashMap<String, Option<f64>>,
}

impl PolymarketClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("strikebound/0.1.0")
            .build()
            .context("Failed to build Polymarket HTTP client")?;
        Ok(Self {
            http,
            retry,
            midpoints: HashMap::new(),
        })
    }

    /// Fetch one page of active Gamma markets.
    async fn gamma_markets(&self, limit: u32) -> Result<Vec<GammaMarket>> {
        let url = format!("{GAMMA_API_URL}/markets");
        let value = get_json(
            &self.http,
            &url,
            &[("limit", limit.to_string()), ("active", "true".to_string())],
            self.retry,
        )
        .await?;
        let markets: Vec<GammaMarket> =
            serde_json::from_value(value).context("Failed to parse Gamma markets response")?;
        debug!(count = markets.len(), "Fetched raw Gamma markets");
        Ok(markets)
    }

    /// Midpoint of the YES token book from the CLOB, memoised per
    /// token. Best-effort: an unavailable midpoint is cached as
    /// `None` rather than failing the fetch.
    async fn midpoint(&mut self, token_id: &str) -> Option<f64> {
        if let Some(cached) = self.midpoints.get(token_id) {
            return *cached;
        }

        let url = format!("{CLOB_API_URL}/midpoint");
        let result = get_json(
            &self.http,
            &url,
            &[("token_id", token_id.to_string())],
            self.retry.best_effort(),
        )
        .await;

        let midpoint = match result {
            Ok(value) => parse_midpoint(&value),
            Err(e) => {
                warn!(token_id, error = %e, "CLOB midpoint unavailable");
                None
            }
        };
        self.midpoints.insert(token_id.to_string(), midpoint);
        midpoint
    }

    /// Markets that look like crypto threshold binaries for the
    /// underlying: the question names the currency and parses to a
    /// strike, the market carries an expiry, and a YES price in
    /// (0, 1) is available — CLOB midpoint preferred, Gamma's own
    /// `outcomePrices` as fallback.
    pub async fn threshold_markets(
        &mut self,
        underlying: &str,
        date: NaiveDate,
        limit: u32,
    ) -> Result<Vec<BinaryQuote>> {
        let normalized = normalize_underlying(underlying);
        let keywords = currency_keywords(&normalized);
        let markets = self.gamma_markets(limit).await?;

        let mut rows = Vec::new();
        for market in &markets {
            let Some(candidate) = threshold_candidate(market, &keywords) else {
                continue;
            };

            let price = match self.midpoint(&candidate.token_id).await {
                Some(mid) => Some(mid),
                None => first_outcome_price(market.outcome_prices.as_deref()),
            };
            let Some(price) = price else {
                debug!(question = %market.question, "No YES price available; skipping market");
                continue;
            };
            if price <= 0.0 || price >= 1.0 {
                continue;
            }

            rows.push(BinaryQuote {
                date,
                underlying: normalized.clone(),
                expiry: candidate.expiry,
                strike: candidate.strike,
                price,
            });
        }

        info!(
            underlying = %normalized,
            scanned = markets.len(),
            rows = rows.len(),
            "Filtered Gamma markets to threshold binaries"
        );
        Ok(rows)
    }

    /// Threshold markets restricted to one expiry date.
    pub async fn threshold_markets_for_expiry(
        &mut self,
        underlying: &str,
        date: NaiveDate,
        expiry: NaiveDate,
        limit: u32,
    ) -> Result<Vec<BinaryQuote>> {
        let rows = self.threshold_markets(underlying, date, limit).await?;
        Ok(rows.into_iter().filter(|r| r.expiry == expiry).collect())
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Question keywords that identify the underlying.
fn currency_keywords(normalized: &str) -> Vec<String> {
    match normalized {
        "BTC" => vec!["bitcoin".to_string(), "btc".to_string()],
        "ETH" => vec!["ethereum".to_string(), "eth".to_string()],
        other => vec![other.to_lowercase()],
    }
}

/// Screen one Gamma market down to its threshold-market fields,
/// without pricing it.
fn threshold_candidate(market: &GammaMarket, keywords: &[String]) -> Option<ThresholdCandidate> {
    let question = market.question.trim();
    if question.is_empty() {
        return None;
    }
    let ql = question.to_lowercase();
    if !keywords.iter().any(|k| ql.contains(k.as_str())) {
        return None;
    }

    let expiry = market
        .end_date
        .as_deref()
        .or(market.end_date_iso.as_deref())
        .and_then(parse_expiry)?;
    let strike = parse_strike(question)?;
    let token_id = yes_token_id(market.clob_token_ids.as_deref())?;

    Some(ThresholdCandidate {
        expiry,
        strike,
        token_id,
    })
}

/// Gamma `endDate` is usually full RFC 3339 ("2026-02-27T08:00:00Z"),
/// occasionally a bare date. Converted to the UTC calendar date.
fn parse_expiry(end_date: &str) -> Option<NaiveDate> {
    let trimmed = end_date.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&chrono::Utc).date_naive());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

/// Extract the strike from a question like "Will Bitcoin be above
/// $70,000 on March 1?": the first number in the text, read either as
/// comma-grouped thousands or as a plain digit run.
fn parse_strike(question: &str) -> Option<f64> {
    let bytes = question.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' || bytes[i].is_ascii_digit() {
            let start = if bytes[i] == b'$' { i + 1 } else { i };
            if start < bytes.len() && bytes[start].is_ascii_digit() {
                return match_number(&question[start..]);
            }
        }
        i += 1;
    }
    None
}

/// Parse a number at the start of `s`: 1-3 digits followed by `,ddd`
/// groups when that shape is present, else the whole leading digit
/// run.
fn match_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut digits = 0;
    while digits < bytes.len() && bytes[digits].is_ascii_digit() {
        digits += 1;
    }
    if digits == 0 {
        return None;
    }

    if digits <= 3 {
        let mut grouped = String::from(&s[..digits]);
        let mut end = digits;
        let mut groups = 0;
        while bytes.len() >= end + 4
            && bytes[end] == b','
            && bytes[end + 1..end + 4].iter().all(u8::is_ascii_digit)
        {
            grouped.push_str(&s[end + 1..end + 4]);
            end += 4;
            groups += 1;
        }
        if groups > 0 {
            return grouped.parse::<f64>().ok();
        }
    }

    s[..digits].parse::<f64>().ok()
}

/// First entry of the embedded `clobTokenIds` array: the YES token.
fn yes_token_id(raw: Option<&str>) -> Option<String> {
    let ids: Vec<serde_json::Value> = serde_json::from_str(raw?).ok()?;
    match ids.first()? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First entry of the embedded `outcomePrices` array: the YES price.
fn first_outcome_price(raw: Option<&str>) -> Option<f64> {
    let prices: Vec<serde_json::Value> = serde_json::from_str(raw?).ok()?;
    match prices.first()? {
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// CLOB midpoint responses key the price as `mid`, `midpoint` or
/// `price`, as a string or a number.
fn parse_midpoint(value: &serde_json::Value) -> Option<f64> {
    for key in ["mid", "midpoint", "price"] {
        match value.get(key) {
            Some(serde_json::Value::String(s)) => return s.parse::<f64>().ok(),
            Some(serde_json::Value::Number(n)) => return n.as_f64(),
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn btc_keywords() -> Vec<String> {
        currency_keywords("BTC")
    }

    // -- strike parsing tests --

    #[test]
    fn test_parse_strike_comma_grouped() {
        assert_eq!(
            parse_strike("Will Bitcoin be above $70,000 on March 1?"),
            Some(70_000.0)
        );
        assert_eq!(parse_strike("above 1,000,000 by 2030"), Some(1_000_000.0));
    }

    #[test]
    fn test_parse_strike_plain_digits() {
        assert_eq!(parse_strike("Will Bitcoin close above 100?"), Some(100.0));
        assert_eq!(parse_strike("$85000 or higher?"), Some(85_000.0));
    }

    #[test]
    fn test_parse_strike_takes_first_number() {
        assert_eq!(
            parse_strike("Will Bitcoin hit $90,000 before $100,000?"),
            Some(90_000.0)
        );
    }

    #[test]
    fn test_parse_strike_malformed_grouping_reads_leading_run() {
        // ",24" is not a thousands group, so only the leading digit
        // run counts.
        assert_eq!(parse_strike("between 7,24 whatever"), Some(7.0));
        assert_eq!(parse_strike("12,34 puzzle"), Some(12.0));
    }

    #[test]
    fn test_parse_strike_none_without_digits() {
        assert_eq!(parse_strike("Will Bitcoin go up?"), None);
        assert_eq!(parse_strike("$ but no number"), None);
        assert_eq!(parse_strike(""), None);
    }

    // -- expiry parsing tests --

    #[test]
    fn test_parse_expiry_rfc3339() {
        assert_eq!(
            parse_expiry("2026-02-27T08:00:00Z"),
            NaiveDate::from_ymd_opt(2026, 2, 27)
        );
    }

    #[test]
    fn test_parse_expiry_converts_offset_to_utc() {
        // 23:30 at UTC-5 is already the 28th in UTC.
        assert_eq!(
            parse_expiry("2026-02-27T23:30:00-05:00"),
            NaiveDate::from_ymd_opt(2026, 2, 28)
        );
    }

    #[test]
    fn test_parse_expiry_bare_date() {
        assert_eq!(
            parse_expiry("2026-02-27"),
            NaiveDate::from_ymd_opt(2026, 2, 27)
        );
    }

    #[test]
    fn test_parse_expiry_garbage_is_none() {
        assert_eq!(parse_expiry("soon"), None);
        assert_eq!(parse_expiry(""), None);
    }

    // -- embedded JSON field tests --

    #[test]
    fn test_yes_token_id_takes_first_entry() {
        assert_eq!(
            yes_token_id(Some("[\"7132107\", \"8240441\"]")),
            Some("7132107".to_string())
        );
        assert_eq!(yes_token_id(Some("[123, 456]")), Some("123".to_string()));
    }

    #[test]
    fn test_yes_token_id_missing_or_empty() {
        assert_eq!(yes_token_id(None), None);
        assert_eq!(yes_token_id(Some("[]")), None);
        assert_eq!(yes_token_id(Some("not json")), None);
        assert_eq!(yes_token_id(Some("[\"\"]")), None);
    }

    #[test]
    fn test_first_outcome_price_string_and_number() {
        assert_eq!(first_outcome_price(Some("[\"0.43\",\"0.57\"]")), Some(0.43));
        assert_eq!(first_outcome_price(Some("[0.43, 0.57]")), Some(0.43));
        assert_eq!(first_outcome_price(Some("not json")), None);
        assert_eq!(first_outcome_price(None), None);
    }

    // -- midpoint parsing tests --

    #[test]
    fn test_parse_midpoint_key_variants() {
        assert_eq!(
            parse_midpoint(&serde_json::json!({"mid": "0.42"})),
            Some(0.42)
        );
        assert_eq!(
            parse_midpoint(&serde_json::json!({"midpoint": 0.4})),
            Some(0.4)
        );
        assert_eq!(
            parse_midpoint(&serde_json::json!({"price": "0.39"})),
            Some(0.39)
        );
    }

    #[test]
    fn test_parse_midpoint_null_falls_through_to_next_key() {
        assert_eq!(
            parse_midpoint(&serde_json::json!({"mid": null, "price": 0.5})),
            Some(0.5)
        );
    }

    #[test]
    fn test_parse_midpoint_unusable() {
        assert_eq!(parse_midpoint(&serde_json::json!({})), None);
        assert_eq!(parse_midpoint(&serde_json::json!({"mid": "abc"})), None);
        assert_eq!(parse_midpoint(&serde_json::json!([0.4])), None);
    }

    // -- screening tests --

    #[test]
    fn test_threshold_candidate_accepts_btc_threshold_market() {
        let market = GammaMarket {
            question: "Will Bitcoin be above $70,000 on February 1?".to_string(),
            end_date: Some("2024-02-01T08:00:00Z".to_string()),
            clob_token_ids: Some("[\"yes-token\", \"no-token\"]".to_string()),
            ..GammaMarket::default()
        };
        let candidate = threshold_candidate(&market, &btc_keywords()).unwrap();
        assert_eq!(candidate.expiry, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert!((candidate.strike - 70_000.0).abs() < 1e-12);
        assert_eq!(candidate.token_id, "yes-token");
    }

    #[test]
    fn test_threshold_candidate_rejects_other_underlyings() {
        let market = GammaMarket {
            question: "Will Ethereum be above $4,000?".to_string(),
            end_date: Some("2024-02-01T08:00:00Z".to_string()),
            clob_token_ids: Some("[\"a\", \"b\"]".to_string()),
            ..GammaMarket::default()
        };
        assert!(threshold_candidate(&market, &btc_keywords()).is_none());
        assert!(threshold_candidate(&market, &currency_keywords("ETH")).is_some());
    }

    #[test]
    fn test_threshold_candidate_requires_expiry_strike_and_token() {
        let base = GammaMarket {
            question: "Will Bitcoin be above $70,000?".to_string(),
            end_date: Some("2024-02-01T08:00:00Z".to_string()),
            clob_token_ids: Some("[\"a\", \"b\"]".to_string()),
            ..GammaMarket::default()
        };

        let no_end = GammaMarket {
            end_date: None,
            ..base.clone()
        };
        assert!(threshold_candidate(&no_end, &btc_keywords()).is_none());

        let no_strike = GammaMarket {
            question: "Will Bitcoin moon?".to_string(),
            ..base.clone()
        };
        assert!(threshold_candidate(&no_strike, &btc_keywords()).is_none());

        let no_tokens = GammaMarket {
            clob_token_ids: None,
            ..base.clone()
        };
        assert!(threshold_candidate(&no_tokens, &btc_keywords()).is_none());

        assert!(threshold_candidate(&base, &btc_keywords()).is_some());
    }

    #[test]
    fn test_threshold_candidate_uses_end_date_iso_fallback() {
        let market = GammaMarket {
            question: "Will BTC be above $65,000?".to_string(),
            end_date: None,
            end_date_iso: Some("2024-03-15".to_string()),
            clob_token_ids: Some("[\"tok\"]".to_string()),
            ..GammaMarket::default()
        };
        let candidate = threshold_candidate(&market, &btc_keywords()).unwrap();
        assert_eq!(
            candidate.expiry,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }

    // -- gamma serde tests --

    #[test]
    fn test_gamma_market_deserializes_with_extra_fields() {
        let raw = serde_json::json!({
            "id": "514467",
            "question": "Will Bitcoin be above $70,000 on March 1?",
            "endDate": "2024-03-01T12:00:00Z",
            "endDateIso": "2024-03-01",
            "outcomePrices": "[\"0.43\", \"0.57\"]",
            "clobTokenIds": "[\"111\", \"222\"]",
            "active": true,
            "volumeNum": 120345.5
        });
        let market: GammaMarket = serde_json::from_value(raw).unwrap();
        assert!(market.question.contains("Bitcoin"));
        assert_eq!(market.end_date.as_deref(), Some("2024-03-01T12:00:00Z"));
        assert_eq!(market.end_date_iso.as_deref(), Some("2024-03-01"));
    }

    // -- keyword tests --

    #[test]
    fn test_currency_keywords() {
        assert_eq!(currency_keywords("BTC"), vec!["bitcoin", "btc"]);
        assert_eq!(currency_keywords("ETH"), vec!["ethereum", "eth"]);
        assert_eq!(currency_keywords("SOL"), vec!["sol"]);
    }

    // -- client construction tests --

    #[test]
    fn test_client_construction() {
        let client = PolymarketClient::new(Duration::from_secs(30), RetryPolicy::default());
        assert!(client.is_ok());
    }
}
