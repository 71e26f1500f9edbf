//! STRIKEBOUND — binary options vs. vanilla option hedges, cross-market.
//!
//! Library crate; the binary entry point and the integration tests
//! import through these modules.

pub mod config;
pub mod types;
pub mod arbitrage;
pub mod backtest;
pub mod data;
pub mod markets;
