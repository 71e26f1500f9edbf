//! Hold-to-expiry backtesting.

pub mod runner;
