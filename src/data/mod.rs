//! Dataset I/O.
//!
//! CSV loaders for the three input tables and report writers for the
//! scanner/backtest output tables. The loaders are the input-contract
//! boundary; the writers pin the output header contract.

pub mod loaders;
pub mod reports;
