//! Arbitrage core.
//!
//! The pipeline in here is deliberately pure and synchronous: the
//! bound mathematics (`conditions`), per-pair admissibility
//! (`strategy`), the cross-market join (`scanner`) and settlement
//! payoffs (`payoffs`) all work on in-memory tables and own no I/O.

pub mod conditions;
pub mod strategy;
pub mod scanner;
pub mod payoffs;
