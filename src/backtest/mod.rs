//! Historical backtesting.
//!
//! Replays a predictor over an oldest-first history with a sliding window
//! and scores its size calls against what actually came next.

pub mod runner;

pub use runner::{BacktestResult, BacktestSample, BacktestSimulator};
