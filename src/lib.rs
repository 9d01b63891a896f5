//! Sizecast: next-outcome predictor and backtester for number/color draws
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod history;
pub mod predict;
pub mod model;
pub mod backtest;
pub mod storage;
pub mod engine;
pub mod api;
