//! Core engine: the prediction service behind every boundary.
//!
//! Ties together the history store, the normalizer, the predictors and the
//! backtest simulator. Transport layers call into `PredictionService` only.

pub mod service;

pub use service::{
    BacktestRequest, HistorySource, Method, PredictRequest, PredictResponse, PredictionService,
    PredictionSettings, ServiceError, StatusResponse,
};
