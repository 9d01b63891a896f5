//! Prediction service.
//!
//! Implements the ingest, history, predict and backtest boundaries over a
//! history store and an optional model handle. The model is loaded once,
//! passed in at construction and never mutated, so tests can hand in a mock
//! or `None` per service instance.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backtest::{BacktestResult, BacktestSimulator};
use crate::backtest::runner::DEFAULT_SAMPLE_LIMIT;
use crate::history::{
    HistoryNormalizer, InputOrder, NewestFirst, OldestFirst, RawRecord, Sequence,
};
use crate::model::ModelArtifact;
use crate::predict::{
    EnsembleAdapter, EnsembleOutcome, FeatureExtractor, HeuristicPredictor, ModelPredictor,
    Predictor,
};
use crate::storage::{HistoryStore, StoredRecord};
use crate::types::{PredictError, Prediction};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Request defaults and model input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionSettings {
    pub default_take: usize,
    pub feature_window: usize,
    pub default_backtest_window: usize,
    pub sample_limit: usize,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            default_take: 8,
            feature_window: 8,
            default_backtest_window: 8,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// Where a request's history comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    #[default]
    Storage,
    #[serde(alias = "api")]
    Inline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub source: HistorySource,
    #[serde(default)]
    pub take: Option<usize>,
    #[serde(default, alias = "useModel")]
    pub use_model: bool,
    /// Inline records, in `order`.
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub order: InputOrder,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BacktestRequest {
    #[serde(default)]
    pub window: Option<usize>,
    #[serde(default)]
    pub source: HistorySource,
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub order: InputOrder,
    #[serde(default, alias = "useModel")]
    pub use_model: bool,
}

/// Which predictor produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Heuristic,
    Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub method: Method,
    /// Heuristic prediction; absent when the model answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
    /// Ensemble output, including a failed attempt that was degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensemble: Option<EnsembleOutcome>,
    /// The normalized history the prediction was made from.
    pub recent: Sequence<NewestFirst>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_heads: Vec<&'static str>,
    pub store: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct PredictionService {
    store: Arc<dyn HistoryStore>,
    model: Option<Arc<ModelArtifact>>,
    settings: PredictionSettings,
    normalizer: HistoryNormalizer,
    heuristic: HeuristicPredictor,
}

impl PredictionService {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        model: Option<Arc<ModelArtifact>>,
        settings: PredictionSettings,
    ) -> Self {
        info!(
            store = store.name(),
            model_loaded = model.is_some(),
            feature_window = settings.feature_window,
            "Prediction service ready"
        );
        Self {
            store,
            model,
            settings,
            normalizer: HistoryNormalizer::new(),
            heuristic: HeuristicPredictor::new(),
        }
    }

    pub fn settings(&self) -> &PredictionSettings {
        &self.settings
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            status: "ok",
            model_loaded: self.model.is_some(),
            model_heads: self.model.as_ref().map(|m| m.head_names()).unwrap_or_default(),
            store: self.store.name().to_string(),
        }
    }

    /// Append raw records to the store. Returns how many were stored.
    pub async fn ingest(&self, records: &[RawRecord]) -> Result<usize, ServiceError> {
        let stored = self.store.append(records).await?;
        info!(received = records.len(), stored, "Ingested history records");
        Ok(stored)
    }

    /// Up to `take` most recent stored rows.
    pub async fn history(
        &self,
        take: Option<usize>,
    ) -> Result<Sequence<NewestFirst, StoredRecord>, ServiceError> {
        let take = take.unwrap_or(self.settings.default_take);
        Ok(self.store.recent(take).await?)
    }

    /// Predict the next outcome.
    ///
    /// Uses the model when asked for and loaded; otherwise, or when model
    /// scoring fails, the heuristic answers and `method` says so.
    pub async fn predict(&self, req: &PredictRequest) -> Result<PredictResponse, ServiceError> {
        let take = req.take.unwrap_or(self.settings.default_take);
        let recent = self.recent_history(req.source, take, &req.records, req.order).await?;
        if recent.is_empty() {
            return Err(PredictError::NoHistoryAvailable.into());
        }

        let mut ensemble = None;
        if req.use_model {
            match &self.model {
                Some(model) => {
                    let features = FeatureExtractor::new(self.settings.feature_window).extract(&recent);
                    let outcome = EnsembleAdapter::new(Arc::clone(model)).score(&features);
                    if !outcome.is_failed() {
                        debug!(observations = recent.len(), "Model prediction");
                        return Ok(PredictResponse {
                            method: Method::Model,
                            prediction: None,
                            ensemble: Some(outcome),
                            recent,
                        });
                    }
                    warn!("Model scoring failed, degrading to heuristic");
                    ensemble = Some(outcome);
                }
                None => debug!("Model requested but none loaded, using heuristic"),
            }
        }

        let prediction = self.heuristic.predict(&recent)?;
        Ok(PredictResponse {
            method: Method::Heuristic,
            prediction: Some(prediction),
            ensemble,
            recent,
        })
    }

    /// Replay a predictor over the selected history.
    pub async fn backtest(&self, req: &BacktestRequest) -> Result<BacktestResult, ServiceError> {
        let window = req.window.unwrap_or(self.settings.default_backtest_window);
        let history = self.full_history(req.source, &req.records, req.order).await?;

        let simulator = BacktestSimulator::new(window).with_sample_limit(self.settings.sample_limit);
        let result = match (&self.model, req.use_model) {
            (Some(model), true) => {
                let predictor = ModelPredictor::new(
                    Arc::clone(model),
                    FeatureExtractor::new(self.settings.feature_window),
                );
                simulator.run(&predictor, &history)?
            }
            _ => simulator.run(&self.heuristic, &history)?,
        };
        Ok(result)
    }

    async fn recent_history(
        &self,
        source: HistorySource,
        take: usize,
        records: &[RawRecord],
        order: InputOrder,
    ) -> Result<Sequence<NewestFirst>, ServiceError> {
        match source {
            HistorySource::Storage => {
                let rows = self.store.recent(take).await?;
                Ok(self.normalizer.normalize_sequence(&rows.map(|r| r.to_raw())))
            }
            HistorySource::Inline => {
                let mut seq = self.normalizer.normalize(records, order);
                seq.truncate(take);
                Ok(seq)
            }
        }
    }

    async fn full_history(
        &self,
        source: HistorySource,
        records: &[RawRecord],
        order: InputOrder,
    ) -> Result<Sequence<OldestFirst>, ServiceError> {
        let newest_first = match source {
            HistorySource::Storage => {
                let rows = self.store.all().await?;
                self.normalizer.normalize_sequence(&rows.map(|r| r.to_raw()))
            }
            HistorySource::Inline => self.normalizer.normalize(records, order),
        };
        Ok(newest_first.into_oldest_first())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
