//! Adapter from model heads to prediction-shaped output.
//!
//! Each head is optional. Scoring failures never escape the adapter: they
//! come back as `EnsembleOutcome::Failed` together with whatever heads were
//! scored before the failure.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::features::{FeatureExtractor, FeatureVector};
use super::heuristic::HeuristicPredictor;
use super::Predictor;
use crate::history::{NewestFirst, Sequence};
use crate::model::{ModelArtifact, ScoringHead};
use crate::types::{Color, PredictError, Prediction, ScoringError, Size};

/// Positive-class probability above which the size head says Big.
pub const BIG_PROBABILITY: f64 = 0.5;

/// How many number candidates the number head reports.
pub const TOP_NUMBERS: usize = 3;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeEstimate {
    pub label: Size,
    /// Probability of Big.
    pub prob: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorEstimate {
    pub label: Color,
    pub prob: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberEstimate {
    pub n: u8,
    pub prob: f64,
}

/// Per-head results. Absent heads are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnsembleOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<ColorEstimate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_numbers: Option<Vec<NumberEstimate>>,
}

impl EnsembleOutput {
    /// Highest-probability color, if the color head ran.
    pub fn best_color(&self) -> Option<Color> {
        let colors = self.color.as_ref()?;
        let mut best: Option<&ColorEstimate> = None;
        for estimate in colors {
            match best {
                Some(b) if estimate.prob <= b.prob => {}
                _ => best = Some(estimate),
            }
        }
        best.map(|e| e.label)
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.color.is_none() && self.top_numbers.is_none()
    }
}

/// Result of scoring: either every present head succeeded, or one failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnsembleOutcome {
    Scored(EnsembleOutput),
    Failed {
        error: String,
        partial: EnsembleOutput,
    },
}

impl EnsembleOutcome {
    pub fn output(&self) -> &EnsembleOutput {
        match self {
            EnsembleOutcome::Scored(output) => output,
            EnsembleOutcome::Failed { partial, .. } => partial,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EnsembleOutcome::Failed { .. })
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Scores a feature vector with every head a model artifact exposes.
pub struct EnsembleAdapter {
    model: Arc<ModelArtifact>,
}

impl EnsembleAdapter {
    pub fn new(model: Arc<ModelArtifact>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ModelArtifact {
        &self.model
    }

    /// Score `features`. Never panics or propagates a scoring failure.
    pub fn score(&self, features: &FeatureVector) -> EnsembleOutcome {
        let mut output = EnsembleOutput::default();
        match self.score_into(features.as_slice(), &mut output) {
            Ok(()) => {
                debug!(heads = ?self.model.head_names(), "Ensemble scored");
                EnsembleOutcome::Scored(output)
            }
            Err(e) => {
                warn!(error = %e, "Ensemble scoring failed");
                EnsembleOutcome::Failed {
                    error: e.to_string(),
                    partial: output,
                }
            }
        }
    }

    fn score_into(&self, x: &[f64], out: &mut EnsembleOutput) -> Result<(), ScoringError> {
        match self.model.as_ref() {
            ModelArtifact::Single(head) => {
                out.size = Some(score_size(head.as_ref(), x)?);
            }
            ModelArtifact::Ensemble { size, color, number } => {
                if let Some(head) = size {
                    out.size = Some(score_size(head.as_ref(), x)?);
                }
                if let Some(head) = color {
                    out.color = Some(score_color(head.as_ref(), x)?);
                }
                if let Some(head) = number {
                    out.top_numbers = Some(score_numbers(head.as_ref(), x)?);
                }
            }
        }
        Ok(())
    }
}

fn probabilities(
    head: &dyn ScoringHead,
    name: &str,
    x: &[f64],
    expected: usize,
) -> Result<Vec<f64>, ScoringError> {
    let p = head.predict_proba(x)?;
    if p.len() != expected {
        return Err(ScoringError::OutputShape {
            head: name.to_string(),
            expected,
            actual: p.len(),
        });
    }
    if p.iter().any(|v| !v.is_finite()) {
        return Err(ScoringError::NonFinite {
            head: name.to_string(),
        });
    }
    Ok(p)
}

fn score_size(head: &dyn ScoringHead, x: &[f64]) -> Result<SizeEstimate, ScoringError> {
    let p = probabilities(head, "size", x, 2)?;
    let label = if p[1] > BIG_PROBABILITY { Size::Big } else { Size::Small };
    Ok(SizeEstimate { label, prob: p[1] })
}

fn score_color(head: &dyn ScoringHead, x: &[f64]) -> Result<Vec<ColorEstimate>, ScoringError> {
    let p = probabilities(head, "color", x, Color::ALL.len())?;
    Ok(Color::ALL
        .iter()
        .zip(p)
        .map(|(&label, prob)| ColorEstimate { label, prob })
        .collect())
}

fn score_numbers(head: &dyn ScoringHead, x: &[f64]) -> Result<Vec<NumberEstimate>, ScoringError> {
    let p = probabilities(head, "number", x, 10)?;
    let mut ranked: Vec<(usize, f64)> = p.into_iter().enumerate().collect();
    // Descending probability; equal probabilities put the higher digit first.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.0.cmp(&a.0)));
    Ok(ranked
        .into_iter()
        .take(TOP_NUMBERS)
        .map(|(n, prob)| NumberEstimate { n: n as u8, prob })
        .collect())
}

// ---------------------------------------------------------------------------
// Model-backed predictor
// ---------------------------------------------------------------------------

/// Collapses ensemble output into a `Prediction` so a model can be
/// backtested like the heuristic. Falls back to the heuristic whenever
/// the size head is missing or scoring fails.
pub struct ModelPredictor {
    adapter: EnsembleAdapter,
    extractor: FeatureExtractor,
    fallback: HeuristicPredictor,
}

impl ModelPredictor {
    pub fn new(model: Arc<ModelArtifact>, extractor: FeatureExtractor) -> Self {
        Self {
            adapter: EnsembleAdapter::new(model),
            extractor,
            fallback: HeuristicPredictor::new(),
        }
    }
}

impl Predictor for ModelPredictor {
    fn predict(&self, window: &Sequence<NewestFirst>) -> Result<Prediction, PredictError> {
        let features = self.extractor.extract(window);
        let outcome = self.adapter.score(&features);

        let size = match &outcome {
            EnsembleOutcome::Scored(output) => output.size.as_ref().map(|s| s.label),
            EnsembleOutcome::Failed { .. } => None,
        };
        let Some(size) = size else {
            return self.fallback.predict(window);
        };

        let color = match outcome.output().best_color() {
            Some(c) => c,
            None => self
                .fallback
                .predict(window)
                .map(|p| p.color)
                .unwrap_or(Color::Red),
        };
        Ok(Prediction::new(size, color))
    }

    fn name(&self) -> &'static str {
        "model"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
