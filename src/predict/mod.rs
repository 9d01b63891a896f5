//! Prediction from a most-recent-first window of observations.
//!
//! Defines the `Predictor` trait shared by the rule engine and the
//! model-backed predictor, so the backtest can replay either one.

pub mod ensemble;
pub mod features;
pub mod heuristic;

use crate::history::{NewestFirst, Sequence};
use crate::types::{PredictError, Prediction};

pub use ensemble::{EnsembleAdapter, EnsembleOutcome, EnsembleOutput, ModelPredictor};
pub use features::{FeatureExtractor, FeatureVector};
pub use heuristic::HeuristicPredictor;

/// Abstraction over anything that maps a window to a `Prediction`.
///
/// Implementors must be pure over their input: the same window always
/// yields the same prediction.
pub trait Predictor: Send + Sync {
    /// Predict the next outcome from a most-recent-first window.
    fn predict(&self, window: &Sequence<NewestFirst>) -> Result<Prediction, PredictError>;

    /// Identifier reported in results ("heuristic", "model").
    fn name(&self) -> &'static str;
}

/// Most frequent item; ties go to whichever value was seen first.
pub(crate) fn majority<T, I>(items: I) -> Option<T>
where
    T: PartialEq,
    I: IntoIterator<Item = T>,
{
    let mut counts: Vec<(T, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| *seen == item) {
            Some((_, count)) => *count += 1,
            None => counts.push((item, 1)),
        }
    }

    let mut best: Option<(T, usize)> = None;
    for (item, count) in counts {
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((item, count)),
        }
    }
    best.map(|(item, _)| item)
}
