//! Deterministic rule-based predictor.
//!
//! Size: two equal newest sizes revert to the opposite size, otherwise the
//! window majority wins (first seen from newest breaks ties).
//! Color: red on the newest draw after a double Big reverts to green,
//! otherwise the most frequent recognized color, defaulting to red.

use tracing::debug;

use super::{majority, Predictor};
use crate::history::{NewestFirst, Sequence};
use crate::types::{Color, PredictError, Prediction, Size};

/// Minimum number of observations with numbers needed to predict.
pub const MIN_USABLE: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPredictor;

impl HeuristicPredictor {
    pub fn new() -> Self {
        Self
    }
}

impl Predictor for HeuristicPredictor {
    fn predict(&self, window: &Sequence<NewestFirst>) -> Result<Prediction, PredictError> {
        let sizes: Vec<Size> = window.iter().filter_map(|o| o.size()).collect();
        if sizes.len() < MIN_USABLE {
            return Err(PredictError::InsufficientWindow { usable: sizes.len() });
        }

        let double_big = sizes[0] == Size::Big && sizes[1] == Size::Big;

        let size = if sizes[0] == sizes[1] {
            sizes[0].opposite()
        } else {
            // Non-empty, so a majority always exists.
            majority(sizes.iter().copied()).unwrap_or(sizes[0])
        };

        let newest_is_red = window.newest().map(|o| o.has_color(Color::Red)).unwrap_or(false);
        let color = if newest_is_red && double_big {
            Color::Green
        } else {
            majority(window.iter().flat_map(|o| o.known_colors())).unwrap_or(Color::Red)
        };

        let prediction = Prediction::new(size, color);
        debug!(
            usable = sizes.len(),
            double_big,
            prediction = %prediction,
            "Heuristic prediction"
        );
        Ok(prediction)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
