//! Sliding-window backtest engine.
//!
//! For every position `i` from `window` to `N - 1`, the predictor sees the
//! `window` observations before `i` (newest first) and its size call is
//! compared with the size of observation `i`.

use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::history::{OldestFirst, Sequence};
use crate::predict::heuristic::MIN_USABLE;
use crate::predict::Predictor;
use crate::types::{Observation, PredictError, Prediction};

/// Default number of step records kept in a result.
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// Backtest results
// ---------------------------------------------------------------------------

/// Aggregate accuracy of one backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub predictor: &'static str,
    pub window: usize,
    /// `hits / total`, `None` when nothing was scored.
    pub accuracy: Option<f64>,
    pub total: usize,
    pub hits: usize,
    /// The most recent step records, in position order.
    pub samples: Vec<BacktestSample>,
}

/// One scored step.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestSample {
    /// Position of `actual` in the oldest-first history.
    pub index: usize,
    pub predicted: Prediction,
    pub actual: Observation,
    pub hit: bool,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct BacktestSimulator {
    window: usize,
    sample_limit: usize,
}

impl BacktestSimulator {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }

    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Run `predictor` over `history`.
    ///
    /// Observations without a number cannot be scored and are dropped first.
    /// Each step reads only its own slice of the history.
    pub fn run(
        &self,
        predictor: &dyn Predictor,
        history: &Sequence<OldestFirst>,
    ) -> Result<BacktestResult, PredictError> {
        if self.window < MIN_USABLE {
            return Err(PredictError::InsufficientWindow { usable: self.window });
        }

        let mut usable = history.clone();
        usable.retain(|o| o.number.is_some());
        let dropped = history.len() - usable.len();
        if dropped > 0 {
            debug!(dropped, "Dropped observations without numbers from backtest history");
        }

        let n = usable.len();
        if n <= self.window {
            return Err(PredictError::InsufficientHistory {
                window: self.window,
                available: n,
            });
        }

        let mut hits = 0usize;
        let mut total = 0usize;
        let mut samples: VecDeque<BacktestSample> = VecDeque::with_capacity(self.sample_limit);

        for i in self.window..n {
            let window = usable.window_before(i, self.window);
            let actual = &usable.as_slice()[i];
            let predicted = predictor.predict(&window)?;

            let hit = actual.size() == Some(predicted.size);
            hits += usize::from(hit);
            total += 1;

            if self.sample_limit > 0 {
                if samples.len() == self.sample_limit {
                    samples.pop_front();
                }
                samples.push_back(BacktestSample {
                    index: i,
                    predicted,
                    actual: actual.clone(),
                    hit,
                });
            }
        }

        let accuracy = if total > 0 {
            Some(hits as f64 / total as f64)
        } else {
            None
        };

        info!(
            predictor = predictor.name(),
            window = self.window,
            total,
            hits,
            accuracy = ?accuracy,
            "Backtest complete"
        );

        Ok(BacktestResult {
            predictor: predictor.name(),
            window: self.window,
            accuracy,
            total,
            hits,
            samples: samples.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::NewestFirst;
    use crate::predict::HeuristicPredictor;
    use crate::types::{Color, Size};

    fn history(numbers: &[i64]) -> Sequence<OldestFirst> {
        Sequence::new(numbers.iter().map(|&n| Observation::new(n, &[])).collect())
    }

    /// Always predicts the same size.
    struct Constant(Size);

    impl Predictor for Constant {
        fn predict(&self, _window: &Sequence<NewestFirst>) -> Result<Prediction, PredictError> {
            Ok(Prediction::new(self.0, Color::Red))
        }

        fn name(&self) -> &'static str {
            "constant"
        }
    }

    /// Records the numbers of every window it sees.
    struct Recorder(std::sync::Mutex<Vec<Vec<i64>>>);

    impl Predictor for Recorder {
        fn predict(&self, window: &Sequence<NewestFirst>) -> Result<Prediction, PredictError> {
            let numbers = window.iter().filter_map(|o| o.number).collect();
            self.0.lock().unwrap().push(numbers);
            Ok(Prediction::new(Size::Big, Color::Red))
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[test]
    fn test_ten_observations_window_eight() {
        let h = history(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 0]);
        let result = BacktestSimulator::new(8).run(&HeuristicPredictor::new(), &h).unwrap();
        assert_eq!(result.total, 2);
        assert!(result.hits <= result.total);
        assert_eq!(result.samples.len(), 2);
        assert_eq!(result.samples[0].index, 8);
        assert_eq!(result.samples[1].index, 9);
    }

    #[test]
    fn test_insufficient_history() {
        let h = history(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let err = BacktestSimulator::new(8).run(&HeuristicPredictor::new(), &h).unwrap_err();
        assert_eq!(err, PredictError::InsufficientHistory { window: 8, available: 8 });
    }

    #[test]
    fn test_windows_are_newest_first_and_exclude_target() {
        let h = history(&[0, 1, 2, 3, 4, 5]);
        let recorder = Recorder(std::sync::Mutex::new(Vec::new()));
        BacktestSimulator::new(3).run(&recorder, &h).unwrap();
        let seen = recorder.0.into_inner().unwrap();
        assert_eq!(seen, vec![vec![2, 1, 0], vec![3, 2, 1], vec![4, 3, 2]]);
    }

    #[test]
    fn test_accuracy_is_hits_over_total() {
        // Targets at positions 2..6: 7, 1, 8, 9 -> three Big.
        let h = history(&[5, 5, 7, 1, 8, 9]);
        let result = BacktestSimulator::new(2).run(&Constant(Size::Big), &h).unwrap();
        assert_eq!(result.total, 4);
        assert_eq!(result.hits, 3);
        assert_eq!(result.accuracy, Some(0.75));
        assert_eq!(result.predictor, "constant");
    }

    #[test]
    fn test_heuristic_scores_known_sequence() {
        // Runs of two: doubles revert, mixed windows keep the newest size.
        let h = history(&[1, 2, 7, 8, 3, 4, 9, 6]);
        let result = BacktestSimulator::new(2).run(&HeuristicPredictor::new(), &h).unwrap();
        assert_eq!(result.total, 6);
        assert_eq!(result.hits, 6);
        assert_eq!(result.accuracy, Some(1.0));

        // Runs of three break the reversion rule on every third draw.
        let h = history(&[1, 2, 3, 7, 8, 9, 0]);
        let result = BacktestSimulator::new(2).run(&HeuristicPredictor::new(), &h).unwrap();
        let hits: Vec<bool> = result.samples.iter().map(|s| s.hit).collect();
        assert_eq!(hits, vec![false, true, true, false, true]);
    }

    #[test]
    fn test_samples_bounded_to_most_recent() {
        let numbers: Vec<i64> = (0..40).map(|i| i % 10).collect();
        let result = BacktestSimulator::new(4)
            .run(&HeuristicPredictor::new(), &history(&numbers))
            .unwrap();
        assert_eq!(result.total, 36);
        assert_eq!(result.samples.len(), DEFAULT_SAMPLE_LIMIT);
        let indices: Vec<usize> = result.samples.iter().map(|s| s.index).collect();
        assert_eq!(indices, (30..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_custom_sample_limit() {
        let numbers: Vec<i64> = (0..20).map(|i| i % 10).collect();
        let result = BacktestSimulator::new(4)
            .with_sample_limit(0)
            .run(&Constant(Size::Small), &history(&numbers))
            .unwrap();
        assert_eq!(result.total, 16);
        assert!(result.samples.is_empty());
    }

    #[test]
    fn test_null_numbers_dropped_before_counting() {
        let mut items: Vec<Observation> = [1, 2, 3].iter().map(|&n| Observation::new(n, &[])).collect();
        items.insert(1, Observation { number: None, colors: vec![], issue_id: None });
        let h: Sequence<OldestFirst> = Sequence::new(items);

        let err = BacktestSimulator::new(3).run(&Constant(Size::Big), &h).unwrap_err();
        assert_eq!(err, PredictError::InsufficientHistory { window: 3, available: 3 });

        let result = BacktestSimulator::new(2).run(&Constant(Size::Big), &h).unwrap();
        assert_eq!(result.total, 1);
    }

    #[test]
    fn test_huge_window_is_insufficient_history() {
        let h = history(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 0]);
        let err = BacktestSimulator::new(usize::MAX).run(&Constant(Size::Big), &h).unwrap_err();
        assert_eq!(
            err,
            PredictError::InsufficientHistory { window: usize::MAX, available: 10 }
        );
    }

    #[test]
    fn test_window_too_small_for_heuristic() {
        let h = history(&[1, 2, 3, 4]);
        let err = BacktestSimulator::new(1).run(&HeuristicPredictor::new(), &h).unwrap_err();
        assert_eq!(err, PredictError::InsufficientWindow { usable: 1 });
    }

    #[test]
    fn test_total_and_hits_invariants() {
        for n in 3..15usize {
            let numbers: Vec<i64> = (0..n as i64).map(|i| (i * 7) % 10).collect();
            for w in 2..n {
                let result = BacktestSimulator::new(w)
                    .run(&HeuristicPredictor::new(), &history(&numbers))
                    .unwrap();
                assert_eq!(result.total, n - w);
                assert!(result.hits <= result.total);
                assert_eq!(result.accuracy, Some(result.hits as f64 / result.total as f64));
            }
        }
    }
}
