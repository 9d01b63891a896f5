//! Fixed-length feature vectors for model scoring.
//!
//! Layout for window size `W` (`2W + 5` values):
//! - `W` most recent numbers, padded with `-1`. A real `-1` reads the same
//!   in this block; `FeatureVector::is_padding` tells them apart by position.
//! - `W` size flags (1 = Big, 0 = Small or padding)
//! - red count, green count, violet count, last number, streak length

use serde::Serialize;

use crate::history::{NewestFirst, Sequence};
use crate::types::{Color, Size};

/// Sentinel for window positions without a real number.
pub const PAD: f64 = -1.0;

/// Number of trailing summary features after the two per-position blocks.
pub const SUMMARY_FEATURES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub window: usize,
    pub values: Vec<f64>,
    /// Per window position: whether the number block holds a real number.
    /// Not part of the model input.
    #[serde(skip)]
    pub present: Vec<bool>,
}

impl FeatureVector {
    /// Total length for a given window size.
    pub fn len_for(window: usize) -> usize {
        2 * window + SUMMARY_FEATURES
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// The padded number block.
    pub fn numbers(&self) -> &[f64] {
        &self.values[..self.window]
    }

    /// Whether number position `i` is padding (beyond the history or a
    /// null number). Decided by position, so a real `-1` is not padding.
    pub fn is_padding(&self, i: usize) -> bool {
        !self.present.get(i).copied().unwrap_or(false)
    }

    /// The size-flag block.
    pub fn size_flags(&self) -> &[f64] {
        &self.values[self.window..2 * self.window]
    }

    /// Trailing `[red, green, violet, last_number, streak]`.
    pub fn summary(&self) -> &[f64] {
        &self.values[2 * self.window..]
    }
}

/// Builds `FeatureVector`s from most-recent-first windows.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    window: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self { window: 8 }
    }
}

impl FeatureExtractor {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Extract features from the first `W` observations of `history`.
    pub fn extract(&self, history: &Sequence<NewestFirst>) -> FeatureVector {
        let w = self.window;
        let recent = &history.as_slice()[..history.len().min(w)];

        let mut numbers: Vec<f64> = recent
            .iter()
            .map(|o| o.number.map(|n| n as f64).unwrap_or(PAD))
            .collect();
        numbers.resize(w, PAD);

        // Flags come from the observations, not the padded block, so a real
        // number equal to PAD is still flagged by its own size.
        let mut sizes: Vec<f64> = recent
            .iter()
            .map(|o| if o.size() == Some(Size::Big) { 1.0 } else { 0.0 })
            .collect();
        sizes.resize(w, 0.0);

        let count = |color: Color| {
            recent
                .iter()
                .flat_map(|o| o.known_colors())
                .filter(|c| *c == color)
                .count() as f64
        };

        let real: Vec<i64> = recent.iter().filter_map(|o| o.number).collect();
        let last_number = real.first().map(|&n| n as f64).unwrap_or(PAD);
        let streak = streak_length(&real) as f64;

        let mut values = Vec::with_capacity(FeatureVector::len_for(w));
        values.extend(numbers);
        values.extend(sizes);
        values.extend([
            count(Color::Red),
            count(Color::Green),
            count(Color::Violet),
            last_number,
            streak,
        ]);

        let mut present: Vec<bool> = recent.iter().map(|o| o.number.is_some()).collect();
        present.resize(w, false);

        FeatureVector {
            window: w,
            values,
            present,
        }
    }
}

/// Count of leading numbers sharing the size of the first one.
/// Zero for an empty slice, otherwise at least one.
pub fn streak_length(newest_first: &[i64]) -> usize {
    let Some(&first) = newest_first.first() else {
        return 0;
    };
    let size = Size::of(first);
    newest_first
        .iter()
        .take_while(|&&n| Size::of(n) == size)
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
