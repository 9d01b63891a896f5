//! Shared types for Sizecast.
//!
//! These types form the data model used across all modules: the canonical
//! `Observation`, the derived `Size` and `Color` categories, the `Prediction`
//! shape every predictor returns, and the domain error enums.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// Binary category derived from a drawn number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Size {
    Big,
    Small,
}

impl Size {
    /// Numbers at or above this threshold are `Big`.
    pub const BIG_THRESHOLD: i64 = 5;

    /// Derive the size of a number. Never stored, always recomputed.
    pub fn of(number: i64) -> Self {
        if number >= Self::BIG_THRESHOLD {
            Size::Big
        } else {
            Size::Small
        }
    }

    /// The opposite size.
    pub fn opposite(&self) -> Self {
        match self {
            Size::Big => Size::Small,
            Size::Small => Size::Big,
        }
    }

    /// Fixed candidate numbers suggested for this size.
    pub fn candidate_numbers(&self) -> [u8; 3] {
        match self {
            Size::Small => [1, 2, 3],
            Size::Big => [6, 7, 8],
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Big => write!(f, "Big"),
            Size::Small => write!(f, "Small"),
        }
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// The three recognized color tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Red,
    Green,
    Violet,
}

impl Color {
    /// Class order used by color scoring heads.
    pub const ALL: [Color; 3] = [Color::Red, Color::Green, Color::Violet];

    /// Match a normalized (lower-case, trimmed) tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "red" => Some(Color::Red),
            "green" => Some(Color::Green),
            "violet" => Some(Color::Violet),
            _ => None,
        }
    }

    /// Lower-case tag as it appears in normalized observations.
    pub fn tag(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Violet => "violet",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "Red"),
            Color::Green => write!(f, "Green"),
            Color::Violet => write!(f, "Violet"),
        }
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One past game outcome, as produced by the normalizer.
///
/// `number` is `None` when the raw record carried no usable integer.
/// `colors` holds lower-case, trimmed, non-empty tags, unknown tags included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub number: Option<i64>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(rename = "issue", default)]
    pub issue_id: Option<String>,
}

impl Observation {
    /// Build an observation from a number and color tags.
    pub fn new(number: i64, colors: &[&str]) -> Self {
        Self {
            number: Some(number),
            colors: colors.iter().map(|c| c.to_string()).collect(),
            issue_id: None,
        }
    }

    /// Derived size, if the number is known.
    pub fn size(&self) -> Option<Size> {
        self.number.map(Size::of)
    }

    /// Whether this observation carries the given color tag.
    pub fn has_color(&self, color: Color) -> bool {
        self.colors.iter().any(|c| c == color.tag())
    }

    /// Recognized colors only, in tag order.
    pub fn known_colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.colors.iter().filter_map(|c| Color::from_tag(c))
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let number = self
            .number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        let issue = self.issue_id.as_deref().unwrap_or("-");
        write!(f, "#{issue} {number} [{}]", self.colors.join(","))
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// Predicted next outcome.
///
/// `numbers` is always `size.candidate_numbers()`; construct through
/// [`Prediction::new`] to keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub size: Size,
    pub color: Color,
    pub numbers: [u8; 3],
}

impl Prediction {
    pub fn new(size: Size, color: Color) -> Self {
        Self {
            size,
            color,
            numbers: size.candidate_numbers(),
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {:?}",
            self.size, self.color, self.numbers
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Window- and history-level failures. These are hard failures reported to
/// the caller with the count that was actually available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictError {
    #[error("Insufficient window: need at least 2 observations with numbers, have {usable}")]
    InsufficientWindow { usable: usize },

    #[error("Not enough history for backtest: window {window} needs more than {window} observations, have {available}")]
    InsufficientHistory { window: usize, available: usize },

    #[error("No history available")]
    NoHistoryAvailable,
}

impl PredictError {
    /// The number of observations that were actually available, when known.
    pub fn available(&self) -> Option<usize> {
        match self {
            PredictError::InsufficientWindow { usable } => Some(*usable),
            PredictError::InsufficientHistory { available, .. } => Some(*available),
            PredictError::NoHistoryAvailable => Some(0),
        }
    }
}

/// A raw number field that could not be coerced to an integer.
/// Record-level only: the normalizer turns it into a null number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot coerce {raw} to an integer")]
pub struct ParseError {
    pub raw: String,
}

/// Failure while scoring a feature vector with a model head.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("Feature shape mismatch: head expects {expected} features, got {actual}")]
    FeatureShape { expected: usize, actual: usize },

    #[error("{head} head returned {actual} probabilities, expected {expected}")]
    OutputShape {
        head: String,
        expected: usize,
        actual: usize,
    },

    #[error("{head} head returned a non-finite probability")]
    NonFinite { head: String },

    #[error("Model error: {0}")]
    Model(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
