//! Multinomial logistic scoring head.

use anyhow::{bail, Result};
use serde::Deserialize;

use super::ScoringHead;
use crate::types::ScoringError;

/// Linear model with a softmax output: one weight row and bias per class.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearHead {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl LinearHead {
    /// Number of output classes.
    pub fn classes(&self) -> usize {
        self.weights.len()
    }

    /// Number of input features expected.
    pub fn features(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    /// Check the parameter shapes are consistent.
    pub fn validate(&self) -> Result<()> {
        if self.weights.is_empty() {
            bail!("Linear head has no classes");
        }
        if self.bias.len() != self.weights.len() {
            bail!(
                "Linear head has {} weight rows but {} biases",
                self.weights.len(),
                self.bias.len()
            );
        }
        let width = self.features();
        if self.weights.iter().any(|row| row.len() != width) {
            bail!("Linear head has ragged weight rows");
        }
        Ok(())
    }
}

impl ScoringHead for LinearHead {
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ScoringError> {
        if features.len() != self.features() {
            return Err(ScoringError::FeatureShape {
                expected: self.features(),
                actual: features.len(),
            });
        }

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();

        Ok(softmax(&logits))
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
