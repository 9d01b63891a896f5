//! Statistical model artifacts.
//!
//! Defines the `ScoringHead` trait and the `ModelArtifact` handle that the
//! service loads once at startup and shares read-only between requests.

pub mod linear;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::types::ScoringError;

pub use linear::LinearHead;

/// One independently scored sub-model.
///
/// Returns class probabilities for a single feature vector. Binary heads
/// return `[p(Small), p(Big)]`, color heads `[red, green, violet]`, number
/// heads ten probabilities indexed by digit.
#[cfg_attr(test, mockall::automock)]
pub trait ScoringHead: Send + Sync {
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ScoringError>;
}

/// Shared handle to a scoring head.
pub type SharedHead = Arc<dyn ScoringHead>;

/// A loaded model: either up to three named heads, or a single binary
/// classifier that only predicts size.
#[derive(Clone)]
pub enum ModelArtifact {
    Ensemble {
        size: Option<SharedHead>,
        color: Option<SharedHead>,
        number: Option<SharedHead>,
    },
    Single(SharedHead),
}

impl ModelArtifact {
    /// Names of the heads present, for status reporting and logs.
    pub fn head_names(&self) -> Vec<&'static str> {
        match self {
            ModelArtifact::Ensemble { size, color, number } => {
                let mut names = Vec::new();
                if size.is_some() {
                    names.push("size");
                }
                if color.is_some() {
                    names.push("color");
                }
                if number.is_some() {
                    names.push("number");
                }
                names
            }
            ModelArtifact::Single(_) => vec!["size"],
        }
    }
}

impl std::fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelArtifact::Ensemble { .. } => {
                write!(f, "ModelArtifact::Ensemble({:?})", self.head_names())
            }
            ModelArtifact::Single(_) => write!(f, "ModelArtifact::Single"),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact file format
// ---------------------------------------------------------------------------

/// On-disk JSON layout of a model artifact.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
    Single(SingleFile),
    Ensemble(EnsembleFile),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SingleFile {
    single: LinearHead,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnsembleFile {
    #[serde(default)]
    size: Option<LinearHead>,
    #[serde(default)]
    color: Option<LinearHead>,
    #[serde(default, alias = "num")]
    number: Option<LinearHead>,
}

impl From<ArtifactFile> for ModelArtifact {
    fn from(file: ArtifactFile) -> Self {
        fn share(head: LinearHead) -> SharedHead {
            Arc::new(head)
        }
        match file {
            ArtifactFile::Single(SingleFile { single }) => ModelArtifact::Single(share(single)),
            ArtifactFile::Ensemble(EnsembleFile { size, color, number }) => {
                ModelArtifact::Ensemble {
                    size: size.map(share),
                    color: color.map(share),
                    number: number.map(share),
                }
            }
        }
    }
}

/// Parse a model artifact from JSON text.
///
/// Unknown keys are rejected, and so is an artifact without any head.
pub fn parse_model(json: &str) -> Result<ModelArtifact> {
    let file: ArtifactFile = serde_json::from_str(json).context(
        "Failed to parse model artifact: expected {\"single\"} or any of {\"size\", \"color\", \"number\"}",
    )?;
    let heads = file.heads();
    if heads.is_empty() {
        bail!("Model artifact has no heads");
    }
    for head in heads {
        head.validate()?;
    }
    Ok(file.into())
}

impl ArtifactFile {
    fn heads(&self) -> Vec<&LinearHead> {
        match self {
            ArtifactFile::Single(file) => vec![&file.single],
            ArtifactFile::Ensemble(file) => [&file.size, &file.color, &file.number]
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

/// Load a model artifact from disk.
///
/// Returns `None` when the file is missing or unusable: model-dependent
/// behaviour then degrades to the heuristic instead of stopping the process.
pub fn load_model(path: &str) -> Option<Arc<ModelArtifact>> {
    if !Path::new(path).exists() {
        info!(path, "No model artifact found, running heuristic-only");
        return None;
    }

    match read_model(path) {
        Ok(model) => {
            info!(path, heads = ?model.head_names(), "Model artifact loaded");
            Some(Arc::new(model))
        }
        Err(e) => {
            error!(path, error = %format!("{e:#}"), "Failed to load model artifact, running heuristic-only");
            None
        }
    }
}

fn read_model(path: &str) -> Result<ModelArtifact> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model artifact from {path}"))?;
    parse_model(&json)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
