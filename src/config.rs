//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! `HISTORY_PATH` and `MODEL_PATH` override the file locations at runtime.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::engine::PredictionSettings;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub history_path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelConfig {
    /// Model artifact path. No model is loaded when unset.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PredictionConfig {
    /// Records read from storage when a request gives no `take`.
    pub default_take: usize,
    /// Window size `W` of the feature vector fed to the model.
    pub feature_window: usize,
    /// Backtest window when a request gives none.
    pub default_backtest_window: usize,
    /// Step records kept in a backtest result.
    pub sample_limit: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        let settings = PredictionSettings::default();
        Self {
            default_take: settings.default_take,
            feature_window: settings.feature_window,
            default_backtest_window: settings.default_backtest_window,
            sample_limit: settings.sample_limit,
        }
    }
}

impl From<&PredictionConfig> for PredictionSettings {
    fn from(cfg: &PredictionConfig) -> Self {
        Self {
            default_take: cfg.default_take,
            feature_window: cfg.feature_window,
            default_backtest_window: cfg.default_backtest_window,
            sample_limit: cfg.sample_limit,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// History file path, honouring `HISTORY_PATH`.
    pub fn history_path(&self) -> String {
        std::env::var("HISTORY_PATH").unwrap_or_else(|_| self.storage.history_path.clone())
    }

    /// Model artifact path, honouring `MODEL_PATH`.
    pub fn model_path(&self) -> Option<String> {
        std::env::var("MODEL_PATH").ok().or_else(|| self.model.path.clone())
    }

    pub fn prediction_settings(&self) -> PredictionSettings {
        PredictionSettings::from(&self.prediction)
    }
}
