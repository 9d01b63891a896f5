//! JSON-lines history file.
//!
//! Each line is one serialized [`StoredRecord`]. Appends are serialized
//! through an async mutex; corrupt lines are skipped on read.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{rows_from_raw, HistoryStore, StoredRecord};
use crate::history::{NewestFirst, OldestFirst, RawRecord, Sequence};

/// Default history file path.
pub const DEFAULT_HISTORY_FILE: &str = "data/history.jsonl";

pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(path = %path.display(), "Using JSON-lines history store");
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_rows(&self) -> Result<Vec<StoredRecord>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!(path = %self.path.display(), "No history file yet");
            return Ok(Vec::new());
        }

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read history from {}", self.path.display()))?;

        let mut rows = Vec::new();
        for (line_num, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredRecord>(line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "Skipping corrupt history line"
                    );
                }
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn append(&self, records: &[RawRecord]) -> Result<usize> {
        let rows = rows_from_raw(records, Utc::now());
        if rows.is_empty() {
            return Ok(0);
        }

        let mut buf = String::new();
        for row in &rows {
            buf.push_str(&serde_json::to_string(row).context("Failed to serialize history row")?);
            buf.push('\n');
        }

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open history file {}", self.path.display()))?;
        file.write_all(buf.as_bytes())
            .await
            .context("Failed to write history rows")?;
        file.flush().await.context("Failed to flush history file")?;

        debug!(path = %self.path.display(), stored = rows.len(), "History appended");
        Ok(rows.len())
    }

    async fn recent(&self, take: usize) -> Result<Sequence<NewestFirst, StoredRecord>> {
        let mut rows = self.all().await?.into_newest_first();
        rows.truncate(take);
        Ok(rows)
    }

    async fn all(&self) -> Result<Sequence<OldestFirst, StoredRecord>> {
        Ok(Sequence::new(self.read_rows().await?))
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
