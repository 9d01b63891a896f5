//! Persistence layer.
//!
//! History is an append-only log of flat rows, one per observation, stamped
//! with the ingest time. Rows keep the raw number text; coercion happens
//! when history is read back through the normalizer.

pub mod jsonl;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::history::normalizer::{
    coerce_number, extract_colors, lookup, COLOR_FIELDS, ISSUE_FIELDS, NUMBER_FIELDS,
};
use crate::history::{NewestFirst, OldestFirst, RawRecord, Sequence};

pub use jsonl::JsonlHistoryStore;

// ---------------------------------------------------------------------------
// Stored rows
// ---------------------------------------------------------------------------

/// One persisted history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "issueNumber", default)]
    pub issue_number: String,
    /// Raw number text as received; may not parse.
    pub number: Option<String>,
    /// Comma-joined color tags.
    #[serde(default)]
    pub color: String,
    pub timestamp: DateTime<Utc>,
}

impl StoredRecord {
    /// Flatten a raw record into a row. Non-object records are not storable.
    pub fn from_raw(raw: &RawRecord, timestamp: DateTime<Utc>) -> Option<Self> {
        raw.as_object()?;

        // Coercible numbers are stored canonical so a read-back parses the same
        // way the inline path does; anything else keeps its raw text.
        let number = lookup(raw, NUMBER_FIELDS).map(|v| match coerce_number(v) {
            Ok(n) => n.to_string(),
            Err(_) => match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        });
        let color = lookup(raw, COLOR_FIELDS)
            .map(|v| extract_colors(v).join(","))
            .unwrap_or_default();
        let issue_number = match lookup(raw, ISSUE_FIELDS) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        Some(Self {
            issue_number,
            number,
            color,
            timestamp,
        })
    }

    /// The row as a raw record for the normalizer.
    pub fn to_raw(&self) -> RawRecord {
        json!({
            "issueNumber": self.issue_number,
            "number": self.number,
            "color": self.color,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}

/// Flatten a batch, skipping records that are not objects.
pub fn rows_from_raw(records: &[RawRecord], timestamp: DateTime<Utc>) -> Vec<StoredRecord> {
    let rows: Vec<StoredRecord> = records
        .iter()
        .filter_map(|r| StoredRecord::from_raw(r, timestamp))
        .collect();
    if rows.len() < records.len() {
        debug!(
            skipped = records.len() - rows.len(),
            "Skipped non-object records on ingest"
        );
    }
    rows
}

// ---------------------------------------------------------------------------
// Store abstraction
// ---------------------------------------------------------------------------

/// Append-only history store.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append raw records in arrival order. Returns how many were stored.
    async fn append(&self, records: &[RawRecord]) -> Result<usize>;

    /// Up to `take` most recent rows, newest first.
    async fn recent(&self, take: usize) -> Result<Sequence<NewestFirst, StoredRecord>>;

    /// Every row, oldest first.
    async fn all(&self) -> Result<Sequence<OldestFirst, StoredRecord>>;

    /// Number of stored rows.
    async fn len(&self) -> Result<usize> {
        Ok(self.all().await?.len())
    }

    /// Store name for logging.
    fn name(&self) -> &str;
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryHistoryStore {
    rows: RwLock<Vec<StoredRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, records: &[RawRecord]) -> Result<usize> {
        let new_rows = rows_from_raw(records, Utc::now());
        let stored = new_rows.len();
        self.rows.write().await.extend(new_rows);
        Ok(stored)
    }

    async fn recent(&self, take: usize) -> Result<Sequence<NewestFirst, StoredRecord>> {
        let rows = self.rows.read().await;
        Ok(Sequence::new(rows.iter().rev().take(take).cloned().collect()))
    }

    async fn all(&self) -> Result<Sequence<OldestFirst, StoredRecord>> {
        Ok(Sequence::new(self.rows.read().await.clone()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.rows.read().await.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
