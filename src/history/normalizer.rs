//! Raw record normalization.
//!
//! Turns heterogeneous records (inconsistent field names, numbers as
//! strings, colors as comma strings or lists) into canonical
//! `Observation`s. A bad field degrades its own record, never the batch.

use serde_json::Value;
use tracing::{debug, warn};

use super::{Direction, InputOrder, NewestFirst, Sequence};
use crate::types::{Observation, ParseError};

/// A raw, untyped history record as received from callers or storage.
pub type RawRecord = Value;

/// Field aliases, checked in order. The first present, non-null alias wins.
pub const NUMBER_FIELDS: &[&str] = &["number", "num", "Number"];
pub const COLOR_FIELDS: &[&str] = &["color", "colors"];
pub const ISSUE_FIELDS: &[&str] = &["issueNumber", "issue", "issueId"];

/// Stateless normalizer from raw records to canonical observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryNormalizer;

impl HistoryNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize records supplied in the declared `order`.
    /// The output is always most-recent-first.
    pub fn normalize(&self, records: &[RawRecord], order: InputOrder) -> Sequence<NewestFirst> {
        let observations: Vec<Observation> =
            records.iter().map(|r| self.normalize_record(r)).collect();
        debug!(count = observations.len(), order = %order, "Normalized raw records");
        Sequence::<NewestFirst>::from_declared(observations, order)
    }

    /// Normalize a sequence whose direction is already known from its type.
    pub fn normalize_sequence<D: Direction>(
        &self,
        records: &Sequence<D, RawRecord>,
    ) -> Sequence<NewestFirst> {
        self.normalize(records.as_slice(), D::ORDER)
    }

    /// Normalize a single record. Never fails; unusable fields become null/empty.
    pub fn normalize_record(&self, record: &RawRecord) -> Observation {
        let number = match lookup(record, NUMBER_FIELDS) {
            Some(raw) => match coerce_number(raw) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(error = %e, "Unparseable number, keeping record with null number");
                    None
                }
            },
            None => None,
        };

        let colors = lookup(record, COLOR_FIELDS)
            .map(extract_colors)
            .unwrap_or_default();

        let issue_id = lookup(record, ISSUE_FIELDS).and_then(extract_issue);

        Observation {
            number,
            colors,
            issue_id,
        }
    }
}

/// First alias present on the record with a non-null value.
pub fn lookup<'a>(record: &'a RawRecord, aliases: &[&str]) -> Option<&'a Value> {
    let obj = record.as_object()?;
    aliases
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

/// Coerce a raw number field: direct cast first, then trim-and-parse for strings.
pub fn coerce_number(raw: &Value) -> Result<i64, ParseError> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
                    _ => Err(ParseError { raw: n.to_string() }),
                }
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ParseError { raw: format!("{s:?}") }),
        other => Err(ParseError {
            raw: other.to_string(),
        }),
    }
}

/// Colors from a comma-delimited string or a list of tags.
pub fn extract_colors(raw: &Value) -> Vec<String> {
    match raw {
        Value::String(s) => split_tags(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Split a comma-delimited color string into normalized tags.
pub fn split_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

fn extract_issue(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
