//! Core data models for the inventory backend.
//!
//! These types represent the persisted application state, the append-only
//! report log entries, and the structured output of the vision collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tracked ingredient, as seeded into the application state.
///
/// The `id` is generated once at creation (`item-<uuid>`) and never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub ideal: i64,
    pub current: i64,
}

/// The single persisted application-state record.
///
/// Exactly one `AppState` exists per process. Every successful write fully
/// replaces `inventory`, `report`, and `photo`; `updated_at` is the
/// wall-clock time of the last successful write, or `None` before the first
/// one. Inventory entries are stored as raw JSON values: the replace path
/// accepts whatever array the client sends, so round-trips preserve the
/// client's shape exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppState {
    #[serde(default)]
    pub inventory: Vec<Value>,
    #[serde(default = "empty_object")]
    pub report: Value,
    #[serde(default)]
    pub photo: Value,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            inventory: Vec::new(),
            report: empty_object(),
            photo: Value::Null,
            updated_at: None,
        }
    }
}

/// One immutable entry in the append-only report log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    /// Monotonically increasing surrogate id, starting at 1.
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub inventory: Vec<ReportItem>,
}

/// A single line-item inside a report.
///
/// `ideal` and `current` are integer-or-null: non-integer model output is
/// coerced to null at append time, never rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportItem {
    pub name: String,
    #[serde(default)]
    pub ideal: Option<i64>,
    #[serde(default)]
    pub current: Option<i64>,
}

/// Structured result returned by the vision collaborator.
///
/// `ideal`/`current` are kept as raw JSON values here so the analyze
/// response echoes the model output unchanged; coercion happens only when
/// the result is appended to the report log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub inventory: Vec<AnalysisItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One detected ingredient in an analysis result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ideal: Value,
    #[serde(default)]
    pub current: Value,
}
