//! Core domain types for Pokédex ingestion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Natural identifier of a record (the National Pokédex number).
pub type RecordId = i64;

/// Raw field mapping as returned by a source: a JSON object, a per-id API
/// response, or a scraped table row.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// FieldValue / Record
// ---------------------------------------------------------------------------

/// A scalar column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl FieldValue {
    /// Integer payload, if any.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(v: Option<i64>) -> Self {
        v.map_or(Self::Null, Self::Integer)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

/// A normalized record ready for the store.
///
/// The identifier is kept apart from the other fields; it is always present
/// and maps to the table's `id` primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Look up a field; absent fields read as `None`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Human-readable label for logs: the `name` field when present.
    pub fn label(&self) -> String {
        self.get("name")
            .and_then(FieldValue::as_text)
            .map_or_else(|| format!("#{}", self.id), String::from)
    }
}

// ---------------------------------------------------------------------------
// Upsert semantics
// ---------------------------------------------------------------------------

/// Conflict handling when a record with the same id already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsertMode {
    /// Keep the stored row untouched.
    #[default]
    InsertIfAbsent,
    /// Overwrite the stored row's columns.
    Replace,
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Budget limits for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum number of new records a single run may add.
    pub per_run_cap: u64,
    /// Stop once the store holds this many records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cap: Option<u64>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            per_run_cap: 25,
            total_cap: None,
        }
    }
}

/// Run-scoped counters deciding when an ingestion run stops adding records.
///
/// Created fresh from the store size at the start of a run and dropped at
/// the end; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionBudget {
    per_run_cap: u64,
    total_cap: Option<u64>,
    baseline: u64,
    added: u64,
}

impl IngestionBudget {
    /// Start a budget for a store currently holding `store_count` records.
    pub fn start(config: BudgetConfig, store_count: u64) -> Self {
        Self {
            per_run_cap: config.per_run_cap,
            total_cap: config.total_cap,
            baseline: store_count,
            added: 0,
        }
    }

    /// Count one newly added record.
    pub fn record_added(&mut self) {
        self.added += 1;
    }

    /// Records added so far this run.
    pub fn added(&self) -> u64 {
        self.added
    }

    /// Store size at run start plus records added.
    pub fn projected_total(&self) -> u64 {
        self.baseline + self.added
    }

    pub fn is_exhausted(&self) -> bool {
        if self.added >= self.per_run_cap {
            return true;
        }
        matches!(self.total_cap, Some(cap) if self.projected_total() >= cap)
    }
}
