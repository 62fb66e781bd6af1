//! Pre-flight checks for restore packages
//!
//! A package either passes every check here or the restore never starts;
//! nothing is applied table by table and rolled back.

use capstone_kernel::{PolicyError, PolicyResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Table keys every package must carry, in export order.
pub const REQUIRED_TABLES: [&str; 7] = [
    "users",
    "groups",
    "students",
    "advisers",
    "logs",
    "documents",
    "groupStatus",
];

/// Exported rows, kept as raw JSON records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupTables {
    pub users: Vec<Value>,
    pub groups: Vec<Value>,
    pub students: Vec<Value>,
    pub advisers: Vec<Value>,
    pub logs: Vec<Value>,
    pub documents: Vec<Value>,
    #[serde(rename = "groupStatus")]
    pub group_status: Vec<Value>,
}

impl BackupTables {
    /// Total rows across all tables.
    pub fn row_count(&self) -> usize {
        self.users.len()
            + self.groups.len()
            + self.students.len()
            + self.advisers.len()
            + self.logs.len()
            + self.documents.len()
            + self.group_status.len()
    }
}

/// A package that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPackage {
    pub timestamp: String,
    pub version: String,
    pub tables: BackupTables,
}

/// Stateless validator for restore payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupValidator;

impl BackupValidator {
    pub fn new() -> Self {
        Self
    }

    /// Parse `text` as JSON, then [`validate`](Self::validate) it.
    pub fn from_json_str(&self, text: &str) -> PolicyResult<BackupPackage> {
        let payload: Value = serde_json::from_str(text)
            .map_err(|e| malformed(format!("payload is not valid JSON: {e}")))?;
        self.validate(&payload)
    }

    /// Run every structural check, stopping at the first failure.
    pub fn validate(&self, payload: &Value) -> PolicyResult<BackupPackage> {
        let root = payload
            .as_object()
            .ok_or_else(|| malformed("payload must be an object"))?;

        let timestamp = required_text(root, "timestamp")?;
        let version = required_text(root, "version")?;

        let tables = root
            .get("tables")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("`tables` must be an object"))?;

        for key in REQUIRED_TABLES {
            match tables.get(key) {
                None => return Err(malformed(format!("missing table `{key}`"))),
                Some(Value::Array(_)) => {}
                Some(_) => return Err(malformed(format!("table `{key}` must be an array"))),
            }
        }

        let tables = BackupTables {
            users: rows(tables, "users"),
            groups: rows(tables, "groups"),
            students: rows(tables, "students"),
            advisers: rows(tables, "advisers"),
            logs: rows(tables, "logs"),
            documents: rows(tables, "documents"),
            group_status: rows(tables, "groupStatus"),
        };

        for (index, adviser) in tables.advisers.iter().enumerate() {
            for field in ["adviser_id", "code"] {
                if !has_text(adviser, field) {
                    return Err(malformed(format!(
                        "advisers[{index}] is missing `{field}`"
                    )));
                }
            }
        }

        info!(
            %version,
            %timestamp,
            rows = tables.row_count(),
            "backup package accepted"
        );

        Ok(BackupPackage {
            timestamp,
            version,
            tables,
        })
    }
}

fn malformed(reason: impl Into<String>) -> PolicyError {
    let reason = reason.into();
    warn!(%reason, "backup package rejected");
    PolicyError::MalformedPackage { reason }
}

fn required_text(root: &Map<String, Value>, field: &str) -> PolicyResult<String> {
    match root.get(field).and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(malformed(format!("`{field}` must be a non-empty string"))),
    }
}

fn rows(tables: &Map<String, Value>, key: &str) -> Vec<Value> {
    tables
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn has_text(record: &Value, field: &str) -> bool {
    record
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}
