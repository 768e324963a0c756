//! Record store seam: the only way the controller touches the database.

pub mod pg;

use crate::config::EntityDescriptor;
use crate::error::AppError;
use crate::sql::QueryBuf;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use pg::PgStore;

/// One row, keyed by column name.
pub type Record = Map<String, Value>;

/// Table-backed persistence the controller runs against.
///
/// `select`/`execute` take statements the controller assembled itself; the record-level methods let an
/// adapter use whatever statement shape its backend needs. Adapters report integrity violations as
/// [`AppError::Validation`] so they reach clients as 422.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, q: &QueryBuf) -> Result<Vec<Record>, AppError>;

    /// Run a statement for its side effects; returns affected rows.
    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError>;

    async fn find(&self, entity: &EntityDescriptor, id: &Value) -> Result<Option<Record>, AppError>;

    async fn find_by(&self, entity: &EntityDescriptor, field: &str, value: &Value) -> Result<Option<Record>, AppError>;

    /// Insert and return the persisted row (with generated keys and defaults).
    async fn insert(&self, entity: &EntityDescriptor, data: &Record) -> Result<Record, AppError>;

    /// Merge `data` into the row and return it; `None` when the row is gone.
    async fn update(&self, entity: &EntityDescriptor, id: &Value, data: &Record) -> Result<Option<Record>, AppError>;

    /// Set `deleted_at` to now, writing `changes` in the same statement.
    async fn soft_delete(&self, entity: &EntityDescriptor, id: &Value, changes: &Record) -> Result<(), AppError>;

    async fn delete(&self, entity: &EntityDescriptor, id: &Value) -> Result<(), AppError>;
}

/// Stable string form of a key value: strings as-is, everything else as JSON text.
pub fn key_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a soft-deleted row should be treated as gone.
pub fn is_soft_deleted(record: &Record) -> bool {
    record.get("deleted_at").map(|v| !v.is_null()).unwrap_or(false)
}
