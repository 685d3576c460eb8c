//! Persistence interface over the relational store.

mod postgres;

pub use postgres::{ensure_database_exists, PgStore};

use crate::error::AppError;
use crate::model::EntityDef;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Column name to coerced value, as produced by the request validator.
pub type Record = Map<String, Value>;

/// One list predicate. Columns come from the entity model; values are already coerced.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq { column: &'static str, value: Value },
    /// Case-insensitive substring on the column's text form.
    IContains { column: &'static str, needle: String },
    /// `column >= value`
    AtLeast { column: &'static str, value: Value },
    /// `column < value`
    Before { column: &'static str, value: Value },
}

impl Filter {
    pub fn column(&self) -> &'static str {
        match self {
            Filter::Eq { column, .. }
            | Filter::IContains { column, .. }
            | Filter::AtLeast { column, .. }
            | Filter::Before { column, .. } => column,
        }
    }
}

/// One page of a filtered listing. The offset is resolved against the total first.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub limit: u32,
    pub offset: u64,
}

/// Row-level CRUD against one table per entity. Rows are JSON objects keyed by column.
#[async_trait]
pub trait Store: Send + Sync {
    /// Number of rows matching every filter.
    async fn count(&self, entity: &'static EntityDef, filters: &[Filter]) -> Result<u64, AppError>;

    /// Matching rows ordered by primary key, sliced by limit/offset.
    async fn list(&self, entity: &'static EntityDef, query: &ListQuery) -> Result<Vec<Value>, AppError>;

    async fn read(&self, entity: &'static EntityDef, id: i64) -> Result<Option<Value>, AppError>;

    /// Whether a row has `column = value`, ignoring the row with primary key `exclude_id`.
    async fn exists(
        &self,
        entity: &'static EntityDef,
        column: &str,
        value: &Value,
        exclude_id: Option<i64>,
    ) -> Result<bool, AppError>;

    /// Insert one row; omitted columns take their defaults. Returns the stored row.
    async fn insert(&self, entity: &'static EntityDef, values: &Record) -> Result<Value, AppError>;

    /// Set the given columns on one row. `None` when the row does not exist.
    async fn update(
        &self,
        entity: &'static EntityDef,
        id: i64,
        values: &Record,
    ) -> Result<Option<Value>, AppError>;

    /// Delete one row (and, through the schema, its dependents). `false` when absent.
    async fn delete(&self, entity: &'static EntityDef, id: i64) -> Result<bool, AppError>;

    /// Connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Wire format for timestamps: RFC 3339, UTC, microsecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_use_utc_micros() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-05T14:07:09.000000Z");
    }
}
