//! PostgreSQL-backed [`Store`], plus database bootstrap.

use super::{format_timestamp, Filter, ListQuery, Record, Store};
use crate::error::AppError;
use crate::model::{ColumnDef, EntityDef, FieldKind};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{ConnectOptions, PgPool, Row};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    async fn fetch_all(&self, entity: &EntityDef, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| row_to_json(entity, r)).collect()
    }

    async fn fetch_optional(&self, entity: &EntityDef, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_json(entity, &r)).transpose()
    }

    async fn fetch_scalar<T>(&self, q: &QueryBuf) -> Result<T, AppError>
    where
        T: Send + Unpin,
        (T,): for<'r> sqlx::FromRow<'r, PgRow>,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, T>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.fetch_one(&self.pool).await?)
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    params: &[Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, entity: &'static EntityDef, filters: &[Filter]) -> Result<u64, AppError> {
        let total: i64 = self.fetch_scalar(&sql::count(entity, filters)).await?;
        Ok(total.max(0) as u64)
    }

    async fn list(&self, entity: &'static EntityDef, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        self.fetch_all(entity, &sql::select_page(entity, query)).await
    }

    async fn read(&self, entity: &'static EntityDef, id: i64) -> Result<Option<Value>, AppError> {
        self.fetch_optional(entity, &sql::select_by_id(entity, id)).await
    }

    async fn exists(
        &self,
        entity: &'static EntityDef,
        column: &str,
        value: &Value,
        exclude_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let col = entity.column(column).ok_or_else(|| {
            AppError::Internal(format!("unknown column {}.{}", entity.name, column))
        })?;
        self.fetch_scalar(&sql::exists(entity, col, value, exclude_id)).await
    }

    async fn insert(&self, entity: &'static EntityDef, values: &Record) -> Result<Value, AppError> {
        self.fetch_optional(entity, &sql::insert(entity, values))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(
        &self,
        entity: &'static EntityDef,
        id: i64,
        values: &Record,
    ) -> Result<Option<Value>, AppError> {
        self.fetch_optional(entity, &sql::update(entity, id, values)).await
    }

    async fn delete(&self, entity: &'static EntityDef, id: i64) -> Result<bool, AppError> {
        let q = sql::delete(entity, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

fn row_to_json(entity: &EntityDef, row: &PgRow) -> Result<Value, AppError> {
    let mut map = serde_json::Map::new();
    for col in entity.columns {
        map.insert(col.name.to_string(), cell_to_value(row, col)?);
    }
    Ok(Value::Object(map))
}

fn cell_to_value(row: &PgRow, col: &ColumnDef) -> Result<Value, AppError> {
    let name = col.name;
    Ok(match col.kind {
        FieldKind::Id | FieldKind::ForeignKey { .. } => {
            row.try_get::<Option<i64>, _>(name)?.map(Value::from).unwrap_or(Value::Null)
        }
        FieldKind::Text { .. } => row
            .try_get::<Option<String>, _>(name)?
            .map(Value::String)
            .unwrap_or(Value::Null),
        FieldKind::Float => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldKind::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool).unwrap_or(Value::Null),
        FieldKind::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(format_timestamp(&d)))
            .unwrap_or(Value::Null),
    })
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url);
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// Split a connection URL into (URL of the `postgres` maintenance DB, target DB name).
/// The name is empty when the URL has no path.
fn parse_db_name_from_url(url: &str) -> (String, String) {
    let authority_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    let (scheme, rest) = url.split_at(authority_start);
    let (before_query, query) = match rest.find('?') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let (authority, db_name) = before_query.split_once('/').unwrap_or((before_query, ""));
    (
        format!("{}{}/postgres{}", scheme, authority, query),
        db_name.trim().to_string(),
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
