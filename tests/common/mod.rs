//! In-memory [`Store`] and request helpers for router-level tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use sensor_registry::model::{ColumnDefault, FieldKind};
use sensor_registry::store::{format_timestamp, Filter, ListQuery, Record};
use sensor_registry::{app, AppError, AppState, EntityDef, Model, Store, TokenSet};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TOKEN: &str = "test-token";

#[derive(Default)]
struct Tables {
    rows: HashMap<&'static str, BTreeMap<i64, Record>>,
    next_id: HashMap<&'static str, i64>,
}

/// Rows live in per-entity maps keyed by id; deletes cascade like the SQL schema.
pub struct MemoryStore {
    model: Model,
    tables: Mutex<Tables>,
    failing: AtomicBool,
    page_offsets: Mutex<Vec<u64>>,
}

impl MemoryStore {
    pub fn new(model: Model) -> Self {
        MemoryStore {
            model,
            tables: Mutex::new(Tables::default()),
            failing: AtomicBool::new(false),
            page_offsets: Mutex::new(Vec::new()),
        }
    }

    /// Make every call fail as if the database were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Offsets of every page fetched so far, in call order.
    pub fn page_offsets(&self) -> Vec<u64> {
        self.page_offsets.lock().unwrap().clone()
    }

    pub fn rows_in(&self, entity: &EntityDef) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.rows.get(entity.table).map(|t| t.len()).unwrap_or(0)
    }

    fn check(&self) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Db(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    fn delete_cascade(&self, tables: &mut Tables, entity: &EntityDef, id: i64) -> bool {
        let removed = tables
            .rows
            .get_mut(entity.table)
            .and_then(|t| t.remove(&id))
            .is_some();
        if removed {
            for (dep, col) in self.model.dependents(entity) {
                let ids: Vec<i64> = tables
                    .rows
                    .get(dep.table)
                    .map(|t| {
                        t.iter()
                            .filter(|(_, row)| row.get(col.name).and_then(Value::as_i64) == Some(id))
                            .map(|(k, _)| *k)
                            .collect()
                    })
                    .unwrap_or_default();
                for dep_id in ids {
                    self.delete_cascade(tables, dep, dep_id);
                }
            }
        }
        removed
    }
}

fn parse_ts(v: &Value) -> Option<DateTime<Utc>> {
    v.as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(_), Value::String(_)) => match (parse_ts(a), parse_ts(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn row_matches(row: &Record, filter: &Filter) -> bool {
    let cell = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq { value, .. } => values_equal(cell, value),
        Filter::IContains { needle, .. } => text_of(cell).to_lowercase().contains(&needle.to_lowercase()),
        Filter::AtLeast { value, .. } => matches!((parse_ts(cell), parse_ts(value)), (Some(c), Some(v)) if c >= v),
        Filter::Before { value, .. } => matches!((parse_ts(cell), parse_ts(value)), (Some(c), Some(v)) if c < v),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, entity: &'static EntityDef, filters: &[Filter]) -> Result<u64, AppError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .rows
            .get(entity.table)
            .map(|t| t.values().filter(|r| filters.iter().all(|f| row_matches(r, f))).count())
            .unwrap_or(0) as u64)
    }

    async fn list(&self, entity: &'static EntityDef, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        self.check()?;
        self.page_offsets.lock().unwrap().push(query.offset);
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .rows
            .get(entity.table)
            .map(|t| {
                t.values()
                    .filter(|r| query.filters.iter().all(|f| row_matches(r, f)))
                    .skip(query.offset as usize)
                    .take(query.limit as usize)
                    .map(|r| Value::Object(r.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read(&self, entity: &'static EntityDef, id: i64) -> Result<Option<Value>, AppError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .rows
            .get(entity.table)
            .and_then(|t| t.get(&id))
            .map(|r| Value::Object(r.clone())))
    }

    async fn exists(
        &self,
        entity: &'static EntityDef,
        column: &str,
        value: &Value,
        exclude_id: Option<i64>,
    ) -> Result<bool, AppError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.rows.get(entity.table).is_some_and(|t| {
            t.iter().any(|(id, row)| {
                Some(*id) != exclude_id && row.get(column).is_some_and(|c| values_equal(c, value))
            })
        }))
    }

    async fn insert(&self, entity: &'static EntityDef, values: &Record) -> Result<Value, AppError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let next = tables.next_id.entry(entity.table).or_insert(0);
        *next += 1;
        let id = *next;
        let mut row = Record::new();
        for col in entity.columns {
            let value = match (col.kind, values.get(col.name), col.default) {
                (FieldKind::Id, _, _) => Value::from(id),
                (_, Some(v), _) if !col.read_only => v.clone(),
                (_, _, Some(ColumnDefault::Bool(b))) => Value::Bool(b),
                (_, _, Some(ColumnDefault::Now)) => {
                    Value::String(format_timestamp(&Utc::now()))
                }
                _ => Value::Null,
            };
            row.insert(col.name.to_string(), value);
        }
        tables.rows.entry(entity.table).or_default().insert(id, row.clone());
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        entity: &'static EntityDef,
        id: i64,
        values: &Record,
    ) -> Result<Option<Value>, AppError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(row) = tables.rows.get_mut(entity.table).and_then(|t| t.get_mut(&id)) else {
            return Ok(None);
        };
        for col in entity.writable_columns() {
            if let Some(v) = values.get(col.name) {
                row.insert(col.name.to_string(), v.clone());
            }
        }
        Ok(Some(Value::Object(row.clone())))
    }

    async fn delete(&self, entity: &'static EntityDef, id: i64) -> Result<bool, AppError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        Ok(self.delete_cascade(&mut tables, entity, id))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check()
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new(Model::standard().unwrap()));
        let state = AppState::new(
            store.clone(),
            Model::standard().unwrap(),
            TokenSet::from_iter([TOKEN]),
        );
        TestApp {
            router: app(state, 64 * 1024),
            store,
        }
    }

    /// Authenticated request; the body, when given, is sent as JSON.
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call_with_auth(method, uri, body, Some(&format!("Token {}", TOKEN))).await
    }

    pub async fn call_with_auth(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        authorization: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = authorization {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let request = match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, None).await
    }

    /// Create a row and return its id, asserting 201.
    pub async fn create(&self, resource: &str, body: Value) -> i64 {
        let (status, body) = self.post(&format!("/api/v1/{}", resource), body).await;
        assert_eq!(status, StatusCode::CREATED, "create {} failed: {}", resource, body);
        body["data"]["id"].as_i64().unwrap()
    }
}

pub fn environment(sig: &str) -> Value {
    serde_json::json!({
        "sig": sig,
        "descricao": format!("Environment {}", sig),
        "ni": "001",
        "responsavel": "Alice"
    })
}

pub fn sensor(name: &str) -> Value {
    serde_json::json!({
        "sensor": name,
        "mac_address": "AA:BB:CC",
        "unidade_med": "C",
        "latitude": 0.0,
        "longitude": 0.0
    })
}

pub fn reading(sensor: i64, ambiente: i64, valor: f64) -> Value {
    serde_json::json!({ "sensor": sensor, "ambiente": ambiente, "valor": valor })
}
