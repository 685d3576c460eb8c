//! Entity CRUD handlers: list, create, read, update, partial update, delete.

use crate::error::AppError;
use crate::model::EntityDef;
use crate::response::{success_one, success_one_ok, success_page};
use crate::service::{CrudService, WriteMode};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn resolve_entity(state: &AppState, path_segment: &str) -> Result<&'static EntityDef, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("resource {}", path_segment)))
}

/// Ids parse as `i64`; anything else cannot name a row. Zero or negative ids parse but match nothing.
fn parse_id(entity: &EntityDef, id_str: &str) -> Result<i64, AppError> {
    id_str
        .parse::<i64>()
        .map_err(|_| AppError::NotFound(format!("{} {}", entity.name, id_str)))
}

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let (rows, meta) = CrudService::list(state.store.as_ref(), entity, &params).await?;
    Ok(success_page(rows, meta))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let body = json_body(payload)?;
    let row = CrudService::create(state.store.as_ref(), &state.model, entity, &body).await?;
    tracing::info!(entity = entity.name, id = ?row.get("id"), "created");
    Ok(success_one(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let id = parse_id(entity, &id_str)?;
    let row = CrudService::read(state.store.as_ref(), entity, id).await?;
    Ok(success_one_ok(row))
}

/// PUT: every required field must be supplied.
pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    write(state, &path_segment, &id_str, payload, WriteMode::Full).await
}

/// PATCH: only supplied fields change.
pub async fn partial_update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    write(state, &path_segment, &id_str, payload, WriteMode::Partial).await
}

async fn write(
    state: AppState,
    path_segment: &str,
    id_str: &str,
    payload: Result<Json<Value>, JsonRejection>,
    mode: WriteMode,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, path_segment)?;
    let id = parse_id(entity, id_str)?;
    let body = json_body(payload)?;
    let row = CrudService::update(state.store.as_ref(), &state.model, entity, id, &body, mode).await?;
    tracing::info!(entity = entity.name, id, ?mode, "updated");
    Ok(success_one_ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let id = parse_id(entity, &id_str)?;
    CrudService::delete(state.store.as_ref(), entity, id).await?;
    tracing::info!(entity = entity.name, id, "deleted");
    Ok(StatusCode::NO_CONTENT)
}
