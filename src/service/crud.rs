//! Entity CRUD over any [`Store`]: validation, constraint checks, pagination.

use crate::error::{AppError, FieldErrors};
use crate::migration::{fk_constraint_name, unique_constraint_name};
use crate::model::{EntityDef, FieldKind, Model};
use crate::pagination::{PageMeta, PageRequest};
use crate::service::filters::parse_filters;
use crate::service::validation::{RequestValidator, WriteMode};
use crate::store::{ListQuery, Record, Store};
use serde_json::Value;
use std::collections::HashMap;

pub struct CrudService;

impl CrudService {
    /// One page of rows matching the entity's declared filters.
    pub async fn list(
        store: &dyn Store,
        entity: &'static EntityDef,
        params: &HashMap<String, String>,
    ) -> Result<(Vec<Value>, PageMeta), AppError> {
        let page = PageRequest::from_params(params)?;
        let filters = parse_filters(entity, params)?;
        let total = store.count(entity, &filters).await?;
        let (resolved, meta) = page.resolve(total)?;
        let query = ListQuery {
            filters,
            limit: resolved.limit(),
            offset: resolved.offset(),
        };
        let rows = store.list(entity, &query).await?;
        Ok((rows, meta))
    }

    pub async fn read(store: &dyn Store, entity: &'static EntityDef, id: i64) -> Result<Value, AppError> {
        store
            .read(entity, id)
            .await?
            .ok_or_else(|| not_found(entity, id))
    }

    pub async fn create(
        store: &dyn Store,
        model: &Model,
        entity: &'static EntityDef,
        body: &Value,
    ) -> Result<Value, AppError> {
        let record = RequestValidator::validate(body, entity, WriteMode::Full)?;
        Self::check_constraints(store, model, entity, &record, None).await?;
        store
            .insert(entity, &record)
            .await
            .map_err(|e| constraint_violation(entity, e))
    }

    /// PUT (`WriteMode::Full`) or PATCH (`WriteMode::Partial`) one row.
    pub async fn update(
        store: &dyn Store,
        model: &Model,
        entity: &'static EntityDef,
        id: i64,
        body: &Value,
        mode: WriteMode,
    ) -> Result<Value, AppError> {
        if store.read(entity, id).await?.is_none() {
            return Err(not_found(entity, id));
        }
        let record = RequestValidator::validate(body, entity, mode)?;
        Self::check_constraints(store, model, entity, &record, Some(id)).await?;
        store
            .update(entity, id, &record)
            .await
            .map_err(|e| constraint_violation(entity, e))?
            .ok_or_else(|| not_found(entity, id))
    }

    pub async fn delete(store: &dyn Store, entity: &'static EntityDef, id: i64) -> Result<(), AppError> {
        if store.delete(entity, id).await? {
            Ok(())
        } else {
            Err(not_found(entity, id))
        }
    }

    /// Unique columns must be free (ignoring the row itself) and references must resolve.
    async fn check_constraints(
        store: &dyn Store,
        model: &Model,
        entity: &'static EntityDef,
        record: &Record,
        exclude_id: Option<i64>,
    ) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        for col in entity.writable_columns() {
            let Some(value) = record.get(col.name) else { continue };
            if col.unique && store.exists(entity, col.name, value, exclude_id).await? {
                errors.add(col.name, unique_message(entity, col.name));
            }
            if let FieldKind::ForeignKey { entity: target } = col.kind {
                let target = model.entity(target).ok_or_else(|| {
                    AppError::Internal(format!("{}.{} references unknown entity", entity.name, col.name))
                })?;
                if !store.exists(target, target.pk().name, value, None).await? {
                    errors.add(col.name, missing_reference_message(value));
                }
            }
        }
        errors.into_result()
    }
}

fn not_found(entity: &EntityDef, id: i64) -> AppError {
    AppError::NotFound(format!("{} {}", entity.name, id))
}

fn unique_message(entity: &EntityDef, column: &str) -> String {
    format!("{} with this {} already exists.", entity.name, column)
}

fn missing_reference_message(value: &Value) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", value)
}

/// Map unique/foreign-key violations that raced past the checks to field errors.
fn constraint_violation(entity: &EntityDef, err: AppError) -> AppError {
    let AppError::Db(sqlx::Error::Database(db)) = &err else { return err };
    let Some(constraint) = db.constraint() else { return err };
    for col in entity.columns {
        if col.unique && constraint == unique_constraint_name(entity, col.name) {
            return AppError::Validation(FieldErrors::single(col.name, unique_message(entity, col.name)));
        }
        if matches!(col.kind, FieldKind::ForeignKey { .. }) && constraint == fk_constraint_name(entity, col.name) {
            return AppError::Validation(FieldErrors::single(col.name, "Referenced object does not exist."));
        }
    }
    err
}
