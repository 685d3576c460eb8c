//! Bring the database schema in line with the entity model: one table per entity,
//! unique and foreign-key constraints, and an index per foreign key.
//! Idempotent (IF NOT EXISTS); existing tables are never altered.

use crate::error::{AppError, ConfigError};
use crate::model::{EntityDef, FieldKind, Model};
use sqlx::PgPool;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Constraint name for a unique column. Mirrors PostgreSQL's own `<table>_<column>_key`.
pub fn unique_constraint_name(entity: &EntityDef, column: &str) -> String {
    format!("{}_{}_key", entity.table, column)
}

/// Constraint name for a foreign key: `<table>_<column>_fkey`.
pub fn fk_constraint_name(entity: &EntityDef, column: &str) -> String {
    format!("{}_{}_fkey", entity.table, column)
}

/// DDL statements for one entity, in execution order.
pub fn table_ddl(entity: &EntityDef, model: &Model) -> Result<Vec<String>, ConfigError> {
    let table = quote(entity.table);
    let mut col_defs = Vec::new();
    let mut constraints = Vec::new();
    let mut indexes = Vec::new();

    for c in entity.columns {
        let mut def = format!("{} {}", quote(c.name), c.kind.ddl_type());
        if c.is_pk() {
            def.push_str(" PRIMARY KEY");
        } else {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = c.default {
            def.push_str(" DEFAULT ");
            def.push_str(d.sql());
        }
        col_defs.push(def);

        if c.unique {
            constraints.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                quote(&unique_constraint_name(entity, c.name)),
                quote(c.name)
            ));
        }
        if let FieldKind::ForeignKey { entity: target } = c.kind {
            let target = model.entity(target).ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: target.to_string(),
            })?;
            constraints.push(format!(
                "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                quote(&fk_constraint_name(entity, c.name)),
                quote(c.name),
                quote(target.table),
                quote(target.pk().name)
            ));
            indexes.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote(&format!("{}_{}_idx", entity.table, c.name)),
                table,
                quote(c.name)
            ));
        }
    }

    col_defs.extend(constraints);
    let mut out = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        table,
        col_defs.join(",\n  ")
    )];
    out.extend(indexes);
    Ok(out)
}

/// Create every table of the model, referenced tables first.
pub async fn apply_schema(pool: &PgPool, model: &Model) -> Result<(), AppError> {
    for entity in &model.entities {
        for sql in table_ddl(entity, model)? {
            tracing::debug!(sql = %sql, "ddl");
            sqlx::query(&sql).execute(pool).await?;
        }
        tracing::info!(table = entity.table, "table ready");
    }
    Ok(())
}
