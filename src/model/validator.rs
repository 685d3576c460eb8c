//! Model validation: referential integrity and filter consistency.

use crate::error::ConfigError;
use crate::model::types::{EntityDef, FieldKind, FilterOp};
use std::collections::HashSet;

pub fn validate(entities: &[&EntityDef]) -> Result<(), ConfigError> {
    let mut paths = HashSet::new();
    let mut declared: HashSet<&str> = HashSet::new();

    for e in entities {
        if !paths.insert(e.path_segment) {
            return Err(ConfigError::DuplicatePathSegment(e.path_segment.to_string()));
        }

        let pk_count = e.columns.iter().filter(|c| c.is_pk()).count();
        if pk_count != 1 || !e.columns[0].is_pk() {
            return Err(ConfigError::InvalidPrimaryKey {
                entity: e.name.to_string(),
            });
        }

        let mut names = HashSet::new();
        for c in e.columns {
            if !names.insert(c.name) {
                return Err(ConfigError::Validation(format!(
                    "{}: duplicate column {}",
                    e.name, c.name
                )));
            }
            // Referenced tables must be created before their dependents.
            if let FieldKind::ForeignKey { entity } = c.kind {
                if !declared.contains(entity) {
                    return Err(ConfigError::MissingReference {
                        kind: "entity",
                        id: entity.to_string(),
                    });
                }
            }
            if c.required && c.read_only {
                return Err(ConfigError::Validation(format!(
                    "{}.{} cannot be both required and read-only",
                    e.name, c.name
                )));
            }
        }

        for f in e.filters {
            let col = e.column(f.column).ok_or_else(|| ConfigError::UnknownColumn {
                entity: e.name.to_string(),
                column: f.column.to_string(),
            })?;
            let timestamp_only = matches!(f.op, FilterOp::Moment | FilterOp::After | FilterOp::Before);
            if timestamp_only && col.kind != FieldKind::Timestamp {
                return Err(ConfigError::Validation(format!(
                    "{}: filter {} needs a timestamp column",
                    e.name, f.param
                )));
            }
        }

        declared.insert(e.name);
    }
    Ok(())
}
