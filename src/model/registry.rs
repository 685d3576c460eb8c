//! The three resources served by the API and the runtime model that indexes them.

use crate::error::ConfigError;
use crate::model::types::*;
use crate::model::validate;
use std::collections::HashMap;

/// Monitored location (`/ambientes`).
pub static AMBIENTE: EntityDef = EntityDef {
    name: "ambiente",
    table: "ambiente",
    path_segment: "ambientes",
    columns: &[
        ColumnDef::id(),
        ColumnDef::new("descricao", FieldKind::Text { max_length: 100 }),
        ColumnDef::new("sig", FieldKind::Text { max_length: 10 }).unique(),
        ColumnDef::new("ni", FieldKind::Text { max_length: 40 }),
        ColumnDef::new("responsavel", FieldKind::Text { max_length: 50 }),
    ],
    filters: &[FilterDef::new("sig", "sig", FilterOp::IContains)],
};

/// Measuring device (`/sensores`).
pub static SENSOR: EntityDef = EntityDef {
    name: "sensor",
    table: "sensor",
    path_segment: "sensores",
    columns: &[
        ColumnDef::id(),
        ColumnDef::new("sensor", FieldKind::Text { max_length: 40 }),
        ColumnDef::new("mac_address", FieldKind::Text { max_length: 50 }),
        ColumnDef::new("unidade_med", FieldKind::Text { max_length: 100 }),
        ColumnDef::new("latitude", FieldKind::Float),
        ColumnDef::new("longitude", FieldKind::Float),
        ColumnDef::new("status", FieldKind::Bool).with_default(ColumnDefault::Bool(true)),
    ],
    filters: &[
        FilterDef::new("id", "id", FilterOp::Exact),
        FilterDef::new("status", "status", FilterOp::Exact),
        FilterDef::new("sensor", "sensor", FilterOp::IContains),
        FilterDef::new("sensor_exact", "sensor", FilterOp::Exact),
    ],
};

/// One measurement of a sensor in an environment (`/historicos`).
pub static HISTORICO: EntityDef = EntityDef {
    name: "historico",
    table: "historico",
    path_segment: "historicos",
    columns: &[
        ColumnDef::id(),
        ColumnDef::new("sensor", FieldKind::ForeignKey { entity: "sensor" }),
        ColumnDef::new("ambiente", FieldKind::ForeignKey { entity: "ambiente" }),
        ColumnDef::new("valor", FieldKind::Float),
        ColumnDef::new("timestamp", FieldKind::Timestamp)
            .with_default(ColumnDefault::Now)
            .read_only(),
    ],
    filters: &[
        FilterDef::new("sensor", "sensor", FilterOp::Exact),
        FilterDef::new("ambiente", "ambiente", FilterOp::Exact),
        FilterDef::new("timestamp", "timestamp", FilterOp::Moment),
        FilterDef::new("timestamp_after", "timestamp", FilterOp::After),
        FilterDef::new("timestamp_before", "timestamp", FilterOp::Before),
    ],
};

/// Entities in dependency order: referenced entities come first.
pub static ENTITIES: [&EntityDef; 3] = [&AMBIENTE, &SENSOR, &HISTORICO];

#[derive(Clone, Debug)]
pub struct Model {
    pub entities: Vec<&'static EntityDef>,
    entity_by_path: HashMap<&'static str, &'static EntityDef>,
    entity_by_name: HashMap<&'static str, &'static EntityDef>,
}

impl Model {
    /// Build a model from entity definitions (validated first).
    pub fn new(entities: &[&'static EntityDef]) -> Result<Self, ConfigError> {
        validate(entities)?;
        let entity_by_path = entities.iter().map(|e| (e.path_segment, *e)).collect();
        let entity_by_name = entities.iter().map(|e| (e.name, *e)).collect();
        Ok(Model {
            entities: entities.to_vec(),
            entity_by_path,
            entity_by_name,
        })
    }

    /// Environments, sensors and readings.
    pub fn standard() -> Result<Self, ConfigError> {
        Self::new(&ENTITIES)
    }

    pub fn entity_by_path(&self, path: &str) -> Option<&'static EntityDef> {
        self.entity_by_path.get(path).copied()
    }

    pub fn entity(&self, name: &str) -> Option<&'static EntityDef> {
        self.entity_by_name.get(name).copied()
    }

    /// (entity, fk column) pairs whose rows are removed when a row of `target` is deleted.
    pub fn dependents(&self, target: &EntityDef) -> Vec<(&'static EntityDef, &'static ColumnDef)> {
        let mut out = Vec::new();
        for &e in &self.entities {
            for c in e.references_to(target.name) {
                out.push((e, c));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_model_resolves_paths() {
        let model = Model::standard().unwrap();
        assert_eq!(model.entity_by_path("ambientes").unwrap().name, "ambiente");
        assert_eq!(model.entity_by_path("sensores").unwrap().name, "sensor");
        assert_eq!(model.entity_by_path("historicos").unwrap().name, "historico");
        assert!(model.entity_by_path("ambiente").is_none());
    }

    #[test]
    fn readings_depend_on_sensors_and_environments() {
        let model = Model::standard().unwrap();
        let deps = model.dependents(&SENSOR);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].0.name, "historico");
        assert_eq!(deps[0].1.name, "sensor");
        let deps = model.dependents(&AMBIENTE);
        assert_eq!(deps[0].1.name, "ambiente");
        assert!(model.dependents(&HISTORICO).is_empty());
    }

    #[test]
    fn timestamp_is_server_assigned() {
        let ts = HISTORICO.column("timestamp").unwrap();
        assert!(ts.read_only);
        assert!(!ts.required);
        assert_eq!(ts.default, Some(ColumnDefault::Now));
        let status = SENSOR.column("status").unwrap();
        assert!(!status.required);
        assert_eq!(status.default, Some(ColumnDefault::Bool(true)));
    }
}
