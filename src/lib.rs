//! Sensor registry: REST backend for monitored environments, sensors and their readings.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod model;
pub mod pagination;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use error::{AppError, ConfigError, FieldErrors};
pub use extractors::TokenSet;
pub use migration::apply_schema;
pub use model::{EntityDef, Model};
pub use routes::{app, common_routes, entity_routes, API_PREFIX};
pub use service::CrudService;
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_database_exists, PgStore, Store};
