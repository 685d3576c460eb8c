//! CrudService: entity CRUD over a Store, with request validation and list filters.

mod crud;
pub mod filters;
pub mod validation;
pub use crud::CrudService;
pub use validation::{RequestValidator, WriteMode};
