//! Shared application state for all routes. Everything here is immutable after startup.

use crate::extractors::TokenSet;
use crate::model::Model;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub model: Arc<Model>,
    pub tokens: Arc<TokenSet>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, model: Model, tokens: TokenSet) -> Self {
        AppState {
            store,
            model: Arc::new(model),
            tokens: Arc::new(tokens),
        }
    }
}
