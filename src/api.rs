//! HTTP API for the chat shell
//!
//! Thin presentation layer over the turn controller: JSON endpoints for
//! submitting text and approval answers, an SSE stream per thread, and the
//! embedded chat page.

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::ProductionController;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ProductionController>,
}

impl AppState {
    pub fn new(controller: ProductionController) -> Self {
        Self {
            controller: Arc::new(controller),
        }
    }
}
