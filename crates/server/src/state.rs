use std::sync::Arc;

use ferri_core::dispatcher::EngineShared;

/// Shared axum application state: one process-wide, immutable set of
/// collaborators handed to every connection's dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<EngineShared>,
}
