use std::sync::Arc;

use lib_common::engine::EngineClient;
use lib_common::orchestrator::UpdateOrchestrator;

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<UpdateOrchestrator>,
    pub engine: Arc<EngineClient>,
}

impl AppState {
    pub fn new(orchestrator: UpdateOrchestrator, engine: EngineClient) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            engine: Arc::new(engine),
        }
    }
}
