use crate::services::orchestrator::RecordOrchestrator;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: RecordOrchestrator,
    /// Largest image accepted by the create endpoint.
    pub max_upload_bytes: usize,
}
