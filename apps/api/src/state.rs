use std::sync::Arc;

use crate::config::Config;
use crate::leads::store::LeadStore;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    /// The session's lead store. Its view is written only by its own subscription task.
    pub leads: Arc<LeadStore>,
    pub config: Config,
}
