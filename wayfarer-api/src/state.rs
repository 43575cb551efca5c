use std::sync::Arc;
use std::time::Duration;
use wayfarer_store::WorkflowSettings;
use wayfarer_workflow::{EngineConfig, WorkflowEngine};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub auth: AuthConfig,
}

pub fn engine_config(settings: &WorkflowSettings) -> EngineConfig {
    EngineConfig {
        store_timeout: Duration::from_millis(settings.store_timeout_ms),
        read_retries: settings.read_retries,
        email_notifications: settings.email_notifications,
    }
}
