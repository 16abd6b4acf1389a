//! HTTP control surface (A1, ambient, §6.1): a thin axum surface over the
//! CLI request envelope and read-only introspection into the
//! orchestrator's last pass.

pub mod handlers;
pub mod server;

pub use server::start_web_server;

use std::sync::Arc;

use crate::config::ConfigManager;
use crate::operation_tracker::SimpleOperationTracker;
use crate::orchestrator::OrchestratorStatus;

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config_manager: Arc<ConfigManager>,
    pub tracker: Arc<SimpleOperationTracker>,
    pub status: Arc<OrchestratorStatus>,
}

impl AppState {
    pub fn new(
        config_manager: Arc<ConfigManager>,
        tracker: Arc<SimpleOperationTracker>,
        status: Arc<OrchestratorStatus>,
    ) -> Self {
        Self {
            config_manager,
            tracker,
            status,
        }
    }
}
