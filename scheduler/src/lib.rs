pub mod adapters;
pub mod config;
pub mod constants;
pub mod cron;
pub mod decision;
pub mod errors;
pub mod executor;
pub mod ice_retry;
pub mod maintenance_window;
pub mod operation_tracker;
pub mod orchestrator;
pub mod period;
pub mod schedule;
pub mod services;
pub mod state;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::{ConfigManager, GlobalConfig};
pub use errors::SchedulerError;
pub use operation_tracker::SimpleOperationTracker;
pub use orchestrator::{Orchestrator, OrchestratorStatus};
pub use services::AlertService;
