// File: scheduler/src/services/mod.rs

//! Business logic services layer.
//!
//! - **AlertService**: webhook-based alerting with progressive rate limiting (§5).

pub mod alert_service;

pub use alert_service::AlertService;
