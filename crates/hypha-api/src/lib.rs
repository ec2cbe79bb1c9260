//! HTTP surface for Hypha governance
//!
//! This crate provides:
//! - Authenticated REST views joining space rows with on-chain state
//! - Signed chain-indexer webhooks feeding an event dispatcher
//! - Server-sent streams of proposal outcome events
//! - A cached USD price lookup for space tokens
//!
//! Can be used as a library or standalone binary

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod pricing;
pub mod routes;
pub mod service;
pub mod state;
pub mod webhook;

pub use config::{ApiSettings, AppEnv, ServiceConfig, WebhookKeys};
pub use error::ApiError;
pub use routes::router;
pub use service::ApiServiceRunner;
pub use state::{AppState, Components};
pub use webhook::{DispatchedEvent, EventDispatcher, LogDispatcher, WebhookError};
