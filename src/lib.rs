//! Library entrypoint for RustAlerts.
//!
//! This file exists mainly to make the integration tests easy (tests
//! under `tests/` can import the app state, stores, state machines, and
//! evaluator directly).

pub mod config;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub store: Arc<dyn services::kv::KvStore>,
    pub alerts: services::alert_store::AlertStore,
    pub events: services::event_store::EventStore,
    pub journal: services::journal::JournalStore,
    pub evaluator: Arc<services::evaluator::Evaluator>,
    pub clock: Arc<dyn services::runtime::Clock>,
    pub events_tx: tokio::sync::broadcast::Sender<String>,
}
