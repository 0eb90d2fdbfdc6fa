//! # PULSE Engine - Deployment Risk Monitoring and Automated Response
//!
//! This crate implements the stateful core of PULSE (Post-Launch Safety
//! Engine): a bounded metric sample store, a trigger rule engine with
//! cooldown, a deployment impact analyzer, and the real-time dispatcher
//! that ties them together.
//!
//! ## Overview
//!
//! External producers push metric samples and deployment notifications into
//! the [`Dispatcher`]. On a periodic tick it evaluates every enabled
//! trigger rule against recent metric history; rules whose condition holds
//! fire their bound action (alert, rollback) under a timeout, and every
//! fire event is appended to a bounded history log and fanned out to
//! registered alert callbacks. Impact analysis compares metric windows
//! before and after a deployment and classifies the regression risk.
//!
//! ## Key Components
//!
//! - [`SampleStore`]: per-metric bounded time series
//! - [`TriggerEngine`]: rule evaluation with cooldown and failure isolation
//! - [`ImpactAnalyzer`]: before/after deployment comparison
//! - [`Dispatcher`]: ingestion, the evaluation loop, and alert fan-out
//! - [`actions`]: alert and rollback actions behind the [`Action`] trait
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pulse_engine::{Dispatcher, EngineConfig, actions::NoOpAction};
//! use pulse_types::{TriggerCondition, TriggerSpec};
//!
//! # async fn example() {
//! let dispatcher = Arc::new(Dispatcher::new(EngineConfig::default()));
//!
//! // Alert when the error rate exceeds 5%.
//! let spec = TriggerSpec::new("high-errors", "error_rate", TriggerCondition::Above, 0.05);
//! dispatcher.register_trigger(spec, Some(Arc::new(NoOpAction))).unwrap();
//!
//! // Ingest samples and start the evaluation loop.
//! dispatcher.record_sample("error_rate", 0.08, None);
//! let handle = dispatcher.start().unwrap();
//!
//! // ... later: graceful shutdown, history intact.
//! dispatcher.shutdown();
//! handle.await.unwrap();
//! println!("{} fire events", dispatcher.get_history(None).len());
//! # }
//! ```
//!
//! ## Failure Isolation
//!
//! A failing or hanging action is captured into its fire event
//! (`success = false`, populated `error`) and never aborts the remaining
//! rules in a tick; a failing alert callback is logged and never stops the
//! rest of the fan-out. Only caller-facing misuse (unknown deployment id,
//! invalid trigger spec) surfaces as a typed error.

#![deny(unsafe_code)]

pub mod actions;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod impact;
pub mod store;
pub mod triggers;

// Re-export main types
pub use actions::{Action, AlertAction, DeploymentManager, Notifier, RollbackAction};
pub use config::{EngineConfig, HistoryConfig, ImpactConfig, StoreConfig};
pub use dispatcher::{AlertCallback, Dispatcher, EngineEvent};
pub use error::{ActionError, ActionResult, EngineError, EngineResult};
pub use history::FireHistory;
pub use impact::ImpactAnalyzer;
pub use store::SampleStore;
pub use triggers::{TriggerEngine, EQUAL_TOLERANCE};
