//! PULSE Types - Core types for deployment risk monitoring
//!
//! PULSE (Post-Launch Safety Engine) watches production metrics around
//! deployments and drives automated responses. This crate holds the shared
//! data model consumed by the engine and its collaborators.
//!
//! ## Architectural Boundaries
//!
//! - **PULSE** owns: metric sample history, trigger rules, before/after
//!   deployment impact analysis, action dispatch with cooldown
//! - **CI/CD pipeline** owns: building, testing, and shipping software; it
//!   only notifies PULSE that a deployment happened
//! - **Deployment manager** owns: executing rollbacks; PULSE records the
//!   outcome, it does not retry or guarantee delivery
//!
//! ## Key Concepts
//!
//! - **MetricSample**: one timestamped metric measurement
//! - **TriggerSpec**: a condition+threshold binding evaluated periodically
//! - **Deployment**: an immutable record of a shipped version
//! - **FireEvent**: the record produced each time a trigger fires
//! - **ImpactReport**: statistical before/after summary for a deployment

#![deny(unsafe_code)]

pub mod deployment;
pub mod ids;
pub mod impact;
pub mod sample;
pub mod trigger;

// Re-export main types
pub use deployment::Deployment;
pub use ids::{DeploymentId, TriggerId};
pub use impact::{ImpactReport, ImprovementDirection, MetricCategory, MetricImpact, RiskLevel};
pub use sample::MetricSample;
pub use trigger::{FireEvent, TriggerCondition, TriggerSpec};

/// Serde helper for `std::time::Duration` as milliseconds.
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
