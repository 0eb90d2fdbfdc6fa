//! Error types for the engine.
//!
//! Only caller-facing misuse surfaces as an error: unknown deployment ids
//! and invalid trigger registrations. Per-rule action failures are captured
//! into the fire event they belong to, and missing data is a silent skip,
//! not a fault.

use pulse_types::DeploymentId;
use thiserror::Error;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No deployment recorded under the given id.
    #[error("Deployment not found: {0}")]
    DeploymentNotFound(DeploymentId),

    /// A trigger with this name is already registered.
    #[error("Trigger already registered: {0}")]
    DuplicateTrigger(String),

    /// No trigger registered under the given name.
    #[error("Trigger not found: {0}")]
    TriggerNotFound(String),

    /// Trigger spec rejected at registration time.
    #[error("Invalid trigger '{name}': {reason}")]
    InvalidTrigger { name: String, reason: String },

    /// The dispatch loop is already running.
    #[error("Dispatcher already running")]
    AlreadyRunning,
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failure of a trigger action or collaborator call.
///
/// Captured into the fire event, never propagated out of a tick.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action ran and reported failure.
    #[error("Action failed: {0}")]
    Failed(String),

    /// The action did not finish within the configured timeout.
    #[error("Action timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    /// The external collaborator could not be reached.
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}

/// Result type for action execution.
pub type ActionResult<T> = std::result::Result<T, ActionError>;
