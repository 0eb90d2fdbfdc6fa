//! Actions bound to trigger rules.
//!
//! An action is what a rule does when it fires: page someone, roll the
//! deployment back. Concrete variants are selected by explicit
//! configuration at registration time; the engine only sees the [`Action`]
//! capability and records whatever it returns.

mod alert;
mod rollback;

pub use alert::{AlertAction, Notifier};
pub use rollback::{DeploymentManager, RollbackAction, RollbackOutcome};

use async_trait::async_trait;
use pulse_types::FireEvent;
use tracing::debug;

use crate::error::{ActionError, ActionResult};

/// Capability executed when a trigger rule fires.
///
/// Implementations receive the fire record (without its outcome fields) and
/// return a short human-readable result, or an error the engine captures
/// into the event.
#[async_trait]
pub trait Action: Send + Sync {
    /// Short label for logs and fire-event context.
    fn kind(&self) -> &str;

    /// Run the action for a fired trigger.
    async fn execute(&self, event: &FireEvent) -> ActionResult<String>;
}

/// Action that does nothing. Useful for rules that should only appear in
/// history and alert fan-out.
pub struct NoOpAction;

#[async_trait]
impl Action for NoOpAction {
    fn kind(&self) -> &str {
        "noop"
    }

    async fn execute(&self, event: &FireEvent) -> ActionResult<String> {
        debug!(trigger = %event.trigger_name, "No-op action executed");
        Ok("noop".to_string())
    }
}

/// Action that always fails. Test double for failure-isolation paths.
pub struct FailingAction {
    message: String,
}

impl FailingAction {
    /// Create an action that fails with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Action for FailingAction {
    fn kind(&self) -> &str {
        "failing"
    }

    async fn execute(&self, _event: &FireEvent) -> ActionResult<String> {
        Err(ActionError::Failed(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_noop_action() {
        let event = FireEvent::new("r", "m", 1.0, 0.5, Utc::now());
        let result = NoOpAction.execute(&event).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failing_action() {
        let event = FireEvent::new("r", "m", 1.0, 0.5, Utc::now());
        let err = FailingAction::new("boom").execute(&event).await.unwrap_err();
        assert!(matches!(err, ActionError::Failed(_)));
    }
}
