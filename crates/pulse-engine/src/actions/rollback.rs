//! Rollback action delegating to an external deployment manager.

use std::sync::Arc;

use async_trait::async_trait;
use pulse_types::{DeploymentId, FireEvent};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Action;
use crate::error::ActionResult;

/// Result reported by the deployment manager for a rollback request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// Manager-reported status (e.g. "initiated", "completed").
    pub status: String,

    /// Version the environment was rolled back to.
    pub version: String,
}

/// External deployment manager collaborator.
///
/// Rollback execution is delegated entirely; the engine records the
/// reported outcome and guarantees nothing about delivery.
#[async_trait]
pub trait DeploymentManager: Send + Sync {
    /// Roll back the given deployment, or the latest one when `None`.
    async fn rollback(&self, deployment_id: Option<&DeploymentId>)
        -> ActionResult<RollbackOutcome>;
}

/// Action that asks the deployment manager to roll back.
pub struct RollbackAction {
    manager: Arc<dyn DeploymentManager>,
    deployment_id: Option<DeploymentId>,
}

impl RollbackAction {
    /// Roll back whatever the manager considers the latest deployment.
    pub fn latest(manager: Arc<dyn DeploymentManager>) -> Self {
        Self {
            manager,
            deployment_id: None,
        }
    }

    /// Roll back a specific deployment.
    pub fn for_deployment(manager: Arc<dyn DeploymentManager>, deployment_id: DeploymentId) -> Self {
        Self {
            manager,
            deployment_id: Some(deployment_id),
        }
    }
}

#[async_trait]
impl Action for RollbackAction {
    fn kind(&self) -> &str {
        "rollback"
    }

    async fn execute(&self, event: &FireEvent) -> ActionResult<String> {
        warn!(
            trigger = %event.trigger_name,
            metric = %event.metric_name,
            value = event.current_value,
            "Trigger fired, requesting rollback"
        );

        let outcome = self.manager.rollback(self.deployment_id.as_ref()).await?;
        Ok(format!(
            "rollback {}: now at version {}",
            outcome.status, outcome.version
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use chrono::Utc;

    struct StubManager {
        fail: bool,
    }

    #[async_trait]
    impl DeploymentManager for StubManager {
        async fn rollback(
            &self,
            deployment_id: Option<&DeploymentId>,
        ) -> ActionResult<RollbackOutcome> {
            if self.fail {
                return Err(ActionError::CollaboratorUnavailable(
                    "deploy api down".to_string(),
                ));
            }
            Ok(RollbackOutcome {
                status: "completed".to_string(),
                version: deployment_id
                    .map(|id| format!("pre-{}", id))
                    .unwrap_or_else(|| "previous".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_rollback_success() {
        let action = RollbackAction::for_deployment(
            Arc::new(StubManager { fail: false }),
            DeploymentId::new("d-7"),
        );
        let event = FireEvent::new("r", "error_rate", 0.3, 0.05, Utc::now());

        let result = action.execute(&event).await.unwrap();
        assert!(result.contains("pre-d-7"));
    }

    #[tokio::test]
    async fn test_rollback_failure_is_reported_not_panicked() {
        let action = RollbackAction::latest(Arc::new(StubManager { fail: true }));
        let event = FireEvent::new("r", "error_rate", 0.3, 0.05, Utc::now());

        let err = action.execute(&event).await.unwrap_err();
        assert!(matches!(err, ActionError::CollaboratorUnavailable(_)));
    }
}
