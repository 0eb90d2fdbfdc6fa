//! Deployment record types.
//!
//! A deployment record is created once from the CI/CD notifier and kept
//! immutable for the lifetime of impact-analysis queries referencing it.

use crate::DeploymentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An immutable record of a shipped version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment identifier, assigned by the notifier.
    pub id: DeploymentId,

    /// When the deployment went live.
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Target environment (e.g. "production", "staging").
    pub environment: String,

    /// Version shipped. Opaque to the engine.
    pub version: String,

    /// Feature names included in this deployment.
    pub features: BTreeSet<String>,
}

impl Deployment {
    /// Create a deployment record timestamped now.
    pub fn new(
        id: DeploymentId,
        environment: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id,
            timestamp: chrono::Utc::now(),
            environment: environment.into(),
            version: version.into(),
            features: BTreeSet::new(),
        }
    }

    /// Override the deployment timestamp.
    pub fn with_timestamp(mut self, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach the set of shipped feature names.
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_round_trip() {
        let deployment = Deployment::new(DeploymentId::new("d-1"), "production", "1.4.2")
            .with_features(["new-checkout", "dark-mode"]);

        assert_eq!(deployment.features.len(), 2);

        let json = serde_json::to_string(&deployment).unwrap();
        let back: Deployment = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, deployment.id);
        assert_eq!(back.features, deployment.features);
    }
}
