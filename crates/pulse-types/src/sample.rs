//! Metric sample types.

use crate::DeploymentId;
use serde::{Deserialize, Serialize};

/// One timestamped metric measurement.
///
/// Samples are immutable once created; the sample store appends them and
/// never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    /// Name of the metric this sample belongs to.
    pub metric_name: String,

    /// Measured value.
    pub value: f64,

    /// When the measurement was taken.
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Deployment active when the sample was produced, if known.
    pub deployment_id: Option<DeploymentId>,
}

impl MetricSample {
    /// Create a sample with an explicit timestamp.
    pub fn new(
        metric_name: impl Into<String>,
        value: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            value,
            timestamp,
            deployment_id: None,
        }
    }

    /// Create a sample timestamped now.
    pub fn now(metric_name: impl Into<String>, value: f64) -> Self {
        Self::new(metric_name, value, chrono::Utc::now())
    }

    /// Attach the deployment that was live when this sample was produced.
    pub fn with_deployment(mut self, deployment_id: DeploymentId) -> Self {
        self.deployment_id = Some(deployment_id);
        self
    }
}
