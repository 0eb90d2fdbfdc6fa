//! Deployment impact report types.

use crate::DeploymentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse classification of deployment-induced regression severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Which direction of movement improves a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementDirection {
    /// Increases are regressions (error rates, latency).
    LowerIsBetter,
    /// Decreases are regressions (conversion, engagement, revenue).
    HigherIsBetter,
    /// No known direction; changes are reported but never adverse.
    Neutral,
}

/// Category a metric belongs to, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    ErrorRate,
    Latency,
    Conversion,
    Engagement,
    Revenue,
    Other,
}

impl MetricCategory {
    /// Classify a metric by name fragment.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        const ERROR_HINTS: &[&str] = &["error", "fail", "crash", "exception"];
        const LATENCY_HINTS: &[&str] = &["latency", "duration", "response_time", "p95", "p99"];
        const CONVERSION_HINTS: &[&str] = &["conversion", "signup", "checkout", "purchase"];
        const ENGAGEMENT_HINTS: &[&str] = &["dau", "mau", "active", "retention", "session"];
        const REVENUE_HINTS: &[&str] = &["revenue", "arpu", "mrr"];

        let matches = |hints: &[&str]| hints.iter().any(|h| name.contains(h));

        if matches(ERROR_HINTS) {
            MetricCategory::ErrorRate
        } else if matches(LATENCY_HINTS) {
            MetricCategory::Latency
        } else if matches(CONVERSION_HINTS) {
            MetricCategory::Conversion
        } else if matches(ENGAGEMENT_HINTS) {
            MetricCategory::Engagement
        } else if matches(REVENUE_HINTS) {
            MetricCategory::Revenue
        } else {
            MetricCategory::Other
        }
    }

    /// Improvement direction for this category.
    pub fn direction(&self) -> ImprovementDirection {
        match self {
            MetricCategory::ErrorRate | MetricCategory::Latency => {
                ImprovementDirection::LowerIsBetter
            }
            MetricCategory::Conversion | MetricCategory::Engagement | MetricCategory::Revenue => {
                ImprovementDirection::HigherIsBetter
            }
            MetricCategory::Other => ImprovementDirection::Neutral,
        }
    }

    /// Whether a percent change in this category is a regression.
    pub fn is_adverse(&self, change_percent: f64) -> bool {
        match self.direction() {
            ImprovementDirection::LowerIsBetter => change_percent > 0.0,
            ImprovementDirection::HigherIsBetter => change_percent < 0.0,
            ImprovementDirection::Neutral => false,
        }
    }
}

/// Before/after summary for a single metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricImpact {
    /// Mean over the pre-deployment window.
    pub before: f64,

    /// Mean over the post-deployment window.
    pub after: f64,

    /// Percent change from before to after.
    pub change_percent: f64,

    /// Whether the change exceeds the materiality threshold.
    pub significant: bool,
}

/// Statistical before/after summary correlated to a deployment.
///
/// Computed on demand from the current sample store contents; identical
/// inputs produce identical reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Deployment this report describes.
    pub deployment_id: DeploymentId,

    /// Per-metric before/after summaries. Metrics with an empty window on
    /// either side are omitted.
    pub per_metric: BTreeMap<String, MetricImpact>,

    /// Names of metrics whose change was significant.
    pub significant_changes: Vec<String>,

    /// Overall regression severity.
    pub risk_level: RiskLevel,

    /// Human-readable follow-up suggestions.
    pub recommendations: Vec<String>,

    /// Confidence in the report, in `[0, 1]`. More metrics raise it, more
    /// significant changes lower it.
    pub confidence: f64,
}
