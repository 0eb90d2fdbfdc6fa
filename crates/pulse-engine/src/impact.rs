//! Deployment impact analysis.
//!
//! Correlates a recorded deployment with before/after windows of every
//! tracked metric and classifies the overall regression risk. Reports are
//! computed on demand from the current store contents; identical inputs
//! produce identical reports.

#[cfg(test)]
use chrono::Utc;
use dashmap::DashMap;
use pulse_stats::{mean, percent_change};
use pulse_types::{
    Deployment, DeploymentId, ImpactReport, ImprovementDirection, MetricCategory, MetricImpact,
    RiskLevel,
};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use crate::config::ImpactConfig;
use crate::error::{EngineError, EngineResult};
use crate::store::SampleStore;

/// Analyzes metric movement around recorded deployments.
pub struct ImpactAnalyzer {
    config: ImpactConfig,
    deployments: DashMap<DeploymentId, Deployment>,
}

impl ImpactAnalyzer {
    /// Create an analyzer with the given windows and materiality.
    pub fn new(config: ImpactConfig) -> Self {
        Self {
            config,
            deployments: DashMap::new(),
        }
    }

    /// Record a deployment notification. Deployments are immutable; a
    /// second notification for the same id is ignored.
    pub fn record_deployment(&self, deployment: Deployment) {
        if self.deployments.contains_key(&deployment.id) {
            warn!(deployment_id = %deployment.id, "Duplicate deployment notification ignored");
            return;
        }
        debug!(
            deployment_id = %deployment.id,
            environment = %deployment.environment,
            version = %deployment.version,
            "Recorded deployment"
        );
        self.deployments.insert(deployment.id.clone(), deployment);
    }

    /// Look up a recorded deployment.
    pub fn get_deployment(&self, id: &DeploymentId) -> Option<Deployment> {
        self.deployments.get(id).map(|d| d.clone())
    }

    /// Number of recorded deployments.
    pub fn deployment_count(&self) -> usize {
        self.deployments.len()
    }

    /// Build an impact report for a recorded deployment.
    ///
    /// Metrics with an empty window on either side are omitted from the
    /// report rather than failing it.
    #[instrument(skip(self, store, deployment_id), fields(deployment_id = %deployment_id))]
    pub fn analyze(
        &self,
        deployment_id: &DeploymentId,
        store: &SampleStore,
    ) -> EngineResult<ImpactReport> {
        let deployment = self
            .deployments
            .get(deployment_id)
            .map(|d| d.clone())
            .ok_or_else(|| EngineError::DeploymentNotFound(deployment_id.clone()))?;

        let t0 = deployment.timestamp;
        let before_start = t0 - self.config.before_window;
        let after_start = t0 + self.config.after_offset;
        let after_end = t0 + self.config.after_window;

        let mut per_metric = BTreeMap::new();
        let mut significant_changes = Vec::new();
        let mut adverse_count = 0usize;

        for metric in store.metric_names() {
            let before_values: Vec<f64> = store
                .window(&metric, before_start, t0)
                .iter()
                .map(|s| s.value)
                .collect();
            let after_values: Vec<f64> = store
                .window(&metric, after_start, after_end)
                .iter()
                .map(|s| s.value)
                .collect();

            let (Some(before), Some(after)) = (mean(&before_values), mean(&after_values)) else {
                debug!(metric = %metric, "Empty window on one side, omitting metric");
                continue;
            };

            let change_percent = percent_change(before, after);
            let significant = change_percent.abs() > self.config.materiality_pct;

            if significant {
                significant_changes.push(metric.clone());
                if MetricCategory::from_name(&metric).is_adverse(change_percent) {
                    adverse_count += 1;
                }
            }

            per_metric.insert(
                metric,
                MetricImpact {
                    before,
                    after,
                    change_percent,
                    significant,
                },
            );
        }

        let risk_level = if adverse_count > 2 {
            RiskLevel::High
        } else if adverse_count > 0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        // More metrics raise confidence; more significant movement lowers
        // it (more investigation needed before trusting the verdict).
        let confidence = ((per_metric.len() as f64 * 0.2).min(1.0)
            - (significant_changes.len() as f64 * 0.1).min(0.5))
        .clamp(0.0, 1.0);

        let recommendations = build_recommendations(&per_metric, risk_level);

        debug!(
            deployment_id = %deployment_id,
            metrics = per_metric.len(),
            significant = significant_changes.len(),
            adverse = adverse_count,
            risk = %risk_level,
            "Impact analysis complete"
        );

        Ok(ImpactReport {
            deployment_id: deployment_id.clone(),
            per_metric,
            significant_changes,
            risk_level,
            recommendations,
            confidence,
        })
    }
}

/// Fixed recommendation table keyed by metric category and direction.
fn build_recommendations(
    per_metric: &BTreeMap<String, MetricImpact>,
    risk_level: RiskLevel,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    let mut any_significant = false;

    for (metric, impact) in per_metric {
        if !impact.significant {
            continue;
        }
        any_significant = true;

        let category = MetricCategory::from_name(metric);
        if category.is_adverse(impact.change_percent) {
            let text = match category {
                MetricCategory::ErrorRate => format!(
                    "{} increased by {:.1}% after the deployment; investigate immediately",
                    metric, impact.change_percent
                ),
                MetricCategory::Latency => format!(
                    "{} regressed by {:.1}%; profile the changes in this release",
                    metric, impact.change_percent
                ),
                MetricCategory::Conversion => format!(
                    "{} dropped by {:.1}%; review user-facing changes in this release",
                    metric,
                    impact.change_percent.abs()
                ),
                MetricCategory::Engagement => format!(
                    "{} declined by {:.1}%; watch it closely over the next day",
                    metric,
                    impact.change_percent.abs()
                ),
                MetricCategory::Revenue => format!(
                    "{} declined by {:.1}%; verify billing and checkout paths",
                    metric,
                    impact.change_percent.abs()
                ),
                // Neutral categories are never adverse.
                MetricCategory::Other => continue,
            };
            recommendations.push(text);
        } else if category.direction() == ImprovementDirection::Neutral {
            recommendations.push(format!(
                "{} changed by {:.1}%; confirm this movement is expected",
                metric, impact.change_percent
            ));
        }
    }

    if risk_level == RiskLevel::High {
        recommendations.push("High risk: consider rolling back this deployment".to_string());
    }

    if !any_significant {
        recommendations
            .push("No significant metric changes detected; deployment looks safe".to_string());
    }

    recommendations
}
