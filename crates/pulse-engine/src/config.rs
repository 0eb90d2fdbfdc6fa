//! Engine configuration.
//!
//! All knobs with behavioral consequences live here so tests and operators
//! can tune them explicitly instead of relying on magic numbers buried in
//! the evaluation path.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sample store bounds.
    pub store: StoreConfig,

    /// Impact analysis windows and materiality.
    pub impact: ImpactConfig,

    /// Fire-event history retention.
    pub history: HistoryConfig,

    /// Period of the trigger evaluation tick.
    #[serde(with = "pulse_types::duration_serde")]
    pub evaluation_interval: Duration,

    /// Upper bound on a single action or callback execution. A hung
    /// rollback call must not stall the tick loop.
    #[serde(with = "pulse_types::duration_serde")]
    pub action_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            impact: ImpactConfig::default(),
            history: HistoryConfig::default(),
            evaluation_interval: Duration::from_secs(1),
            action_timeout: Duration::from_secs(5),
        }
    }
}

/// Bounds for the per-metric sample series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum samples kept per metric.
    pub max_samples_per_metric: usize,

    /// Number of most recent samples retained when the cap is exceeded.
    /// Evicting down to a floor instead of one-at-a-time avoids thrashing
    /// on every insert.
    pub retention_floor: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_samples_per_metric: 100,
            retention_floor: 50,
        }
    }
}

/// Windows and thresholds for deployment impact analysis.
///
/// The windows are fixed wall-clock offsets around the deployment
/// timestamp. `after_offset` skips the first moments after a deploy, when
/// traffic is still shifting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// How far before the deployment the baseline window reaches.
    #[serde(with = "pulse_types::duration_serde")]
    pub before_window: Duration,

    /// Gap between the deployment and the start of the after window.
    #[serde(with = "pulse_types::duration_serde")]
    pub after_offset: Duration,

    /// How far after the deployment the after window reaches.
    #[serde(with = "pulse_types::duration_serde")]
    pub after_window: Duration,

    /// Percent change above which a metric movement is material.
    pub materiality_pct: f64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            before_window: Duration::from_secs(3600),
            after_offset: Duration::from_secs(60),
            after_window: Duration::from_secs(1800),
            materiality_pct: 5.0,
        }
    }
}

/// Retention for the fire-event history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum fire events kept in memory; oldest are dropped first.
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.store.max_samples_per_metric, 100);
        assert_eq!(config.store.retention_floor, 50);
        assert_eq!(config.impact.materiality_pct, 5.0);
        assert_eq!(config.evaluation_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action_timeout, config.action_timeout);
        assert_eq!(back.impact.before_window, config.impact.before_window);
    }
}
