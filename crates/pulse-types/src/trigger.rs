//! Trigger rule configuration and fire events.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Condition a trigger rule evaluates against recent metric history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCondition {
    /// Most recent value is above the threshold.
    Above,
    /// Most recent value is below the threshold.
    Below,
    /// Most recent value equals the threshold (within tolerance).
    Equal,
    /// Absolute percent change between the two most recent values exceeds
    /// the threshold.
    ChangePercent,
}

impl std::fmt::Display for TriggerCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerCondition::Above => write!(f, "above"),
            TriggerCondition::Below => write!(f, "below"),
            TriggerCondition::Equal => write!(f, "equal"),
            TriggerCondition::ChangePercent => write!(f, "change_percent"),
        }
    }
}

/// Serializable configuration half of a trigger rule.
///
/// The engine pairs a spec with an action at registration time and owns the
/// mutable fired-at state separately, so specs can be serialized, diffed,
/// and reloaded without touching live rule state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Unique rule name. Doubles as the rule's identifier.
    pub name: String,

    /// Metric this rule watches.
    pub metric_name: String,

    /// Condition to evaluate.
    pub condition: TriggerCondition,

    /// Threshold the condition compares against.
    pub threshold: f64,

    /// Number of most recent samples the condition considers.
    pub lookback_window: usize,

    /// Minimum wall-clock gap between consecutive fires.
    #[serde(with = "crate::duration_serde")]
    pub cooldown: Duration,

    /// Whether the rule participates in evaluation.
    pub enabled: bool,
}

impl TriggerSpec {
    /// Create a spec with default lookback (1) and cooldown (5 minutes).
    pub fn new(
        name: impl Into<String>,
        metric_name: impl Into<String>,
        condition: TriggerCondition,
        threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            metric_name: metric_name.into(),
            condition,
            threshold,
            lookback_window: 1,
            cooldown: Duration::from_secs(300),
            enabled: true,
        }
    }

    /// Set the lookback window.
    pub fn with_lookback(mut self, lookback_window: usize) -> Self {
        self.lookback_window = lookback_window;
        self
    }

    /// Set the cooldown period.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Create the spec disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Record produced each time a trigger rule fires.
///
/// Appended to the engine's history log; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireEvent {
    /// Name of the rule that fired.
    pub trigger_name: String,

    /// Metric the rule watches.
    pub metric_name: String,

    /// Metric value that satisfied the condition.
    pub current_value: f64,

    /// Threshold the rule compares against.
    pub threshold: f64,

    /// When the rule fired.
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Output of the rule's action, if it succeeded.
    pub action_result: Option<String>,

    /// Error message, if the action failed or timed out.
    pub error: Option<String>,

    /// Whether the action completed successfully.
    pub success: bool,
}

impl FireEvent {
    /// Create a fire record before its action has run.
    ///
    /// `success` starts true: a rule without a bound action has nothing to
    /// fail. [`FireEvent::failed`] flips it once an action error is known.
    pub fn new(
        trigger_name: impl Into<String>,
        metric_name: impl Into<String>,
        current_value: f64,
        threshold: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            trigger_name: trigger_name.into(),
            metric_name: metric_name.into(),
            current_value,
            threshold,
            timestamp,
            action_result: None,
            error: None,
            success: true,
        }
    }

    /// Finalize with the action's successful output.
    pub fn completed(mut self, action_result: impl Into<String>) -> Self {
        self.action_result = Some(action_result.into());
        self.success = true;
        self
    }

    /// Finalize with an action failure or timeout.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.success = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = TriggerSpec::new("high-errors", "error_rate", TriggerCondition::Above, 0.05);
        assert_eq!(spec.lookback_window, 1);
        assert_eq!(spec.cooldown, Duration::from_secs(300));
        assert!(spec.enabled);
    }

    #[test]
    fn test_spec_serde_round_trip() {
        let spec = TriggerSpec::new("cpu-spike", "cpu_usage", TriggerCondition::ChangePercent, 40.0)
            .with_lookback(2)
            .with_cooldown(Duration::from_secs(60));

        let json = serde_json::to_string(&spec).unwrap();
        let back: TriggerSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.condition, TriggerCondition::ChangePercent);
        assert_eq!(back.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_fire_event_lifecycle() {
        let now = chrono::Utc::now();
        let pending = FireEvent::new("r", "m", 1.0, 0.5, now);
        assert!(pending.success);
        assert!(pending.action_result.is_none());

        let ok = FireEvent::new("r", "m", 1.0, 0.5, now).completed("notified");
        assert!(ok.success);
        assert_eq!(ok.action_result.as_deref(), Some("notified"));

        let failed = FireEvent::new("r", "m", 1.0, 0.5, now).failed("sink unavailable");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("sink unavailable"));
    }
}
