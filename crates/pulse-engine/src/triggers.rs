//! Trigger rule engine.
//!
//! Rules live in an arena keyed by their unique name and are evaluated in
//! name order each tick, so a run over unchanged data is deterministic.
//! Each rule moves through Idle, Armed (scheduled this tick), Fired
//! (condition held, action executing), and Cooldown before returning to
//! Idle; a disabled rule is excluded from evaluation entirely.
//!
//! Missing data is not a fault: a rule whose metric has fewer samples than
//! its lookback window simply does not fire this tick. Action failures are
//! captured into the fire event and never abort the remaining rules.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pulse_stats::percent_change;
use pulse_types::{FireEvent, MetricSample, TriggerCondition, TriggerId, TriggerSpec};
use tracing::{debug, instrument, warn};

use crate::actions::Action;
use crate::error::{ActionError, EngineError, EngineResult};
use crate::store::SampleStore;

/// Tolerance for the `Equal` condition, to sidestep floating-point
/// equality brittleness.
pub const EQUAL_TOLERANCE: f64 = 1e-3;

/// A registered rule: immutable spec plus engine-owned fired-at state.
struct TriggerRule {
    spec: TriggerSpec,
    action: Option<Arc<dyn Action>>,
    last_fired_at: Option<DateTime<Utc>>,
}

/// Evaluates trigger rules against the sample store.
pub struct TriggerEngine {
    rules: DashMap<String, TriggerRule>,
    action_timeout: Duration,
}

impl TriggerEngine {
    /// Create an engine whose actions are bounded by `action_timeout`.
    pub fn new(action_timeout: Duration) -> Self {
        Self {
            rules: DashMap::new(),
            action_timeout,
        }
    }

    /// Register a rule, optionally binding an action to run when it fires.
    ///
    /// Rejects duplicate names and malformed specs before they enter the
    /// engine.
    pub fn register(
        &self,
        spec: TriggerSpec,
        action: Option<Arc<dyn Action>>,
    ) -> EngineResult<TriggerId> {
        validate_spec(&spec)?;

        if self.rules.contains_key(&spec.name) {
            return Err(EngineError::DuplicateTrigger(spec.name));
        }

        let id = TriggerId::new(spec.name.clone());
        debug!(trigger = %id, metric = %spec.metric_name, condition = %spec.condition, "Registered trigger");

        self.rules.insert(
            spec.name.clone(),
            TriggerRule {
                spec,
                action,
                last_fired_at: None,
            },
        );

        Ok(id)
    }

    /// Remove a rule.
    pub fn unregister(&self, name: &str) -> EngineResult<()> {
        self.rules
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::TriggerNotFound(name.to_string()))
    }

    /// Toggle a rule in place; no re-registration needed.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> EngineResult<()> {
        let mut rule = self
            .rules
            .get_mut(name)
            .ok_or_else(|| EngineError::TriggerNotFound(name.to_string()))?;
        rule.spec.enabled = enabled;
        debug!(trigger = %name, enabled, "Toggled trigger");
        Ok(())
    }

    /// Spec of a registered rule.
    pub fn get(&self, name: &str) -> Option<TriggerSpec> {
        self.rules.get(name).map(|r| r.spec.clone())
    }

    /// All registered specs, in name order.
    pub fn list(&self) -> Vec<TriggerSpec> {
        let mut specs: Vec<TriggerSpec> = self.rules.iter().map(|r| r.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// When a rule last fired, if ever.
    pub fn last_fired_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.rules.get(name).and_then(|r| r.last_fired_at)
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate every enabled rule against the store, firing those whose
    /// condition holds.
    ///
    /// Rules are visited in name order. One failing action never aborts the
    /// remaining rules in the same pass.
    #[instrument(skip(self, store))]
    pub async fn evaluate_all(&self, store: &SampleStore, now: DateTime<Utc>) -> Vec<FireEvent> {
        let mut names: Vec<String> = self.rules.iter().map(|r| r.key().clone()).collect();
        names.sort();

        let mut events = Vec::new();

        for name in names {
            // Snapshot the rule so the action runs without holding a shard
            // lock; the rule may be unregistered mid-pass.
            let (spec, action, last_fired_at) = match self.rules.get(&name) {
                Some(rule) => (rule.spec.clone(), rule.action.clone(), rule.last_fired_at),
                None => continue,
            };

            if !spec.enabled {
                continue;
            }

            if in_cooldown(last_fired_at, spec.cooldown, now) {
                debug!(trigger = %name, "Cooldown not elapsed, skipping");
                continue;
            }

            let samples = store.recent(&spec.metric_name, spec.lookback_window);
            if samples.len() < spec.lookback_window {
                debug!(
                    trigger = %name,
                    have = samples.len(),
                    need = spec.lookback_window,
                    "Insufficient samples, skipping"
                );
                continue;
            }

            let Some(current_value) = condition_holds(&spec, &samples) else {
                continue;
            };

            let event = self.fire(&name, &spec, action, current_value, now).await;

            if let Some(mut rule) = self.rules.get_mut(&name) {
                rule.last_fired_at = Some(now);
            }

            events.push(event);
        }

        events
    }

    /// Run a fired rule's action under the timeout and finalize the event.
    async fn fire(
        &self,
        name: &str,
        spec: &TriggerSpec,
        action: Option<Arc<dyn Action>>,
        current_value: f64,
        now: DateTime<Utc>,
    ) -> FireEvent {
        let pending = FireEvent::new(name, &spec.metric_name, current_value, spec.threshold, now);

        let Some(action) = action else {
            debug!(trigger = %name, value = current_value, "Trigger fired (no action bound)");
            return pending;
        };

        match tokio::time::timeout(self.action_timeout, action.execute(&pending)).await {
            Ok(Ok(result)) => {
                debug!(trigger = %name, action = action.kind(), "Action succeeded");
                pending.completed(result)
            }
            Ok(Err(e)) => {
                warn!(trigger = %name, action = action.kind(), error = %e, "Action failed");
                pending.failed(e.to_string())
            }
            Err(_) => {
                let e = ActionError::TimedOut {
                    timeout_ms: self.action_timeout.as_millis() as u64,
                };
                warn!(trigger = %name, action = action.kind(), error = %e, "Action timed out");
                pending.failed(e.to_string())
            }
        }
    }
}

/// Whether a rule is still inside its cooldown window.
///
/// A negative elapsed duration (clock skew) counts as inside cooldown.
fn in_cooldown(
    last_fired_at: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> bool {
    match last_fired_at {
        Some(last) => match now.signed_duration_since(last).to_std() {
            Ok(elapsed) => elapsed < cooldown,
            Err(_) => true,
        },
        None => false,
    }
}

/// Evaluate a rule's condition against its lookback samples.
///
/// Returns the current metric value when the condition holds. Samples are
/// chronological; the caller guarantees at least one.
fn condition_holds(spec: &TriggerSpec, samples: &[MetricSample]) -> Option<f64> {
    let latest = samples.last()?;

    match spec.condition {
        TriggerCondition::Above => (latest.value > spec.threshold).then_some(latest.value),
        TriggerCondition::Below => (latest.value < spec.threshold).then_some(latest.value),
        TriggerCondition::Equal => {
            ((latest.value - spec.threshold).abs() <= EQUAL_TOLERANCE).then_some(latest.value)
        }
        TriggerCondition::ChangePercent => {
            if samples.len() < 2 {
                return None;
            }
            let previous = &samples[samples.len() - 2];
            let change = percent_change(previous.value, latest.value);
            (change.abs() > spec.threshold).then_some(latest.value)
        }
    }
}

fn validate_spec(spec: &TriggerSpec) -> EngineResult<()> {
    let invalid = |reason: &str| EngineError::InvalidTrigger {
        name: spec.name.clone(),
        reason: reason.to_string(),
    };

    if spec.name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if spec.metric_name.is_empty() {
        return Err(invalid("metric name must not be empty"));
    }
    if !spec.threshold.is_finite() {
        return Err(invalid("threshold must be finite"));
    }
    if spec.lookback_window == 0 {
        return Err(invalid("lookback window must be at least 1"));
    }
    if spec.condition == TriggerCondition::ChangePercent && spec.lookback_window < 2 {
        return Err(invalid("change_percent requires a lookback window of at least 2"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{FailingAction, NoOpAction};
    use crate::config::StoreConfig;
    use chrono::Duration as ChronoDuration;

    fn test_store() -> SampleStore {
        SampleStore::new(StoreConfig::default())
    }

    fn feed(store: &SampleStore, metric: &str, values: &[f64], base: DateTime<Utc>) {
        for (i, value) in values.iter().enumerate() {
            store.record(MetricSample::new(
                metric,
                *value,
                base + ChronoDuration::seconds(i as i64),
            ));
        }
    }

    fn engine() -> TriggerEngine {
        TriggerEngine::new(Duration::from_secs(5))
    }

    #[test]
    fn test_register_validates_spec() {
        let engine = engine();

        let zero_lookback =
            TriggerSpec::new("r", "m", TriggerCondition::Above, 1.0).with_lookback(0);
        assert!(matches!(
            engine.register(zero_lookback, None),
            Err(EngineError::InvalidTrigger { .. })
        ));

        let nan_threshold = TriggerSpec::new("r", "m", TriggerCondition::Above, f64::NAN);
        assert!(matches!(
            engine.register(nan_threshold, None),
            Err(EngineError::InvalidTrigger { .. })
        ));

        let narrow_change =
            TriggerSpec::new("r", "m", TriggerCondition::ChangePercent, 10.0).with_lookback(1);
        assert!(matches!(
            engine.register(narrow_change, None),
            Err(EngineError::InvalidTrigger { .. })
        ));
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let engine = engine();
        let spec = TriggerSpec::new("dup", "m", TriggerCondition::Above, 1.0);

        engine.register(spec.clone(), None).unwrap();
        assert!(matches!(
            engine.register(spec, None),
            Err(EngineError::DuplicateTrigger(_))
        ));
    }

    #[test]
    fn test_enable_disable_in_place() {
        let engine = engine();
        engine
            .register(TriggerSpec::new("r", "m", TriggerCondition::Above, 1.0), None)
            .unwrap();

        engine.set_enabled("r", false).unwrap();
        assert!(!engine.get("r").unwrap().enabled);

        engine.set_enabled("r", true).unwrap();
        assert!(engine.get("r").unwrap().enabled);

        assert!(matches!(
            engine.set_enabled("ghost", true),
            Err(EngineError::TriggerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fires_once_then_respects_cooldown() {
        let engine = engine();
        let store = test_store();
        let base = Utc::now() - ChronoDuration::minutes(10);

        let spec = TriggerSpec::new("high-errors", "error_rate", TriggerCondition::Above, 0.05)
            .with_cooldown(Duration::from_secs(300));
        engine.register(spec, Some(Arc::new(NoOpAction))).unwrap();

        feed(&store, "error_rate", &[0.01, 0.01, 0.08], base);
        let t1 = base + ChronoDuration::seconds(10);
        let events = engine.evaluate_all(&store, t1).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trigger_name, "high-errors");
        assert_eq!(events[0].current_value, 0.08);
        assert!(events[0].success);
        assert_eq!(engine.last_fired_at("high-errors"), Some(t1));

        // Another breach within the cooldown: no fire.
        store.record(MetricSample::new(
            "error_rate",
            0.09,
            base + ChronoDuration::seconds(20),
        ));
        let t2 = t1 + ChronoDuration::seconds(60);
        assert!(engine.evaluate_all(&store, t2).await.is_empty());

        // After the cooldown elapses, it may fire again.
        let t3 = t1 + ChronoDuration::seconds(301);
        assert_eq!(engine.evaluate_all(&store, t3).await.len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_samples_is_silent_skip() {
        let engine = engine();
        let store = test_store();

        let spec = TriggerSpec::new("needs-three", "m", TriggerCondition::Above, 0.0)
            .with_lookback(3);
        engine.register(spec, None).unwrap();

        feed(&store, "m", &[1.0, 2.0], Utc::now() - ChronoDuration::minutes(1));
        assert!(engine.evaluate_all(&store, Utc::now()).await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_rule_never_fires() {
        let engine = engine();
        let store = test_store();

        engine
            .register(
                TriggerSpec::new("r", "m", TriggerCondition::Above, 0.0).disabled(),
                None,
            )
            .unwrap();
        feed(&store, "m", &[5.0], Utc::now() - ChronoDuration::minutes(1));

        assert!(engine.evaluate_all(&store, Utc::now()).await.is_empty());

        engine.set_enabled("r", true).unwrap();
        assert_eq!(engine.evaluate_all(&store, Utc::now()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_change_percent_condition() {
        let engine = engine();
        let store = test_store();
        let base = Utc::now() - ChronoDuration::minutes(5);

        let spec = TriggerSpec::new("latency-jump", "p99_ms", TriggerCondition::ChangePercent, 40.0)
            .with_lookback(2)
            .with_cooldown(Duration::ZERO);
        engine.register(spec, None).unwrap();

        // 100 -> 120 is +20%, below the 40% threshold.
        feed(&store, "p99_ms", &[100.0, 120.0], base);
        assert!(engine.evaluate_all(&store, Utc::now()).await.is_empty());

        // 120 -> 200 is +66%, fires. Drops count too: abs() of the change.
        store.record(MetricSample::new(
            "p99_ms",
            200.0,
            base + ChronoDuration::seconds(10),
        ));
        assert_eq!(engine.evaluate_all(&store, Utc::now()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_equal_condition_tolerance() {
        let engine = engine();
        let store = test_store();

        let spec = TriggerSpec::new("exact", "ratio", TriggerCondition::Equal, 1.0)
            .with_cooldown(Duration::ZERO);
        engine.register(spec, None).unwrap();

        feed(&store, "ratio", &[1.0005], Utc::now() - ChronoDuration::minutes(1));
        assert_eq!(engine.evaluate_all(&store, Utc::now()).await.len(), 1);

        store.record(MetricSample::now("ratio", 1.01));
        assert!(engine.evaluate_all(&store, Utc::now()).await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_action_captured_and_isolated() {
        let engine = engine();
        let store = test_store();
        let base = Utc::now() - ChronoDuration::minutes(1);

        // Name order puts the failing rule first.
        engine
            .register(
                TriggerSpec::new("a-fails", "m", TriggerCondition::Above, 0.0),
                Some(Arc::new(FailingAction::new("downstream exploded"))),
            )
            .unwrap();
        engine
            .register(
                TriggerSpec::new("b-succeeds", "m", TriggerCondition::Above, 0.0),
                Some(Arc::new(NoOpAction)),
            )
            .unwrap();

        feed(&store, "m", &[1.0], base);
        let events = engine.evaluate_all(&store, Utc::now()).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].trigger_name, "a-fails");
        assert!(!events[0].success);
        assert!(events[0].error.as_deref().unwrap().contains("downstream exploded"));
        assert!(events[1].success);
    }

    #[tokio::test]
    async fn test_slow_action_times_out() {
        struct SlowAction;

        #[async_trait::async_trait]
        impl Action for SlowAction {
            fn kind(&self) -> &str {
                "slow"
            }

            async fn execute(&self, _event: &FireEvent) -> crate::error::ActionResult<String> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("too late".to_string())
            }
        }

        let engine = TriggerEngine::new(Duration::from_millis(20));
        let store = test_store();

        engine
            .register(
                TriggerSpec::new("hangs", "m", TriggerCondition::Above, 0.0),
                Some(Arc::new(SlowAction)),
            )
            .unwrap();
        feed(&store, "m", &[1.0], Utc::now() - ChronoDuration::minutes(1));

        let events = engine.evaluate_all(&store, Utc::now()).await;
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert!(events[0].error.as_deref().unwrap().contains("timed out"));
    }
}
