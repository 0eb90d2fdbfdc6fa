//! Real-time alert dispatcher.
//!
//! The dispatcher owns the sample store, trigger engine, impact analyzer,
//! and history log, and drives the periodic evaluation tick. Ingestion and
//! evaluation share only the sample store; everything an evaluation
//! produces is handed to callers by value.
//!
//! The tick is a scheduler-agnostic unit: [`Dispatcher::run_tick`] can be
//! driven by the built-in interval loop, a test, or any external timer, as
//! long as ticks for one dispatcher do not overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use pulse_stats::VariantComparison;
use pulse_types::{
    Deployment, DeploymentId, FireEvent, ImpactReport, MetricSample, TriggerId, TriggerSpec,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::actions::Action;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::history::FireHistory;
use crate::impact::ImpactAnalyzer;
use crate::store::SampleStore;
use crate::triggers::TriggerEngine;

/// Events emitted by the dispatcher.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A trigger rule was registered.
    TriggerRegistered(TriggerId),

    /// A trigger rule was removed.
    TriggerRemoved(TriggerId),

    /// A trigger fired; the boxed event carries the action outcome.
    TriggerFired(Box<FireEvent>),

    /// A trigger's action failed or timed out.
    ActionFailed { trigger_name: String, error: String },

    /// A deployment notification was recorded.
    DeploymentRecorded(DeploymentId),

    /// An evaluation pass finished.
    EvaluationCompleted {
        rules_evaluated: usize,
        rules_fired: usize,
    },

    /// Graceful shutdown was requested.
    ShutdownRequested,
}

/// Fan-out alert callback. Failures are reported, logged, and isolated.
pub type AlertCallback = Box<dyn Fn(&FireEvent) -> Result<(), String> + Send + Sync>;

/// Drives ingestion, periodic trigger evaluation, and action dispatch.
pub struct Dispatcher {
    config: EngineConfig,
    store: SampleStore,
    triggers: TriggerEngine,
    analyzer: ImpactAnalyzer,
    history: FireHistory,
    callbacks: RwLock<Vec<AlertCallback>>,
    event_tx: broadcast::Sender<EngineEvent>,
    shutdown_tx: watch::Sender<bool>,
    running: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher from configuration.
    pub fn new(config: EngineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            store: SampleStore::new(config.store.clone()),
            triggers: TriggerEngine::new(config.action_timeout),
            analyzer: ImpactAnalyzer::new(config.impact.clone()),
            history: FireHistory::new(config.history.clone()),
            callbacks: RwLock::new(Vec::new()),
            event_tx,
            shutdown_tx,
            running: AtomicBool::new(false),
            config,
        }
    }

    /// Subscribe to dispatcher events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Ingest one metric sample. Best-effort, never fails.
    pub fn record_sample(
        &self,
        metric_name: impl Into<String>,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let sample = match timestamp {
            Some(ts) => MetricSample::new(metric_name, value, ts),
            None => MetricSample::now(metric_name, value),
        };
        self.store.record(sample);
    }

    /// Record a deployment notification from the CI/CD collaborator.
    pub fn record_deployment(&self, deployment: Deployment) {
        let id = deployment.id.clone();
        self.analyzer.record_deployment(deployment);
        let _ = self.event_tx.send(EngineEvent::DeploymentRecorded(id));
    }

    /// Register a trigger rule, optionally binding an action.
    pub fn register_trigger(
        &self,
        spec: TriggerSpec,
        action: Option<Arc<dyn Action>>,
    ) -> EngineResult<TriggerId> {
        let id = self.triggers.register(spec, action)?;
        let _ = self
            .event_tx
            .send(EngineEvent::TriggerRegistered(id.clone()));
        Ok(id)
    }

    /// Remove a trigger rule.
    pub fn unregister_trigger(&self, name: &str) -> EngineResult<()> {
        self.triggers.unregister(name)?;
        let _ = self
            .event_tx
            .send(EngineEvent::TriggerRemoved(TriggerId::new(name)));
        Ok(())
    }

    /// Enable a trigger rule in place.
    pub fn enable_trigger(&self, name: &str) -> EngineResult<()> {
        self.triggers.set_enabled(name, true)
    }

    /// Disable a trigger rule in place.
    pub fn disable_trigger(&self, name: &str) -> EngineResult<()> {
        self.triggers.set_enabled(name, false)
    }

    /// Spec of a registered trigger.
    pub fn get_trigger(&self, name: &str) -> Option<TriggerSpec> {
        self.triggers.get(name)
    }

    /// All registered trigger specs, in name order.
    pub fn list_triggers(&self) -> Vec<TriggerSpec> {
        self.triggers.list()
    }

    /// Look up a recorded deployment.
    pub fn get_deployment(&self, deployment_id: &DeploymentId) -> Option<Deployment> {
        self.analyzer.get_deployment(deployment_id)
    }

    /// Impact report for a recorded deployment.
    pub fn analyze_deployment(&self, deployment_id: &DeploymentId) -> EngineResult<ImpactReport> {
        self.analyzer.analyze(deployment_id, &self.store)
    }

    /// Compare two experiment variants by success counts.
    pub fn compare_variants(
        &self,
        success_a: u64,
        total_a: u64,
        success_b: u64,
        total_b: u64,
    ) -> VariantComparison {
        pulse_stats::compare_variants(success_a, total_a, success_b, total_b)
    }

    /// Fire-event history, oldest first, optionally bounded below.
    pub fn get_history(&self, since: Option<DateTime<Utc>>) -> Vec<FireEvent> {
        match since {
            Some(ts) => self.history.since(ts),
            None => self.history.all(),
        }
    }

    /// Register a callback invoked for every fire event, independent of the
    /// rule's own action.
    pub fn on_alert<F>(&self, callback: F)
    where
        F: Fn(&FireEvent) -> Result<(), String> + Send + Sync + 'static,
    {
        self.callbacks.write().unwrap().push(Box::new(callback));
    }

    /// Direct access to the sample store.
    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// Run one full evaluation pass: evaluate all rules, record fired
    /// events, fan out alerts.
    #[instrument(skip(self))]
    pub async fn run_tick(&self) {
        let now = Utc::now();
        let rules_evaluated = self.triggers.rule_count();
        let events = self.triggers.evaluate_all(&self.store, now).await;
        let rules_fired = events.len();

        for event in events {
            if !event.success {
                let _ = self.event_tx.send(EngineEvent::ActionFailed {
                    trigger_name: event.trigger_name.clone(),
                    error: event.error.clone().unwrap_or_default(),
                });
            }

            self.history.append(event.clone());
            self.fan_out(&event);
            let _ = self.event_tx.send(EngineEvent::TriggerFired(Box::new(event)));
        }

        if rules_fired > 0 {
            debug!(rules_evaluated, rules_fired, "Evaluation pass fired triggers");
        }
        let _ = self.event_tx.send(EngineEvent::EvaluationCompleted {
            rules_evaluated,
            rules_fired,
        });
    }

    /// Invoke every registered alert callback for a fire event.
    ///
    /// A failing callback is logged and never stops the remaining ones.
    fn fan_out(&self, event: &FireEvent) {
        let callbacks = self.callbacks.read().unwrap();
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(e) = callback(event) {
                warn!(
                    callback = index,
                    trigger = %event.trigger_name,
                    error = %e,
                    "Alert callback failed"
                );
            }
        }
    }

    /// Start the periodic evaluation loop.
    ///
    /// Returns the loop's join handle; await it after [`Dispatcher::shutdown`]
    /// to observe the in-flight tick finishing.
    pub fn start(self: &Arc<Self>) -> EngineResult<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }

        // Reset any shutdown signal from a previous run before subscribing,
        // so the fresh receiver only sees future requests.
        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let dispatcher = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(dispatcher.config.evaluation_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            info!(
                interval_ms = dispatcher.config.evaluation_interval.as_millis() as u64,
                "Dispatch loop started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        dispatcher.run_tick().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            dispatcher.running.store(false, Ordering::SeqCst);
            info!("Dispatch loop stopped");
        });

        Ok(handle)
    }

    /// Request graceful shutdown: the in-flight tick finishes, no further
    /// ticks run, store and history stay intact for inspection.
    pub fn shutdown(&self) {
        let _ = self.event_tx.send(EngineEvent::ShutdownRequested);
        self.shutdown_tx.send_replace(true);
    }

    /// Whether the evaluation loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{FailingAction, NoOpAction};
    use pulse_types::TriggerCondition;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(EngineConfig::default())
    }

    #[tokio::test]
    async fn test_tick_records_history_and_fans_out() {
        let dispatcher = dispatcher();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = seen.clone();
        dispatcher.on_alert(move |_event| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher
            .register_trigger(
                TriggerSpec::new("r", "m", TriggerCondition::Above, 0.5),
                Some(Arc::new(NoOpAction)),
            )
            .unwrap();
        dispatcher.record_sample("m", 1.0, None);

        dispatcher.run_tick().await;

        assert_eq!(dispatcher.get_history(None).len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_stop_others() {
        let dispatcher = dispatcher();
        let seen = Arc::new(AtomicUsize::new(0));

        dispatcher.on_alert(|_event| Err("callback exploded".to_string()));
        let seen_clone = seen.clone();
        dispatcher.on_alert(move |_event| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher
            .register_trigger(TriggerSpec::new("r", "m", TriggerCondition::Above, 0.5), None)
            .unwrap();
        dispatcher.record_sample("m", 1.0, None);

        dispatcher.run_tick().await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_action_emits_event_and_history_entry() {
        let dispatcher = dispatcher();
        let mut events = dispatcher.subscribe();

        dispatcher
            .register_trigger(
                TriggerSpec::new("r", "m", TriggerCondition::Above, 0.5),
                Some(Arc::new(FailingAction::new("boom"))),
            )
            .unwrap();
        dispatcher.record_sample("m", 1.0, None);

        dispatcher.run_tick().await;

        let history = dispatcher.get_history(None);
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);

        // Skip the registration event, then expect the failure.
        let mut saw_action_failed = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::ActionFailed { .. }) {
                saw_action_failed = true;
            }
        }
        assert!(saw_action_failed);
    }

    #[tokio::test]
    async fn test_history_since_filter() {
        let dispatcher = dispatcher();
        dispatcher
            .register_trigger(
                TriggerSpec::new("r", "m", TriggerCondition::Above, 0.5)
                    .with_cooldown(Duration::ZERO),
                None,
            )
            .unwrap();

        dispatcher.record_sample("m", 1.0, None);
        dispatcher.run_tick().await;

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert!(dispatcher.get_history(Some(cutoff)).is_empty());
        assert_eq!(dispatcher.get_history(None).len(), 1);
    }

    #[tokio::test]
    async fn test_compare_variants_surface() {
        let comparison = dispatcher().compare_variants(50, 1000, 80, 1000);
        assert!(comparison.significant);
        assert!((comparison.effect_size - 0.03).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_loop_start_shutdown() {
        let mut config = EngineConfig::default();
        config.evaluation_interval = Duration::from_millis(10);
        let dispatcher = Arc::new(Dispatcher::new(config));

        dispatcher
            .register_trigger(
                TriggerSpec::new("r", "m", TriggerCondition::Above, 0.5)
                    .with_cooldown(Duration::ZERO),
                None,
            )
            .unwrap();
        dispatcher.record_sample("m", 1.0, None);

        let handle = dispatcher.start().unwrap();
        assert!(dispatcher.is_running());
        assert!(matches!(
            dispatcher.start(),
            Err(crate::error::EngineError::AlreadyRunning)
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        dispatcher.shutdown();
        handle.await.unwrap();

        assert!(!dispatcher.is_running());
        // Fired on several ticks; store and history intact after shutdown.
        assert!(!dispatcher.get_history(None).is_empty());
        assert_eq!(dispatcher.store().len("m"), 1);
    }

    #[tokio::test]
    async fn test_loop_restarts_after_shutdown() {
        let mut config = EngineConfig::default();
        config.evaluation_interval = Duration::from_millis(10);
        let dispatcher = Arc::new(Dispatcher::new(config));

        let handle = dispatcher.start().unwrap();
        dispatcher.shutdown();
        handle.await.unwrap();

        // A fresh loop must not observe the previous shutdown signal.
        let handle = dispatcher.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dispatcher.is_running());

        dispatcher.shutdown();
        handle.await.unwrap();
    }
}
