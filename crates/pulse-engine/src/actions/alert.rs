//! Alert action and the notification sink it forwards to.

use std::sync::Arc;

use async_trait::async_trait;
use pulse_types::FireEvent;
use tracing::debug;

use super::Action;
use crate::error::ActionResult;

/// External notification sink.
///
/// Implemented by the collaborator that actually delivers alerts (chat,
/// email, pager). Failure is reported back, never swallowed here.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert for a fired trigger. Returns an acknowledgement.
    async fn notify(&self, event: &FireEvent) -> ActionResult<String>;
}

/// Action that forwards fire events to a [`Notifier`].
pub struct AlertAction {
    notifier: Arc<dyn Notifier>,
}

impl AlertAction {
    /// Create an alert action backed by the given sink.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Action for AlertAction {
    fn kind(&self) -> &str {
        "alert"
    }

    async fn execute(&self, event: &FireEvent) -> ActionResult<String> {
        debug!(
            trigger = %event.trigger_name,
            metric = %event.metric_name,
            value = event.current_value,
            "Dispatching alert"
        );
        self.notifier.notify(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingNotifier {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &FireEvent) -> ActionResult<String> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(format!("ack:{}", event.trigger_name))
        }
    }

    #[tokio::test]
    async fn test_alert_forwards_to_notifier() {
        let notifier = Arc::new(RecordingNotifier {
            delivered: AtomicUsize::new(0),
        });
        let action = AlertAction::new(notifier.clone());

        let event = FireEvent::new("high-errors", "error_rate", 0.2, 0.05, Utc::now());
        let ack = action.execute(&event).await.unwrap();

        assert_eq!(ack, "ack:high-errors");
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);
    }
}
