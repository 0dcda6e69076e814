use crate::app::subscription::MessageHandler;
use crate::domain::{NotificationRequest, UserNotice};
use crate::ports::{SupervisorPort, UserInterfacePort};
use crate::telemetry::BridgeMetrics;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Relays supervisor notifications to the user and reports the chosen action.
///
/// Waiting for the user happens off the stream: each notification gets its
/// own task so later messages are not held up. Pending waits are aborted
/// when the dispatcher is dropped.
pub struct NotificationDispatcher {
    supervisor: Arc<dyn SupervisorPort>,
    ui: Arc<dyn UserInterfacePort>,
    metrics: Option<Arc<BridgeMetrics>>,
    pending: JoinSet<()>,
}

impl NotificationDispatcher {
    pub fn new(
        supervisor: Arc<dyn SupervisorPort>,
        ui: Arc<dyn UserInterfacePort>,
        metrics: Option<Arc<BridgeMetrics>>,
    ) -> Self {
        Self {
            supervisor,
            ui,
            metrics,
            pending: JoinSet::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn reap(&mut self) {
        while let Some(result) = self.pending.try_join_next() {
            if let Err(err) = result {
                if err.is_panic() {
                    warn!(%err, "notification task panicked");
                }
            }
        }
    }
}

#[async_trait]
impl MessageHandler<NotificationRequest> for NotificationDispatcher {
    async fn handle(&mut self, request: NotificationRequest) {
        self.reap();
        info!(
            request_id = %request.id,
            severity = %request.severity,
            actions = request.actions.len(),
            "notification received"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_notification(request.severity.as_str());
        }

        let supervisor = Arc::clone(&self.supervisor);
        let ui = Arc::clone(&self.ui);
        self.pending.spawn(async move {
            let Some(action) = ui.notify(UserNotice::from(&request)).await else {
                debug!(request_id = %request.id, "notification dismissed");
                return;
            };
            let response = match request.respond(action) {
                Ok(response) => response,
                Err(err) => {
                    warn!(request_id = %request.id, %err, "dropping notification response");
                    return;
                }
            };
            if let Err(err) = supervisor.respond_notification(response).await {
                warn!(request_id = %request.id, %err, "failed to respond to notification");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeSupervisor, FakeUi};
    use crate::domain::{NotificationId, NotificationResponse, Severity};

    fn request(id: u64, actions: &[&str]) -> NotificationRequest {
        NotificationRequest {
            id: NotificationId::new(id),
            message: format!("message {id}"),
            severity: Severity::Info,
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    async fn settle(dispatcher: &mut NotificationDispatcher) {
        while dispatcher.pending.join_next().await.is_some() {}
    }

    #[tokio::test]
    async fn chosen_action_is_reported_with_request_id() {
        let supervisor = Arc::new(FakeSupervisor::default());
        let ui = Arc::new(FakeUi::answering(Some("Open")));
        let mut dispatcher = NotificationDispatcher::new(supervisor.clone(), ui.clone(), None);

        dispatcher.handle(request(9, &["Open", "Ignore"])).await;
        settle(&mut dispatcher).await;

        assert_eq!(ui.notices().len(), 1);
        assert_eq!(
            supervisor.responses(),
            vec![NotificationResponse {
                request_id: NotificationId::new(9),
                action: "Open".into(),
            }]
        );
    }

    #[tokio::test]
    async fn dismissed_notification_sends_no_response() {
        let supervisor = Arc::new(FakeSupervisor::default());
        let ui = Arc::new(FakeUi::answering(None));
        let mut dispatcher = NotificationDispatcher::new(supervisor.clone(), ui.clone(), None);

        dispatcher.handle(request(1, &["Ok"])).await;
        dispatcher.handle(request(2, &[])).await;
        settle(&mut dispatcher).await;

        assert_eq!(ui.notices().len(), 2);
        assert!(supervisor.responses().is_empty());
    }

    #[tokio::test]
    async fn action_outside_the_offer_is_not_reported() {
        let supervisor = Arc::new(FakeSupervisor::default());
        let ui = Arc::new(FakeUi::answering(Some("Delete")));
        let mut dispatcher = NotificationDispatcher::new(supervisor.clone(), ui.clone(), None);

        dispatcher.handle(request(3, &["Keep"])).await;
        settle(&mut dispatcher).await;

        assert!(supervisor.responses().is_empty());
    }

    #[tokio::test]
    async fn slow_user_does_not_block_following_notifications() {
        let supervisor = Arc::new(FakeSupervisor::default());
        let ui = Arc::new(FakeUi::never_answering());
        let mut dispatcher = NotificationDispatcher::new(supervisor.clone(), ui.clone(), None);

        dispatcher.handle(request(1, &["A"])).await;
        dispatcher.handle(request(2, &["B"])).await;
        assert_eq!(dispatcher.pending(), 2);

        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while ui.notices().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("both notifications shown");
        drop(dispatcher);
        assert!(supervisor.responses().is_empty());
    }
}
