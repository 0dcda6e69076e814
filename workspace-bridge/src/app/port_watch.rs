use crate::app::subscription::MessageHandler;
use crate::domain::ports::OPEN_BROWSER_LABEL;
use crate::domain::{PortAction, PortStateTracker, PortStatus, Severity, UserNotice};
use crate::ports::UserInterfacePort;
use crate::telemetry::BridgeMetrics;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Feeds port snapshots through the tracker and carries out the actions it
/// decides on. The tracker lives here so the stream task is its only owner.
pub struct PortStatusDispatcher {
    tracker: PortStateTracker,
    ui: Arc<dyn UserInterfacePort>,
    metrics: Option<Arc<BridgeMetrics>>,
    pending: JoinSet<()>,
}

impl PortStatusDispatcher {
    pub fn new(
        tracker: PortStateTracker,
        ui: Arc<dyn UserInterfacePort>,
        metrics: Option<Arc<BridgeMetrics>>,
    ) -> Self {
        Self {
            tracker,
            ui,
            metrics,
            pending: JoinSet::new(),
        }
    }

    pub fn tracker(&self) -> &PortStateTracker {
        &self.tracker
    }

    fn dispatch(&mut self, local_port: u16, action: PortAction) {
        let label = match &action {
            PortAction::None => return,
            PortAction::OpenTarget(_) => "open_target",
            PortAction::NotifyUser { .. } => "notify_user",
        };
        info!(port = local_port, action = label, "port became available");
        if let Some(metrics) = &self.metrics {
            metrics.record_port_action(label);
        }

        let ui = Arc::clone(&self.ui);
        self.pending.spawn(async move {
            match action {
                PortAction::None => {}
                PortAction::OpenTarget(target) => {
                    if let Err(err) = ui.open_url(&target.url).await {
                        warn!(port = local_port, url = %target.url, %err, "failed to open port url");
                    }
                }
                PortAction::NotifyUser {
                    message,
                    default_action,
                } => {
                    let notice = UserNotice {
                        severity: Severity::Info,
                        message,
                        actions: vec![OPEN_BROWSER_LABEL.to_string()],
                    };
                    match ui.notify(notice).await.as_deref() {
                        Some(OPEN_BROWSER_LABEL) => {
                            if let Err(err) = ui.open_url(&default_action.url).await {
                                warn!(port = local_port, %err, "failed to open port url");
                            }
                        }
                        other => debug!(port = local_port, choice = ?other, "port notice dismissed"),
                    }
                }
            }
        });
    }
}

#[async_trait]
impl MessageHandler<Vec<PortStatus>> for PortStatusDispatcher {
    async fn handle(&mut self, snapshot: Vec<PortStatus>) {
        while self.pending.try_join_next().is_some() {}
        for status in snapshot {
            let local_port = status.local_port;
            let action = self.tracker.observe(status);
            self.dispatch(local_port, action);
        }
    }
}
