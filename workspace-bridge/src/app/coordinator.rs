use crate::app::notifications::NotificationDispatcher;
use crate::app::port_watch::PortStatusDispatcher;
use crate::app::session::{ReconnectingSession, SessionConfig};
use crate::app::subscription::{SubscriptionLoop, DEFAULT_RESUBSCRIBE_DELAY};
use crate::app::workspace_info::{fetch_workspace_info, workspace_info_channel, WorkspaceInfoHandle};
use crate::domain::ports::IGNORED_PORTS;
use crate::domain::{PortStateTracker, SessionState};
use crate::ports::{RemoteServerPort, SupervisorPort, UserInterfacePort};
use crate::telemetry::BridgeMetrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_INFO_ATTEMPTS: usize = 3;

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Without a user-facing client only the session is kept alive.
    pub headless: bool,
    pub info_attempts: usize,
    pub resubscribe_delay: Duration,
    pub ignored_ports: Vec<u16>,
    pub session: SessionConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            headless: false,
            info_attempts: DEFAULT_INFO_ATTEMPTS,
            resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY,
            ignored_ports: IGNORED_PORTS.to_vec(),
            session: SessionConfig::default(),
        }
    }
}

/// Everything the long-running tasks share.
pub struct BridgeContext {
    pub supervisor: Arc<dyn SupervisorPort>,
    pub remote: Arc<dyn RemoteServerPort>,
    pub ui: Arc<dyn UserInterfacePort>,
    pub metrics: Option<Arc<BridgeMetrics>>,
    pub config: BridgeConfig,
}

/// Owns every background task of one bridge instance and stops them together.
pub struct LifecycleCoordinator {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    session_state: watch::Receiver<SessionState>,
    workspace_info: WorkspaceInfoHandle,
}

impl LifecycleCoordinator {
    /// Starts the info lookup, the session and, unless headless, both
    /// supervisor subscriptions.
    pub fn start(context: Arc<BridgeContext>) -> Self {
        let cancel = CancellationToken::new();
        let (publisher, workspace_info) = workspace_info_channel();
        let session = ReconnectingSession::new(
            Arc::clone(&context.supervisor),
            Arc::clone(&context.remote),
            workspace_info.clone(),
            context.config.session.clone(),
            context.metrics.clone(),
        );
        let session_state = session.state();

        let mut coordinator = Self {
            cancel,
            tasks: Vec::new(),
            session_state,
            workspace_info,
        };

        let supervisor = Arc::clone(&context.supervisor);
        let attempts = context.config.info_attempts;
        coordinator.spawn("workspace-info", move |cancel| {
            fetch_workspace_info(supervisor, attempts, publisher, cancel)
        });

        coordinator.spawn("session", move |cancel| async move {
            session.run(cancel).await;
        });

        if context.config.headless {
            info!("headless mode: supervisor subscriptions disabled");
        } else {
            let ctx = Arc::clone(&context);
            coordinator.spawn("notifications", move |cancel| async move {
                run_notification_subscription(ctx, cancel).await
            });
            let ctx = Arc::clone(&context);
            coordinator.spawn("port-status", move |cancel| async move {
                run_port_subscription(ctx, cancel).await
            });
        }

        coordinator
    }

    /// Adds another task bound to this coordinator's lifetime. The task
    /// receives a token that is cancelled on shutdown.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.cancel.child_token()));
        debug!(task = name, "task started");
        self.tasks.push((name, handle));
    }

    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session_state.clone()
    }

    pub fn workspace_info(&self) -> WorkspaceInfoHandle {
        self.workspace_info.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels every task and waits for all of them to finish.
    pub async fn shutdown(self) {
        info!(tasks = self.tasks.len(), "shutting down");
        self.cancel.cancel();
        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => debug!(task = name, "task stopped"),
                Err(err) => warn!(task = name, %err, "task ended abnormally"),
            }
        }
    }
}

async fn run_notification_subscription(context: Arc<BridgeContext>, cancel: CancellationToken) {
    let mut dispatcher = NotificationDispatcher::new(
        Arc::clone(&context.supervisor),
        Arc::clone(&context.ui),
        context.metrics.clone(),
    );
    let supervisor = Arc::clone(&context.supervisor);
    SubscriptionLoop::new("notifications", context.config.resubscribe_delay)
        .with_metrics(context.metrics.clone())
        .run(
            || supervisor.subscribe_notifications(),
            &mut dispatcher,
            &cancel,
        )
        .await;
}

async fn run_port_subscription(context: Arc<BridgeContext>, cancel: CancellationToken) {
    let tracker = PortStateTracker::new(context.config.ignored_ports.iter().copied());
    let mut dispatcher =
        PortStatusDispatcher::new(tracker, Arc::clone(&context.ui), context.metrics.clone());
    let supervisor = Arc::clone(&context.supervisor);
    SubscriptionLoop::new("port-status", context.config.resubscribe_delay)
        .with_metrics(context.metrics.clone())
        .run(
            || supervisor.subscribe_port_status(),
            &mut dispatcher,
            &cancel,
        )
        .await;
}
