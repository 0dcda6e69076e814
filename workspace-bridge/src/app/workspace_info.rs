use crate::app::retry::retry;
use crate::domain::WorkspaceInfo;
use crate::ports::{SupervisorError, SupervisorPort};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub enum InfoState {
    Pending,
    Ready(Arc<WorkspaceInfo>),
    Failed(String),
}

/// Read side of the one-shot workspace info lookup.
#[derive(Clone, Debug)]
pub struct WorkspaceInfoHandle {
    rx: watch::Receiver<InfoState>,
}

pub struct WorkspaceInfoPublisher {
    tx: watch::Sender<InfoState>,
}

pub fn workspace_info_channel() -> (WorkspaceInfoPublisher, WorkspaceInfoHandle) {
    let (tx, rx) = watch::channel(InfoState::Pending);
    (WorkspaceInfoPublisher { tx }, WorkspaceInfoHandle { rx })
}

impl WorkspaceInfoHandle {
    /// Waits until the lookup finished and returns its outcome.
    pub async fn wait(&self) -> Result<Arc<WorkspaceInfo>, String> {
        let mut rx = self.rx.clone();
        let state = match rx
            .wait_for(|state| !matches!(state, InfoState::Pending))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => return Err("workspace info lookup was abandoned".to_string()),
        };
        match state {
            InfoState::Ready(info) => Ok(info),
            InfoState::Failed(err) => Err(err),
            InfoState::Pending => Err("workspace info lookup was abandoned".to_string()),
        }
    }

    pub fn current(&self) -> Option<Arc<WorkspaceInfo>> {
        match &*self.rx.borrow() {
            InfoState::Ready(info) => Some(Arc::clone(info)),
            _ => None,
        }
    }
}

impl WorkspaceInfoPublisher {
    pub fn publish(&self, result: Result<WorkspaceInfo, String>) {
        let state = match result {
            Ok(info) => InfoState::Ready(Arc::new(info)),
            Err(err) => InfoState::Failed(err),
        };
        self.tx.send_replace(state);
    }
}

/// Fetches workspace info once, with bounded retries, and publishes the
/// outcome to every waiting handle.
pub async fn fetch_workspace_info(
    supervisor: Arc<dyn SupervisorPort>,
    attempts: usize,
    publisher: WorkspaceInfoPublisher,
    cancel: CancellationToken,
) {
    let lookup = retry(attempts, "workspace info request", || supervisor.workspace_info());
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            publisher.publish(Err("cancelled".to_string()));
            return;
        }
        result = lookup => result,
    };

    let result = result
        .map_err(|err: SupervisorError| err.to_string())
        .and_then(WorkspaceInfo::validate);
    match &result {
        Ok(info) => info!(
            workspace_id = %info.workspace_id,
            instance_id = %info.instance_id,
            host = %info.host,
            "workspace info received"
        ),
        Err(err) => error!(%err, attempts, "failed to get workspace info"),
    }
    publisher.publish(result);
}
