use crate::app::workspace_info::WorkspaceInfoHandle;
use crate::domain::{SessionState, SessionStateSummary, WorkspaceInfo};
use crate::ports::UserInterfacePort;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_CLI_PORT: u16 = 24001;
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(300);
const CLIENT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shared state of the local endpoint used by the in-workspace CLI.
#[derive(Clone)]
pub struct CliEndpointState {
    ui: Arc<dyn UserInterfacePort>,
    session: watch::Receiver<SessionState>,
    workspace_info: WorkspaceInfoHandle,
    client_timeout: Duration,
    poll_interval: Duration,
    cancel: CancellationToken,
    started_at: Instant,
}

impl CliEndpointState {
    pub fn new(
        ui: Arc<dyn UserInterfacePort>,
        session: watch::Receiver<SessionState>,
        workspace_info: WorkspaceInfoHandle,
        client_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ui,
            session,
            workspace_info,
            client_timeout,
            poll_interval: CLIENT_POLL_INTERVAL,
            cancel,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: CliEndpointState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/status", get(status))
        .route("/cli", get(cli))
        .with_state(state)
}

/// Serves until `cancel` fires, then drains in-flight requests.
pub async fn serve(listener: TcpListener, state: CliEndpointState) -> anyhow::Result<()> {
    let cancel = state.cancel.clone();
    if let Ok(addr) = listener.local_addr() {
        info!(listening = %addr, "cli endpoint started");
    }
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    debug!("cli endpoint stopped");
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Serialize)]
struct StatusResponse {
    version: &'static str,
    uptime_ms: u128,
    session: SessionStateSummary,
    workspace: Option<WorkspaceInfo>,
}

async fn status(State(state): State<CliEndpointState>) -> Json<StatusResponse> {
    let session = state.session.borrow().summary();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_ms: state.started_at.elapsed().as_millis(),
        session,
        workspace: state
            .workspace_info
            .current()
            .map(|info| info.as_ref().clone()),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliQuery {
    op: Option<String>,
    file: Option<String>,
    url: Option<String>,
    wait: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum CliOperation {
    Open { file: PathBuf, wait: bool },
    Preview { url: String },
}

impl CliQuery {
    fn operation(&self, cwd: &Path) -> Result<CliOperation, &'static str> {
        match self.op.as_deref() {
            Some("open") => {
                let raw = non_blank(self.file.as_deref()).ok_or("file is missing")?;
                let file = normalize_path(raw, cwd).ok_or("invalid file")?;
                Ok(CliOperation::Open {
                    file,
                    wait: flag(self.wait.as_deref()),
                })
            }
            Some("preview") => {
                let url = non_blank(self.url.as_deref()).ok_or("url is missing")?;
                Ok(CliOperation::Preview {
                    url: url.to_string(),
                })
            }
            _ => Err("invalid operation"),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// A bare `wait` counts as set.
fn flag(value: Option<&str>) -> bool {
    match value {
        Some(value) => {
            let value = value.trim();
            value.is_empty() || value.eq_ignore_ascii_case("true") || value == "1"
        }
        None => false,
    }
}

/// Resolves `raw` against `cwd` and folds `.` and `..` without touching the
/// filesystem. Returns `None` when `..` climbs above the root.
fn normalize_path(raw: &str, cwd: &Path) -> Option<PathBuf> {
    let raw = Path::new(raw);
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        cwd.join(raw)
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.parent()?;
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    Some(normalized)
}

enum ClientWait {
    Ready,
    TimedOut,
    ShuttingDown,
}

async fn wait_for_client(state: &CliEndpointState) -> ClientWait {
    let deadline = Instant::now() + state.client_timeout;
    loop {
        if state.ui.has_client().await {
            return ClientWait::Ready;
        }
        let now = Instant::now();
        if now >= deadline {
            return ClientWait::TimedOut;
        }
        let pause = state.poll_interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = state.cancel.cancelled() => return ClientWait::ShuttingDown,
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

async fn cli(
    State(state): State<CliEndpointState>,
    Query(query): Query<CliQuery>,
) -> (StatusCode, String) {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    let operation = match query.operation(&cwd) {
        Ok(operation) => operation,
        Err(message) => return (StatusCode::BAD_REQUEST, message.to_string()),
    };

    match wait_for_client(&state).await {
        ClientWait::Ready => {}
        ClientWait::TimedOut => {
            return (
                StatusCode::GATEWAY_TIMEOUT,
                "no client available".to_string(),
            )
        }
        ClientWait::ShuttingDown => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "shutting down".to_string(),
            )
        }
    }

    let action = async {
        match &operation {
            CliOperation::Open { file, wait } => {
                info!(file = %file.display(), wait, "cli open");
                state.ui.open_file(file, *wait).await
            }
            CliOperation::Preview { url } => {
                info!(%url, "cli preview");
                state.ui.open_url(url).await
            }
        }
    };
    // A waiting open may never return; shutdown must not drain behind it.
    let result = tokio::select! {
        biased;
        _ = state.cancel.cancelled() => {
            debug!(?operation, "cli request abandoned on shutdown");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "shutting down".to_string(),
            );
        }
        result = action => result,
    };
    match result {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(err) => {
            warn!(?operation, %err, "cli request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
