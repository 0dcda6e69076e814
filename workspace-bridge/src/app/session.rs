use crate::app::retry::retry;
use crate::app::workspace_info::WorkspaceInfoHandle;
use crate::domain::{BackoffState, CloseReason, SessionState, SessionStop, TokenRequest};
use crate::ports::{ConnectParams, RemoteServerPort, SupervisorPort};
use crate::telemetry::BridgeMetrics;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_TOKEN_ATTEMPTS: usize = 3;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub client_id: String,
    pub client_version: String,
    pub token_kind: String,
    pub token_attempts: usize,
    pub backoff: BackoffState,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_id: "workspace-bridge".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            token_kind: "gitpod".to_string(),
            token_attempts: DEFAULT_TOKEN_ATTEMPTS,
            backoff: BackoffState::default(),
        }
    }
}

/// Keeps one authenticated connection to the remote server alive.
///
/// A fresh token is requested before every attempt. Closures are retried
/// after the current backoff delay, which resets once a connection is
/// established. Only a rejected handshake, an unavailable token or missing
/// workspace info stop the session for good.
pub struct ReconnectingSession {
    supervisor: Arc<dyn SupervisorPort>,
    remote: Arc<dyn RemoteServerPort>,
    info: WorkspaceInfoHandle,
    config: SessionConfig,
    metrics: Option<Arc<BridgeMetrics>>,
    state: watch::Sender<SessionState>,
}

impl ReconnectingSession {
    pub fn new(
        supervisor: Arc<dyn SupervisorPort>,
        remote: Arc<dyn RemoteServerPort>,
        info: WorkspaceInfoHandle,
        config: SessionConfig,
        metrics: Option<Arc<BridgeMetrics>>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::AwaitingInfo);
        Self {
            supervisor,
            remote,
            info,
            config,
            metrics,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn run(self, cancel: CancellationToken) -> SessionStop {
        let stop = tokio::select! {
            biased;
            _ = cancel.cancelled() => SessionStop::Cancelled,
            stop = self.drive() => stop,
        };

        let host = self
            .info
            .current()
            .map(|info| info.api_host.clone())
            .unwrap_or_default();
        match &stop {
            SessionStop::Cancelled => {
                info!(host = %host, reason = %stop, "connection permanently closed")
            }
            other => {
                error!(host = %host, reason = %other, "connection permanently closed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_session_stop(stop_kind(other));
                }
            }
        }
        self.state.send_replace(SessionState::Stopped {
            reason: stop.clone(),
        });
        stop
    }

    async fn drive(&self) -> SessionStop {
        self.publish(SessionState::AwaitingInfo);
        let info = match self.info.wait().await {
            Ok(info) => info,
            Err(err) => return SessionStop::InfoUnavailable(err),
        };
        let host = info.api_host.as_str();
        let mut backoff = self.config.backoff;

        loop {
            self.publish(SessionState::AwaitingToken);
            let request = TokenRequest::for_session(&info, self.config.token_kind.as_str());
            let token = match retry(self.config.token_attempts, "token request", || {
                self.supervisor.token(&request)
            })
            .await
            {
                Ok(token) => token,
                Err(err) => return SessionStop::TokenUnavailable(err.to_string()),
            };

            self.publish(SessionState::Connecting);
            let params = ConnectParams {
                endpoint: info.api_endpoint.clone(),
                host: info.host.clone(),
                client_id: self.config.client_id.clone(),
                client_version: self.config.client_version.clone(),
                token,
            };
            let reason = match self.remote.connect(params).await {
                Ok(connection) => {
                    info!(host, "connected");
                    backoff = backoff.reset();
                    self.publish(SessionState::Connected);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_connected();
                    }
                    connection.closed().await
                }
                Err(reason) => reason,
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_disconnect(reason.kind());
            }
            if reason.is_fatal() {
                return SessionStop::Fatal(reason);
            }

            let delay = backoff.current();
            let delay_ms = delay.as_millis() as u64;
            match &reason {
                CloseReason::ConnectFailed(_) => {
                    warn!(host, delay_ms, %reason, "failed to connect, trying again")
                }
                _ => warn!(host, delay_ms, %reason, "connection closed, reconnecting"),
            }
            self.publish(SessionState::ClosedRetryable { delay });
            tokio::time::sleep(delay).await;
            backoff = backoff.next().1;
        }
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

fn stop_kind(stop: &SessionStop) -> &'static str {
    match stop {
        SessionStop::Cancelled => "cancelled",
        SessionStop::InfoUnavailable(_) => "info_unavailable",
        SessionStop::TokenUnavailable(_) => "token_unavailable",
        SessionStop::Fatal(reason) => reason.kind(),
    }
}
