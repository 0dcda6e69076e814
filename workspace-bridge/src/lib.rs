pub mod adapters;
pub mod app;
pub mod domain;
pub mod ports;
pub mod telemetry;

use adapters::remote::WebSocketConnector;
use adapters::supervisor::grpc::DEFAULT_SUPERVISOR_ENDPOINT;
use adapters::supervisor::GrpcSupervisor;
use adapters::ui::DesktopUserInterface;
use anyhow::{Context, Result as AnyResult};
use app::cli_endpoint::{self, CliEndpointState, DEFAULT_CLIENT_TIMEOUT, DEFAULT_CLI_PORT};
use app::coordinator::DEFAULT_INFO_ATTEMPTS;
use app::gateway::{log_gateway_link, DEFAULT_GATEWAY_LINK_URL};
use app::monitoring::{run_memory_monitor, DEFAULT_MONITORING_INTERVAL};
use app::session::DEFAULT_TOKEN_ATTEMPTS;
use app::subscription::DEFAULT_RESUBSCRIBE_DELAY;
use app::{BridgeConfig, BridgeContext, LifecycleCoordinator, SessionConfig};
use domain::backoff::{DEFAULT_GROWTH_FACTOR, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY};
use domain::ports::IGNORED_PORTS;
use domain::BackoffState;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telemetry::BackendLabels;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{error, info, warn};

#[derive(Clone, Debug)]
pub struct Settings {
    pub supervisor_endpoint: String,
    /// `None` disables the CLI endpoint and with it the gateway link.
    pub cli_listen: Option<SocketAddr>,
    pub cli_client_timeout: Duration,
    /// `None` skips the gateway link lookup.
    pub gateway_link_url: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub headless: bool,
    pub client_id: String,
    pub token_kind: String,
    pub open_command: Option<String>,
    pub resubscribe_delay: Duration,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
    pub reconnect_growth: f64,
    pub info_attempts: usize,
    pub token_attempts: usize,
    pub monitoring_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supervisor_endpoint: DEFAULT_SUPERVISOR_ENDPOINT.to_string(),
            cli_listen: Some(SocketAddr::from(([127, 0, 0, 1], DEFAULT_CLI_PORT))),
            cli_client_timeout: DEFAULT_CLIENT_TIMEOUT,
            gateway_link_url: Some(DEFAULT_GATEWAY_LINK_URL.to_string()),
            otlp_endpoint: None,
            headless: false,
            client_id: "workspace-bridge".to_string(),
            token_kind: "gitpod".to_string(),
            open_command: None,
            resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY,
            reconnect_min: DEFAULT_MIN_DELAY,
            reconnect_max: DEFAULT_MAX_DELAY,
            reconnect_growth: DEFAULT_GROWTH_FACTOR,
            info_attempts: DEFAULT_INFO_ATTEMPTS,
            token_attempts: DEFAULT_TOKEN_ATTEMPTS,
            monitoring_interval: DEFAULT_MONITORING_INTERVAL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid reconnect backoff: {0}")]
    Backoff(String),
    #[error("{what} attempts must be at least 1")]
    ZeroAttempts { what: &'static str },
    #[error("client id must not be empty")]
    EmptyClientId,
}

impl Settings {
    /// Checks the settings and derives the runtime configuration.
    pub fn validate(&self) -> Result<BridgeConfig, SettingsError> {
        let backoff = BackoffState::new(
            self.reconnect_min,
            self.reconnect_max,
            self.reconnect_growth,
        )
        .map_err(SettingsError::Backoff)?;
        if self.info_attempts == 0 {
            return Err(SettingsError::ZeroAttempts {
                what: "workspace info",
            });
        }
        if self.token_attempts == 0 {
            return Err(SettingsError::ZeroAttempts { what: "token" });
        }
        if self.client_id.trim().is_empty() {
            return Err(SettingsError::EmptyClientId);
        }

        Ok(BridgeConfig {
            headless: self.headless,
            info_attempts: self.info_attempts,
            resubscribe_delay: self.resubscribe_delay,
            ignored_ports: IGNORED_PORTS.to_vec(),
            session: SessionConfig {
                client_id: self.client_id.clone(),
                client_version: env!("CARGO_PKG_VERSION").to_string(),
                token_kind: self.token_kind.clone(),
                token_attempts: self.token_attempts,
                backoff,
            },
        })
    }
}

pub async fn run(settings: Settings) -> AnyResult<()> {
    run_until(settings, shutdown_signal()).await
}

/// Runs the bridge until `shutdown` resolves, then stops every task.
pub async fn run_until(
    settings: Settings,
    shutdown: impl Future<Output = ()> + Send,
) -> AnyResult<()> {
    let config = settings.validate().context("invalid settings")?;

    let (metrics, provider) = match &settings.otlp_endpoint {
        Some(endpoint) => {
            let (provider, metrics) = telemetry::init_telemetry(
                endpoint,
                "workspace-bridge",
                settings.monitoring_interval,
            )?;
            (Some(Arc::new(metrics)), Some(provider))
        }
        None => (None, None),
    };

    let supervisor = GrpcSupervisor::connect_lazy(&settings.supervisor_endpoint)
        .context("configuring supervisor client")?;
    let context = Arc::new(BridgeContext {
        supervisor: Arc::new(supervisor),
        remote: Arc::new(WebSocketConnector::default()),
        ui: Arc::new(DesktopUserInterface::new(settings.open_command.as_deref())),
        metrics: metrics.clone(),
        config,
    });

    let cli_listener = match settings.cli_listen {
        Some(addr) if !settings.headless => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding cli endpoint on {addr}"))?;
            let port = listener.local_addr()?.port();
            Some((listener, port))
        }
        _ => None,
    };

    let mut coordinator = LifecycleCoordinator::start(Arc::clone(&context));

    if !settings.headless {
        if let Some((listener, port)) = cli_listener {
            let ui = Arc::clone(&context.ui);
            let session = coordinator.session_state();
            let workspace_info = coordinator.workspace_info();
            let client_timeout = settings.cli_client_timeout;
            coordinator.spawn("cli-endpoint", move |cancel| async move {
                let state = CliEndpointState::new(ui, session, workspace_info, client_timeout, cancel);
                if let Err(err) = cli_endpoint::serve(listener, state).await {
                    error!(%err, "cli endpoint failed");
                }
            });

            if let Some(url) = settings.gateway_link_url.clone() {
                coordinator.spawn("gateway-link", move |cancel| {
                    log_gateway_link(url, port, cancel)
                });
            }
        }

        if let Some(metrics) = metrics.clone() {
            let provider = provider.clone();
            let interval = settings.monitoring_interval;
            coordinator.spawn("memory-monitor", move |cancel| {
                run_memory_monitor(metrics, provider, BackendLabels::from_env(), interval, cancel)
            });
        }
    }

    info!(
        supervisor = %settings.supervisor_endpoint,
        headless = settings.headless,
        "workspace-bridge started"
    );

    shutdown.await;
    coordinator.shutdown().await;

    if let Some(provider) = provider {
        if let Err(err) = telemetry::shutdown_telemetry(provider) {
            warn!(%err, "telemetry shutdown failed");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = ctrl_c().await;
    info!("shutdown signal received");
}
