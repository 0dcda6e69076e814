use anyhow::{Context, Result};
use opentelemetry::{
    metrics::{Counter, Gauge, Meter, MeterProvider},
    KeyValue,
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing::info;

/// Labels attached to the backend memory gauges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendLabels {
    pub product: String,
    pub qualifier: String,
}

impl BackendLabels {
    pub const PRODUCT_ENV: &'static str = "JETBRAINS_GITPOD_BACKEND_KIND";
    pub const QUALIFIER_ENV: &'static str = "JETBRAINS_BACKEND_QUALIFIER";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "unknown".to_string())
        };
        Self {
            product: read(Self::PRODUCT_ENV),
            qualifier: read(Self::QUALIFIER_ENV),
        }
    }

    fn attributes(&self) -> [KeyValue; 2] {
        [
            KeyValue::new("product", self.product.clone()),
            KeyValue::new("qualifier", self.qualifier.clone()),
        ]
    }
}

pub struct BridgeMetrics {
    // Remote session
    pub connections: Counter<u64>,
    pub disconnects: Counter<u64>,
    pub session_stops: Counter<u64>,

    // Supervisor streams
    pub subscription_restarts: Counter<u64>,
    pub notifications: Counter<u64>,
    pub port_actions: Counter<u64>,

    // Backend process
    pub memory_max_bytes: Gauge<u64>,
    pub memory_used_bytes: Gauge<u64>,
}

impl BridgeMetrics {
    pub fn new(meter: &Meter) -> Self {
        let connections = meter
            .u64_counter("workspace_bridge.session.connections")
            .with_description("Established remote server connections")
            .build();

        let disconnects = meter
            .u64_counter("workspace_bridge.session.disconnects")
            .with_description("Remote server connections that ended or failed")
            .build();

        let session_stops = meter
            .u64_counter("workspace_bridge.session.stops")
            .with_description("Sessions that stopped reconnecting")
            .build();

        let subscription_restarts = meter
            .u64_counter("workspace_bridge.subscription.restarts")
            .with_description("Supervisor stream resubscriptions")
            .build();

        let notifications = meter
            .u64_counter("workspace_bridge.notifications.received")
            .with_description("Supervisor notifications relayed to the user")
            .build();

        let port_actions = meter
            .u64_counter("workspace_bridge.ports.actions")
            .with_description("User-facing actions triggered by port updates")
            .build();

        let memory_max_bytes = meter
            .u64_gauge("workspace_bridge.backend.memory_max_bytes")
            .with_description("Virtual memory reserved by the backend process")
            .with_unit("By")
            .build();

        let memory_used_bytes = meter
            .u64_gauge("workspace_bridge.backend.memory_used_bytes")
            .with_description("Resident memory used by the backend process")
            .with_unit("By")
            .build();

        Self {
            connections,
            disconnects,
            session_stops,
            subscription_restarts,
            notifications,
            port_actions,
            memory_max_bytes,
            memory_used_bytes,
        }
    }

    pub fn record_connected(&self) {
        self.connections.add(1, &[]);
    }

    pub fn record_disconnect(&self, reason: &'static str) {
        self.disconnects.add(1, &[KeyValue::new("reason", reason)]);
    }

    pub fn record_session_stop(&self, reason: &'static str) {
        self.session_stops.add(1, &[KeyValue::new("reason", reason)]);
    }

    pub fn record_subscription_restart(&self, subscription: &'static str) {
        self.subscription_restarts
            .add(1, &[KeyValue::new("subscription", subscription)]);
    }

    pub fn record_notification(&self, severity: &'static str) {
        self.notifications
            .add(1, &[KeyValue::new("severity", severity)]);
    }

    pub fn record_port_action(&self, action: &'static str) {
        self.port_actions.add(1, &[KeyValue::new("action", action)]);
    }

    pub fn record_memory(&self, max_bytes: u64, used_bytes: u64, labels: &BackendLabels) {
        let attrs = labels.attributes();
        self.memory_max_bytes.record(max_bytes, &attrs);
        self.memory_used_bytes.record(used_bytes, &attrs);
    }
}

const METER_NAME: &str = "workspace-bridge";

/// Builds the OTLP/HTTP meter provider and the bridge instruments on it.
///
/// The provider is not installed globally: every instrument the bridge
/// records lives on [`BridgeMetrics`], which is handed to the tasks that
/// need it. `export_interval` also bounds how stale the memory gauges get
/// between the monitor's explicit flushes.
pub fn init_telemetry(
    endpoint: &str,
    service_name: &str,
    export_interval: Duration,
) -> Result<(SdkMeterProvider, BridgeMetrics)> {
    info!(
        endpoint,
        interval_ms = export_interval.as_millis() as u64,
        "initializing OTLP telemetry"
    );

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_export_config(opentelemetry_otlp::ExportConfig {
            endpoint: Some(endpoint.to_string()),
            timeout: Duration::from_secs(10),
            ..Default::default()
        })
        .build()
        .context("building OTLP metric exporter")?;

    let reader = PeriodicReader::builder(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_interval(export_interval)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(service_resource(service_name))
        .build();
    let metrics = BridgeMetrics::new(&provider.meter(METER_NAME));

    Ok((provider, metrics))
}

fn service_resource(service_name: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ])
}

/// Flushes what is left and stops the exporter.
pub fn shutdown_telemetry(provider: SdkMeterProvider) -> Result<()> {
    info!("shutting down telemetry");
    provider
        .shutdown()
        .context("shutting down meter provider")
}
