use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use workspace_bridge::{run, Settings};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Keeps a workspace IDE backend connected to its supervisor and remote server",
    long_about = None
)]
struct Cli {
    #[arg(
        long,
        default_value = "http://localhost:22999",
        help = "Supervisor gRPC endpoint"
    )]
    supervisor: String,

    #[arg(
        long,
        default_value = "127.0.0.1:24001",
        help = "Listen address for the local CLI endpoint"
    )]
    cli_listen: SocketAddr,

    #[arg(long, help = "Disable the local CLI endpoint and the gateway link lookup")]
    no_cli: bool,

    #[arg(
        long,
        default_value_t = 300,
        help = "Seconds a CLI request waits for a client before giving up"
    )]
    cli_client_timeout_secs: u64,

    #[arg(
        long,
        default_value = "http://localhost:24000/gatewayLink",
        help = "Gateway endpoint queried once for the client join link"
    )]
    gateway_link_url: String,

    #[arg(long, help = "Skip the gateway link lookup")]
    no_gateway_link: bool,

    #[arg(long, help = "OTLP endpoint for metrics (e.g., http://localhost:4318)")]
    otlp_endpoint: Option<String>,

    #[arg(
        long,
        help = "Run without a user-facing client: keep only the remote session alive"
    )]
    headless: bool,

    #[arg(long, default_value = "workspace-bridge", help = "Client id sent to the remote server")]
    client_id: String,

    #[arg(long, default_value = "gitpod", help = "Kind of token requested from the supervisor")]
    token_kind: String,

    #[arg(long, help = "Command used to open files and urls (defaults to the desktop opener)")]
    open_command: Option<String>,

    #[arg(long, default_value_t = 1000, help = "Delay before resubscribing to a supervisor stream")]
    resubscribe_delay_ms: u64,

    #[arg(long, default_value_t = 2000, help = "Initial reconnect delay")]
    reconnect_min_ms: u64,

    #[arg(long, default_value_t = 30000, help = "Upper bound of the reconnect delay")]
    reconnect_max_ms: u64,

    #[arg(long, default_value_t = 1.5, help = "Factor the reconnect delay grows by")]
    reconnect_growth: f64,
}

impl Cli {
    fn into_settings(self) -> Settings {
        let cli_listen = (!self.no_cli).then_some(self.cli_listen);
        let gateway_link_url = (!self.no_gateway_link).then_some(self.gateway_link_url);
        Settings {
            supervisor_endpoint: self.supervisor,
            cli_listen,
            cli_client_timeout: Duration::from_secs(self.cli_client_timeout_secs),
            gateway_link_url,
            otlp_endpoint: self.otlp_endpoint,
            headless: self.headless,
            client_id: self.client_id,
            token_kind: self.token_kind,
            open_command: self.open_command,
            resubscribe_delay: Duration::from_millis(self.resubscribe_delay_ms),
            reconnect_min: Duration::from_millis(self.reconnect_min_ms),
            reconnect_max: Duration::from_millis(self.reconnect_max_ms),
            reconnect_growth: self.reconnect_growth,
            ..Settings::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    run(cli.into_settings()).await
}
