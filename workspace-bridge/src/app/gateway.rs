use anyhow::{bail, Context, Result};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use url::Url;

pub const DEFAULT_GATEWAY_LINK_URL: &str = "http://localhost:24000/gatewayLink";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Asks the local gateway for the link a desktop client uses to join this
/// backend. Succeeds only on `200 OK`.
pub async fn discover_gateway_link(base_url: &str, backend_port: u16) -> Result<String> {
    let mut url = Url::parse(base_url).with_context(|| format!("invalid gateway url {base_url}"))?;
    url.query_pairs_mut()
        .append_pair("backendPort", &backend_port.to_string());

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(Policy::limited(10))
        .build()
        .context("building gateway http client")?;
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?;

    let status = response.status();
    if status != StatusCode::OK {
        bail!("gateway answered {status} for {url}");
    }
    let link = response.text().await.context("reading gateway link")?;
    Ok(link.trim().to_string())
}

/// One-shot lookup that logs the join link in a banner. Never retried.
pub async fn log_gateway_link(base_url: String, backend_port: u16, cancel: CancellationToken) {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = discover_gateway_link(&base_url, backend_port) => result,
    };
    match result {
        Ok(link) => warn!(
            "\n\n\n*********************************************************\n\n\
             Gateway link: {link}\n\n\
             *********************************************************\n\n\n"
        ),
        Err(err) => error!(err = %format!("{err:#}"), "failed to resolve gateway link"),
    }
}
