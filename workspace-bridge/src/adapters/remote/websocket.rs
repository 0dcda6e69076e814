use crate::domain::CloseReason;
use crate::ports::{ConnectParams, ConnectionHandle, RemoteServerPort};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, ORIGIN, USER_AGENT};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const CLIENT_ID_HEADER: HeaderName = HeaderName::from_static("x-client-id");
const CLIENT_VERSION_HEADER: HeaderName = HeaderName::from_static("x-client-version");

/// Opens the remote server websocket with bearer authentication.
#[derive(Clone, Debug)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl RemoteServerPort for WebSocketConnector {
    async fn connect(&self, params: ConnectParams) -> Result<ConnectionHandle, CloseReason> {
        let request = build_request(&params).map_err(CloseReason::ConnectFailed)?;
        debug!(endpoint = %params.endpoint, "opening remote server websocket");

        let connect = tokio_tungstenite::connect_async(request);
        let (stream, response) = match tokio::time::timeout(self.connect_timeout, connect).await {
            Err(_) => {
                return Err(CloseReason::ConnectFailed(format!(
                    "timed out after {} ms",
                    self.connect_timeout.as_millis()
                )))
            }
            Ok(Err(err)) => return Err(classify_connect_error(err)),
            Ok(Ok(pair)) => pair,
        };
        trace!(status = %response.status(), "websocket upgraded");

        Ok(ConnectionHandle::new(watch_connection(stream)))
    }
}

fn build_request(params: &ConnectParams) -> Result<Request, String> {
    let mut request = params
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|err| format!("invalid endpoint {}: {err}", params.endpoint))?;

    let header = |name: &str, value: String| {
        HeaderValue::from_str(&value).map_err(|err| format!("invalid {name} header: {err}"))
    };
    let headers = request.headers_mut();
    headers.insert(
        AUTHORIZATION,
        header("authorization", format!("Bearer {}", params.token.expose()))?,
    );
    headers.insert(ORIGIN, header("origin", origin(&params.host))?);
    headers.insert(CLIENT_ID_HEADER, header("client id", params.client_id.clone())?);
    headers.insert(
        CLIENT_VERSION_HEADER,
        header("client version", params.client_version.clone())?,
    );
    headers.insert(
        USER_AGENT,
        header(
            "user agent",
            format!("{}/{}", params.client_id, params.client_version),
        )?,
    );
    Ok(request)
}

fn origin(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Anything other than a protocol switch is a rejection; every other failure
/// is transport trouble and worth retrying.
fn classify_connect_error(err: WsError) -> CloseReason {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            let message = response
                .body()
                .as_deref()
                .map(|body| String::from_utf8_lossy(body).trim().to_string())
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
            CloseReason::HandshakeRejected {
                status: status.as_u16(),
                message,
            }
        }
        other => CloseReason::ConnectFailed(other.to_string()),
    }
}

/// Reads until the server goes away and reports why.
async fn watch_connection<S>(mut stream: S) -> CloseReason
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(Some(frame))) => {
                return CloseReason::Closed {
                    code: u16::from(frame.code),
                    reason: frame.reason.into_owned(),
                }
            }
            Ok(Message::Close(None)) => {
                return CloseReason::Closed {
                    code: u16::from(CloseCode::Status),
                    reason: String::new(),
                }
            }
            Ok(Message::Text(text)) => trace!(bytes = text.len(), "remote server text frame"),
            Ok(Message::Binary(data)) => trace!(bytes = data.len(), "remote server binary frame"),
            Ok(_) => {}
            Err(WsError::ConnectionClosed) => return CloseReason::Ended,
            Err(err) => return CloseReason::Error(err.to_string()),
        }
    }
    CloseReason::Ended
}
