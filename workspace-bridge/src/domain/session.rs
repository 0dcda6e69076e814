use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why a remote server connection ended, or why it never started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The server answered the protocol upgrade with something other than
    /// a switch. Retrying with the same credentials cannot succeed.
    HandshakeRejected { status: u16, message: String },
    /// The connection could not be established (DNS, TCP, TLS, timeout).
    ConnectFailed(String),
    /// The server sent a close frame.
    Closed { code: u16, reason: String },
    /// The socket ended without a close frame.
    Ended,
    /// Transport error on an established connection.
    Error(String),
}

impl CloseReason {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CloseReason::HandshakeRejected { .. })
    }

    /// Short label for metrics attributes.
    pub fn kind(&self) -> &'static str {
        match self {
            CloseReason::HandshakeRejected { .. } => "handshake_rejected",
            CloseReason::ConnectFailed(_) => "connect_failed",
            CloseReason::Closed { .. } => "closed",
            CloseReason::Ended => "ended",
            CloseReason::Error(_) => "error",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::HandshakeRejected { status, message } => {
                write!(f, "handshake rejected with HTTP {status}: {message}")
            }
            CloseReason::ConnectFailed(err) => write!(f, "failed to connect: {err}"),
            CloseReason::Closed { code, reason } if reason.is_empty() => {
                write!(f, "closed by server (code {code})")
            }
            CloseReason::Closed { code, reason } => {
                write!(f, "closed by server (code {code}): {reason}")
            }
            CloseReason::Ended => f.write_str("connection ended"),
            CloseReason::Error(err) => write!(f, "connection error: {err}"),
        }
    }
}

/// Terminal outcome of a reconnecting session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStop {
    Cancelled,
    InfoUnavailable(String),
    TokenUnavailable(String),
    Fatal(CloseReason),
}

impl fmt::Display for SessionStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStop::Cancelled => f.write_str("cancelled"),
            SessionStop::InfoUnavailable(err) => write!(f, "workspace info unavailable: {err}"),
            SessionStop::TokenUnavailable(err) => write!(f, "token unavailable: {err}"),
            SessionStop::Fatal(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInfo,
    AwaitingToken,
    Connecting,
    Connected,
    ClosedRetryable { delay: Duration },
    Stopped { reason: SessionStop },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingInfo => "awaiting_info",
            SessionState::AwaitingToken => "awaiting_token",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::ClosedRetryable { .. } => "closed_retryable",
            SessionState::Stopped { .. } => "stopped",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, SessionState::Stopped { .. })
    }

    pub fn summary(&self) -> SessionStateSummary {
        let (delay_ms, reason) = match self {
            SessionState::ClosedRetryable { delay } => (Some(delay.as_millis() as u64), None),
            SessionState::Stopped { reason } => (None, Some(reason.to_string())),
            _ => (None, None),
        };
        SessionStateSummary {
            phase: self.name(),
            delay_ms,
            reason,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionStateSummary {
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
