use serde::Serialize;
use std::fmt;

pub const SCOPE_SEND_HEARTBEAT: &str = "function:sendHeartBeat";
pub const SCOPE_TRACK_EVENT: &str = "function:trackEvent";

/// Capabilities the remote server session needs from its token.
pub const SESSION_TOKEN_SCOPES: &[&str] = &[SCOPE_SEND_HEARTBEAT, SCOPE_TRACK_EVENT];

/// Immutable description of the workspace, fetched once from the supervisor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkspaceInfo {
    pub workspace_id: String,
    pub instance_id: String,
    /// Host identifier of the remote installation, e.g. `https://gitpod.io`.
    pub host: String,
    /// Endpoint of the remote server API, e.g. `wss://api.gitpod.io/v1`.
    pub api_endpoint: String,
    /// Hostname tokens are scoped to.
    pub api_host: String,
}

impl WorkspaceInfo {
    pub fn validate(self) -> Result<Self, String> {
        if self.api_endpoint.trim().is_empty() {
            return Err("workspace info is missing the remote API endpoint".into());
        }
        if self.api_host.trim().is_empty() {
            return Err("workspace info is missing the remote API host".into());
        }
        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
    pub host: String,
    pub scopes: Vec<String>,
    pub kind: String,
}

impl TokenRequest {
    pub fn for_session(info: &WorkspaceInfo, kind: impl Into<String>) -> Self {
        Self {
            host: info.api_host.clone(),
            scopes: SESSION_TOKEN_SCOPES.iter().map(|s| s.to_string()).collect(),
            kind: kind.into(),
        }
    }
}

/// Short-lived credential. Never cached across connection attempts.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err("supervisor returned an empty token".into());
        }
        Ok(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}
