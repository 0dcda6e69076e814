use crate::domain::{AuthToken, CloseReason};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;

#[derive(Clone, Debug)]
pub struct ConnectParams {
    pub endpoint: String,
    pub host: String,
    pub client_id: String,
    pub client_version: String,
    pub token: AuthToken,
}

/// One live connection to the remote server.
///
/// Resolves with the reason the connection ended. Dropping the handle
/// tears the connection down.
pub struct ConnectionHandle {
    closed: BoxFuture<'static, CloseReason>,
}

impl ConnectionHandle {
    pub fn new(closed: impl Future<Output = CloseReason> + Send + 'static) -> Self {
        Self {
            closed: closed.boxed(),
        }
    }

    pub async fn closed(self) -> CloseReason {
        self.closed.await
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait RemoteServerPort: Send + Sync {
    /// Opens a connection. A failed attempt is reported as the close reason
    /// it would have produced, so callers classify both the same way.
    async fn connect(&self, params: ConnectParams) -> Result<ConnectionHandle, CloseReason>;
}
