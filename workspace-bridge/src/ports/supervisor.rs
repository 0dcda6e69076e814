use crate::domain::{
    AuthToken, NotificationRequest, NotificationResponse, PortStatus, TokenRequest, WorkspaceInfo,
};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Long-lived server stream; dropping it cancels the call on the supervisor.
pub type SupervisorStream<T> = BoxStream<'static, Result<T, SupervisorError>>;

#[derive(Clone, Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("supervisor unavailable: {0}")]
    Unavailable(String),
    #[error("supervisor call failed ({code}): {message}")]
    Rpc { code: String, message: String },
    #[error("invalid supervisor message: {0}")]
    InvalidMessage(String),
}

/// Calls offered by the in-workspace supervisor over one shared channel.
#[async_trait]
pub trait SupervisorPort: Send + Sync {
    async fn workspace_info(&self) -> Result<WorkspaceInfo, SupervisorError>;

    async fn token(&self, request: &TokenRequest) -> Result<AuthToken, SupervisorError>;

    async fn subscribe_notifications(
        &self,
    ) -> Result<SupervisorStream<NotificationRequest>, SupervisorError>;

    async fn respond_notification(
        &self,
        response: NotificationResponse,
    ) -> Result<(), SupervisorError>;

    /// Observe-mode port status stream; every item is one snapshot batch.
    async fn subscribe_port_status(
        &self,
    ) -> Result<SupervisorStream<Vec<PortStatus>>, SupervisorError>;
}
