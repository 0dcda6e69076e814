use crate::domain::UserNotice;
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Boundary to whatever renders things for the user.
#[async_trait]
pub trait UserInterfacePort: Send + Sync {
    /// Whether a user-facing client is attached and can receive actions.
    async fn has_client(&self) -> bool;

    async fn open_url(&self, url: &str) -> Result<(), UiError>;

    async fn open_file(&self, path: &Path, wait: bool) -> Result<(), UiError>;

    /// Shows a notice and resolves with the action label the user picked,
    /// or `None` when it was dismissed or cannot be answered.
    async fn notify(&self, notice: UserNotice) -> Option<String>;
}
