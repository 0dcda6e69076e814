pub mod cli_endpoint;
pub mod coordinator;
pub mod gateway;
pub mod monitoring;
pub mod notifications;
pub mod port_watch;
pub mod retry;
pub mod session;
pub mod subscription;
pub mod workspace_info;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{BridgeConfig, BridgeContext, LifecycleCoordinator};
pub use session::{ReconnectingSession, SessionConfig};
pub use subscription::{MessageHandler, SubscriptionLoop};
pub use workspace_info::WorkspaceInfoHandle;
