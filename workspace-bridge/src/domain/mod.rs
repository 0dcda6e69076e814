pub mod backoff;
pub mod notification;
pub mod ports;
pub mod session;
pub mod workspace;

pub use backoff::BackoffState;
pub use notification::{
    NotificationId, NotificationRequest, NotificationResponse, Severity, UserNotice,
};
pub use ports::{
    ExposedPort, OnExposedAction, OpenTarget, PortAction, PortStateTracker, PortStatus,
};
pub use session::{CloseReason, SessionState, SessionStateSummary, SessionStop};
pub use workspace::{AuthToken, TokenRequest, WorkspaceInfo};
