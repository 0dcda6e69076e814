pub mod remote;
pub mod supervisor;
pub mod ui;

pub use remote::{ConnectParams, ConnectionHandle, RemoteServerPort};
pub use supervisor::{SupervisorError, SupervisorPort, SupervisorStream};
pub use ui::{UiError, UserInterfacePort};
