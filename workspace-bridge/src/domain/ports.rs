use serde::Serialize;
use std::collections::HashMap;

/// Ports used internally by the IDE backend itself; never surfaced to the user.
pub const IGNORED_PORTS: &[u16] = &[5990, 5991, 6679, 6942, 6943];

pub const OPEN_BROWSER_LABEL: &str = "Open Browser";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnExposedAction {
    OpenBrowser,
    OpenPreview,
    Notify,
    NotifyPrivate,
    Ignore,
    Other(i32),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExposedPort {
    pub url: String,
    pub on_exposed: OnExposedAction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PortStatus {
    pub local_port: u16,
    pub served: bool,
    pub exposed: Option<ExposedPort>,
}

impl PortStatus {
    pub fn is_served_exposed(&self) -> bool {
        self.served && self.exposed.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenTarget {
    pub url: String,
}

/// What the UI should do after a port update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortAction {
    None,
    OpenTarget(OpenTarget),
    NotifyUser {
        message: String,
        default_action: OpenTarget,
    },
}

/// Remembers the last status of every observed port and decides which
/// updates deserve a user-facing action.
///
/// An action fires only on the edge from "not served and exposed" to
/// "served and exposed". A port stays disarmed while it keeps reporting
/// served and exposed, and re-arms once it is observed otherwise.
#[derive(Debug)]
pub struct PortStateTracker {
    ignored: Vec<u16>,
    statuses: HashMap<u16, PortStatus>,
}

impl PortStateTracker {
    pub fn new(ignored: impl IntoIterator<Item = u16>) -> Self {
        Self {
            ignored: ignored.into_iter().collect(),
            statuses: HashMap::new(),
        }
    }

    pub fn observe(&mut self, port: PortStatus) -> PortAction {
        if self.ignored.contains(&port.local_port) {
            return PortAction::None;
        }

        // A port seen for the first time counts as previously not served,
        // so one that is already served and exposed fires right away.
        let was_served_exposed = self
            .statuses
            .get(&port.local_port)
            .is_some_and(PortStatus::is_served_exposed);
        let is_served_exposed = port.is_served_exposed();
        let should_fire = !was_served_exposed && is_served_exposed;

        let local_port = port.local_port;
        let exposed = port.exposed.clone();
        self.statuses.insert(local_port, port);

        if !should_fire {
            return PortAction::None;
        }
        let Some(exposed) = exposed else {
            return PortAction::None;
        };

        match exposed.on_exposed {
            OnExposedAction::Ignore => PortAction::None,
            OnExposedAction::OpenBrowser | OnExposedAction::OpenPreview => {
                PortAction::OpenTarget(OpenTarget { url: exposed.url })
            }
            OnExposedAction::Notify
            | OnExposedAction::NotifyPrivate
            | OnExposedAction::Other(_) => PortAction::NotifyUser {
                message: format!("A service is available on port {local_port}"),
                default_action: OpenTarget { url: exposed.url },
            },
        }
    }

    pub fn status(&self, local_port: u16) -> Option<&PortStatus> {
        self.statuses.get(&local_port)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

impl Default for PortStateTracker {
    fn default() -> Self {
        Self::new(IGNORED_PORTS.iter().copied())
    }
}
