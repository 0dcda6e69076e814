use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervisor-assigned id correlating a notification with its response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NotificationId(u64);

impl NotificationId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRequest {
    pub id: NotificationId,
    pub message: String,
    pub severity: Severity,
    pub actions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationResponse {
    pub request_id: NotificationId,
    pub action: String,
}

impl NotificationRequest {
    /// Builds the response for `action`, refusing labels the request never offered.
    pub fn respond(&self, action: impl Into<String>) -> Result<NotificationResponse, String> {
        let action = action.into();
        if !self.actions.iter().any(|offered| offered == &action) {
            return Err(format!(
                "action '{action}' was not offered by notification {}",
                self.id
            ));
        }
        Ok(NotificationResponse {
            request_id: self.id,
            action,
        })
    }
}

/// Something to show the user, with the action labels they may pick from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserNotice {
    pub severity: Severity,
    pub message: String,
    pub actions: Vec<String>,
}

impl From<&NotificationRequest> for UserNotice {
    fn from(request: &NotificationRequest) -> Self {
        Self {
            severity: request.severity,
            message: request.message.clone(),
            actions: request.actions.clone(),
        }
    }
}
