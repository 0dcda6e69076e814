use crate::domain::{Severity, UserNotice};
use crate::ports::{UiError, UserInterfacePort};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

const APP_NAME: &str = "Workspace Bridge";

/// Desktop integration through external commands: an opener for files and
/// urls and `notify-send` for notices. Without a notifier, notices are only
/// logged.
pub struct DesktopUserInterface {
    opener: Vec<String>,
    notifier: Option<Vec<String>>,
}

impl DesktopUserInterface {
    pub fn new(open_command: Option<&str>) -> Self {
        let opener = open_command
            .map(split_command)
            .filter(|command| !command.is_empty())
            .unwrap_or_else(default_opener);
        let notifier = which::which("notify-send")
            .ok()
            .map(|path| vec![path.to_string_lossy().into_owned()]);
        Self { opener, notifier }
    }

    pub fn with_notifier(mut self, notifier: Option<Vec<String>>) -> Self {
        self.notifier = notifier.filter(|command| !command.is_empty());
        self
    }

    /// Runs `command` to completion. The child is killed if the caller stops
    /// waiting, so an abandoned notice does not linger on screen.
    async fn output(&self, command: &[String], args: Vec<OsString>) -> Result<Output, UiError> {
        let (program, fixed) = split_program(command)?;
        Command::new(program)
            .args(fixed)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| UiError::Spawn {
                command: command.join(" "),
                source,
            })
    }

    async fn open(&self, target: OsString, wait: bool) -> Result<(), UiError> {
        if !wait {
            let (program, fixed) = split_program(&self.opener)?;
            Command::new(program)
                .args(fixed)
                .arg(&target)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|source| UiError::Spawn {
                    command: self.opener.join(" "),
                    source,
                })?;
            return Ok(());
        }

        let output = self.output(&self.opener, vec![target]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(UiError::CommandFailed {
                command: self.opener.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl UserInterfacePort for DesktopUserInterface {
    async fn has_client(&self) -> bool {
        self.opener
            .first()
            .is_some_and(|program| which::which(program).is_ok())
    }

    async fn open_url(&self, url: &str) -> Result<(), UiError> {
        debug!(%url, "opening url");
        self.open(OsString::from(url), true).await
    }

    async fn open_file(&self, path: &Path, wait: bool) -> Result<(), UiError> {
        debug!(path = %path.display(), wait, "opening file");
        self.open(path.as_os_str().to_os_string(), wait).await
    }

    async fn notify(&self, notice: UserNotice) -> Option<String> {
        let Some(notifier) = &self.notifier else {
            log_notice(&notice);
            return None;
        };

        let mut args: Vec<OsString> = vec![
            format!("--app-name={APP_NAME}").into(),
            format!("--urgency={}", urgency(notice.severity)).into(),
        ];
        if !notice.actions.is_empty() {
            args.push("--wait".into());
            for (index, label) in notice.actions.iter().enumerate() {
                args.push(format!("--action={index}={label}").into());
            }
        }
        args.push(APP_NAME.into());
        args.push(notice.message.clone().into());

        match self.output(notifier, args).await {
            Ok(output) if output.status.success() => {
                let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| notice.actions.get(index).cloned())
            }
            Ok(output) => {
                warn!(status = %output.status, "notifier failed");
                log_notice(&notice);
                None
            }
            Err(err) => {
                warn!(%err, "notifier unavailable");
                log_notice(&notice);
                None
            }
        }
    }
}

fn split_program(command: &[String]) -> Result<(&String, &[String]), UiError> {
    command.split_first().ok_or_else(|| UiError::Spawn {
        command: String::new(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
    })
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn default_opener() -> Vec<String> {
    let command: &[&str] = if cfg!(target_os = "macos") {
        &["open"]
    } else if cfg!(windows) {
        &["cmd", "/C", "start", ""]
    } else {
        &["xdg-open"]
    };
    command.iter().map(|part| part.to_string()).collect()
}

fn urgency(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "critical",
        Severity::Warning | Severity::Info => "normal",
    }
}

fn log_notice(notice: &UserNotice) {
    match notice.severity {
        Severity::Error => error!(message = %notice.message, actions = ?notice.actions, "notification"),
        Severity::Warning => warn!(message = %notice.message, actions = ?notice.actions, "notification"),
        Severity::Info => info!(message = %notice.message, actions = ?notice.actions, "notification"),
    }
}
