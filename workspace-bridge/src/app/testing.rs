//! In-memory port doubles shared by the app tests.

use crate::domain::{
    AuthToken, CloseReason, NotificationRequest, NotificationResponse, PortStatus, TokenRequest,
    UserNotice, WorkspaceInfo,
};
use crate::ports::{
    ConnectParams, ConnectionHandle, RemoteServerPort, SupervisorError, SupervisorPort,
    SupervisorStream, UiError, UserInterfacePort,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub fn sample_info() -> WorkspaceInfo {
    WorkspaceInfo {
        workspace_id: "ws-1".into(),
        instance_id: "inst-1".into(),
        host: "https://gitpod.example".into(),
        api_endpoint: "wss://api.gitpod.example/v1".into(),
        api_host: "api.gitpod.example".into(),
    }
}

#[derive(Default)]
pub struct FakeSupervisor {
    info_results: Mutex<VecDeque<Result<WorkspaceInfo, SupervisorError>>>,
    info_calls: AtomicUsize,
    token_results: Mutex<VecDeque<Result<AuthToken, SupervisorError>>>,
    token_requests: Mutex<Vec<TokenRequest>>,
    responses: Mutex<Vec<NotificationResponse>>,
    notification_streams: Mutex<VecDeque<SupervisorStream<NotificationRequest>>>,
    port_streams: Mutex<VecDeque<SupervisorStream<Vec<PortStatus>>>>,
}

impl FakeSupervisor {
    pub fn with_info_results(self, results: Vec<Result<WorkspaceInfo, SupervisorError>>) -> Self {
        *self.info_results.lock().unwrap() = results.into();
        self
    }

    pub fn with_token_results(self, results: Vec<Result<AuthToken, SupervisorError>>) -> Self {
        *self.token_results.lock().unwrap() = results.into();
        self
    }

    pub fn push_notifications(&self, items: Vec<NotificationRequest>) {
        let stream = stream::iter(items.into_iter().map(Ok))
            .chain(stream::pending())
            .boxed();
        self.notification_streams.lock().unwrap().push_back(stream);
    }

    pub fn push_port_snapshots(&self, items: Vec<Vec<PortStatus>>) {
        let stream = stream::iter(items.into_iter().map(Ok))
            .chain(stream::pending())
            .boxed();
        self.port_streams.lock().unwrap().push_back(stream);
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.token_requests.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<NotificationResponse> {
        self.responses.lock().unwrap().clone()
    }
}

#[async_trait]
impl SupervisorPort for FakeSupervisor {
    async fn workspace_info(&self) -> Result<WorkspaceInfo, SupervisorError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.info_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(sample_info()))
    }

    async fn token(&self, request: &TokenRequest) -> Result<AuthToken, SupervisorError> {
        let call = {
            let mut requests = self.token_requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        self.token_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AuthToken::new(format!("token-{call}")).unwrap()))
    }

    async fn subscribe_notifications(
        &self,
    ) -> Result<SupervisorStream<NotificationRequest>, SupervisorError> {
        Ok(self
            .notification_streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| stream::pending().boxed()))
    }

    async fn respond_notification(
        &self,
        response: NotificationResponse,
    ) -> Result<(), SupervisorError> {
        self.responses.lock().unwrap().push(response);
        Ok(())
    }

    async fn subscribe_port_status(
        &self,
    ) -> Result<SupervisorStream<Vec<PortStatus>>, SupervisorError> {
        Ok(self
            .port_streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| stream::pending().boxed()))
    }
}

#[derive(Default)]
pub struct FakeUi {
    answer: Option<String>,
    never_answer: bool,
    client: AtomicBool,
    fail_open: bool,
    hang_open: bool,
    notices: Mutex<Vec<UserNotice>>,
    urls: Mutex<Vec<String>>,
    files: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeUi {
    pub fn answering(answer: Option<&str>) -> Self {
        Self {
            answer: answer.map(str::to_string),
            client: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn never_answering() -> Self {
        Self {
            never_answer: true,
            client: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            client: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Opens never finish, like an editor launched with `--wait` that stays open.
    pub fn hanging_open() -> Self {
        Self {
            hang_open: true,
            client: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn set_client(&self, attached: bool) {
        self.client.store(attached, Ordering::SeqCst);
    }

    pub fn notices(&self) -> Vec<UserNotice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn opened_files(&self) -> Vec<(PathBuf, bool)> {
        self.files.lock().unwrap().clone()
    }

    fn open_result(&self, what: &str) -> Result<(), UiError> {
        if self.fail_open {
            return Err(UiError::CommandFailed {
                command: format!("open {what}"),
                status: "exit status: 1".into(),
                stderr: "no display".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl UserInterfacePort for FakeUi {
    async fn has_client(&self) -> bool {
        self.client.load(Ordering::SeqCst)
    }

    async fn open_url(&self, url: &str) -> Result<(), UiError> {
        self.urls.lock().unwrap().push(url.to_string());
        self.open_result(url)
    }

    async fn open_file(&self, path: &Path, wait: bool) -> Result<(), UiError> {
        self.files.lock().unwrap().push((path.to_path_buf(), wait));
        if self.hang_open {
            futures::future::pending::<()>().await;
        }
        self.open_result(&path.display().to_string())
    }

    async fn notify(&self, notice: UserNotice) -> Option<String> {
        self.notices.lock().unwrap().push(notice);
        if self.never_answer {
            futures::future::pending::<()>().await;
        }
        self.answer.clone()
    }
}

/// How one scripted connection attempt behaves.
pub enum FakeConnection {
    Reject(CloseReason),
    CloseAfter(Duration, CloseReason),
    Hold,
}

#[derive(Default)]
pub struct FakeRemote {
    script: Mutex<VecDeque<FakeConnection>>,
    attempts: Mutex<Vec<(Instant, ConnectParams)>>,
}

impl FakeRemote {
    pub fn scripted(script: Vec<FakeConnection>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            attempts: Mutex::default(),
        }
    }

    pub fn attempts(&self) -> Vec<(Instant, ConnectParams)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteServerPort for FakeRemote {
    async fn connect(&self, params: ConnectParams) -> Result<ConnectionHandle, CloseReason> {
        self.attempts
            .lock()
            .unwrap()
            .push((Instant::now(), params));
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeConnection::Hold);
        match next {
            FakeConnection::Reject(reason) => Err(reason),
            FakeConnection::CloseAfter(after, reason) => Ok(ConnectionHandle::new(async move {
                tokio::time::sleep(after).await;
                reason
            })),
            FakeConnection::Hold => Ok(ConnectionHandle::new(futures::future::pending())),
        }
    }
}
