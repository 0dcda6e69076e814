#![allow(dead_code)]

use futures::stream::{self, BoxStream, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Duration};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tonic::transport::Server;
use tonic::{Request as RpcRequest, Response as RpcResponse, Status};

pub mod supervisor_proto {
    tonic::include_proto!("supervisor");
}

use supervisor_proto::info_service_server::{InfoService, InfoServiceServer};
use supervisor_proto::notification_service_server::{
    NotificationService, NotificationServiceServer,
};
use supervisor_proto::notify_request::Level;
use supervisor_proto::status_service_server::{StatusService, StatusServiceServer};
use supervisor_proto::token_service_server::{TokenService, TokenServiceServer};
use supervisor_proto::workspace_info_response::GitpodApi;
use supervisor_proto::{
    ExposedPortInfo, GetTokenRequest, GetTokenResponse, NotifyRequest, OnPortExposedAction,
    PortsStatus, PortsStatusRequest, PortsStatusResponse, RespondRequest, RespondResponse,
    SubscribeRequest, SubscribeResponse, WorkspaceInfoRequest, WorkspaceInfoResponse,
};

#[derive(Default)]
struct Recorded {
    token_requests: Vec<GetTokenRequest>,
    responses: Vec<(u64, String)>,
    notification_subscriptions: usize,
    port_requests: Vec<bool>,
}

/// In-process supervisor serving fixed workspace data.
#[derive(Clone)]
pub struct FakeSupervisor {
    remote_endpoint: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeSupervisor {
    pub fn new(remote_endpoint: impl Into<String>) -> Self {
        Self {
            remote_endpoint: remote_endpoint.into(),
            recorded: Arc::default(),
        }
    }

    pub fn token_requests(&self) -> Vec<GetTokenRequest> {
        self.recorded.lock().unwrap().token_requests.clone()
    }

    pub fn responses(&self) -> Vec<(u64, String)> {
        self.recorded.lock().unwrap().responses.clone()
    }

    pub fn port_requests(&self) -> Vec<bool> {
        self.recorded.lock().unwrap().port_requests.clone()
    }

    pub fn notification_subscriptions(&self) -> usize {
        self.recorded.lock().unwrap().notification_subscriptions
    }
}

#[tonic::async_trait]
impl InfoService for FakeSupervisor {
    async fn workspace_info(
        &self,
        _request: RpcRequest<WorkspaceInfoRequest>,
    ) -> Result<RpcResponse<WorkspaceInfoResponse>, Status> {
        Ok(RpcResponse::new(WorkspaceInfoResponse {
            workspace_id: "ws-e2e".into(),
            instance_id: "inst-e2e".into(),
            gitpod_host: "https://gitpod.example".into(),
            gitpod_api: Some(GitpodApi {
                endpoint: self.remote_endpoint.clone(),
                host: "api.gitpod.example".into(),
            }),
        }))
    }
}

#[tonic::async_trait]
impl TokenService for FakeSupervisor {
    async fn get_token(
        &self,
        request: RpcRequest<GetTokenRequest>,
    ) -> Result<RpcResponse<GetTokenResponse>, Status> {
        let request = request.into_inner();
        let mut recorded = self.recorded.lock().unwrap();
        recorded.token_requests.push(request.clone());
        Ok(RpcResponse::new(GetTokenResponse {
            token: format!("token-{}", recorded.token_requests.len()),
            user: "user-1".into(),
            scope: request.scope,
        }))
    }
}

#[tonic::async_trait]
impl NotificationService for FakeSupervisor {
    type SubscribeStream = BoxStream<'static, Result<SubscribeResponse, Status>>;

    async fn subscribe(
        &self,
        _request: RpcRequest<SubscribeRequest>,
    ) -> Result<RpcResponse<Self::SubscribeStream>, Status> {
        let first = {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.notification_subscriptions += 1;
            recorded.notification_subscriptions == 1
        };
        let stream = if first {
            stream::iter(vec![
                Ok(SubscribeResponse {
                    request_id: 7,
                    request: Some(NotifyRequest {
                        level: Level::Warning as i32,
                        message: "Workspace is timing out".into(),
                        actions: vec!["Extend".into(), "Dismiss".into()],
                    }),
                }),
                Err(Status::unavailable("supervisor restarting")),
            ])
            .boxed()
        } else {
            stream::pending().boxed()
        };
        Ok(RpcResponse::new(stream))
    }

    async fn respond(
        &self,
        request: RpcRequest<RespondRequest>,
    ) -> Result<RpcResponse<RespondResponse>, Status> {
        let request = request.into_inner();
        let action = request
            .response
            .map(|response| response.action)
            .ok_or_else(|| Status::invalid_argument("response is required"))?;
        self.recorded
            .lock()
            .unwrap()
            .responses
            .push((request.request_id, action));
        Ok(RpcResponse::new(RespondResponse {}))
    }
}

#[tonic::async_trait]
impl StatusService for FakeSupervisor {
    type PortsStatusStream = BoxStream<'static, Result<PortsStatusResponse, Status>>;

    async fn ports_status(
        &self,
        request: RpcRequest<PortsStatusRequest>,
    ) -> Result<RpcResponse<Self::PortsStatusStream>, Status> {
        self.recorded
            .lock()
            .unwrap()
            .port_requests
            .push(request.into_inner().observe);
        let snapshot = PortsStatusResponse {
            ports: vec![
                PortsStatus {
                    local_port: 3000,
                    served: true,
                    exposed: Some(ExposedPortInfo {
                        visibility: 1,
                        url: "https://3000-ws.example".into(),
                        on_exposed: OnPortExposedAction::OpenBrowser as i32,
                    }),
                },
                PortsStatus {
                    local_port: 5990,
                    served: true,
                    exposed: None,
                },
            ],
        };
        Ok(RpcResponse::new(
            stream::iter(vec![Ok(snapshot)])
                .chain(stream::pending())
                .boxed(),
        ))
    }
}

/// Serves the fake supervisor on an ephemeral port and returns its url.
pub async fn spawn_supervisor(fake: FakeSupervisor) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder()
            .add_service(InfoServiceServer::new(fake.clone()))
            .add_service(TokenServiceServer::new(fake.clone()))
            .add_service(NotificationServiceServer::new(fake.clone()))
            .add_service(StatusServiceServer::new(fake))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

/// Websocket server that records the bearer header of every upgrade and
/// either rejects it or closes right after accepting.
pub async fn spawn_remote_server(reject: bool) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_server = Arc::clone(&seen);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = Arc::clone(&seen_by_server);
            tokio::spawn(async move {
                let callback = move |request: &Request, response: Response| {
                    let auth = request
                        .headers()
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push(auth);
                    if reject {
                        let mut error = ErrorResponse::new(Some("token rejected".into()));
                        *error.status_mut() = StatusCode::FORBIDDEN;
                        Err(error)
                    } else {
                        Ok(response)
                    }
                };
                if let Ok(mut socket) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                {
                    let _ = socket
                        .close(Some(CloseFrame {
                            code: CloseCode::Away,
                            reason: "server restarting".into(),
                        }))
                        .await;
                }
            });
        }
    });
    (format!("ws://{addr}/v1"), seen)
}

pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(10), async {
        while !condition() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}
