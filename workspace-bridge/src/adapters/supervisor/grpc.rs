use crate::domain::{
    AuthToken, ExposedPort, NotificationId, NotificationRequest, NotificationResponse,
    OnExposedAction, PortStatus, Severity, TokenRequest, WorkspaceInfo,
};
use crate::ports::{SupervisorError, SupervisorPort, SupervisorStream};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

pub mod proto {
    tonic::include_proto!("supervisor");
}

use proto::info_service_client::InfoServiceClient;
use proto::notification_service_client::NotificationServiceClient;
use proto::notify_request::Level;
use proto::status_service_client::StatusServiceClient;
use proto::token_service_client::TokenServiceClient;
use proto::{
    GetTokenRequest, NotifyResponse, OnPortExposedAction, PortsStatus, PortsStatusRequest,
    RespondRequest, SubscribeRequest, SubscribeResponse, WorkspaceInfoRequest,
    WorkspaceInfoResponse,
};

pub const DEFAULT_SUPERVISOR_ENDPOINT: &str = "http://localhost:22999";
const TOKEN_DESCRIPTION: &str = "workspace-bridge remote session";

/// Supervisor client over one lazily connected channel. Every service
/// client is a cheap clone of the same channel.
#[derive(Clone, Debug)]
pub struct GrpcSupervisor {
    channel: Channel,
}

impl GrpcSupervisor {
    pub fn connect_lazy(endpoint: &str) -> Result<Self, SupervisorError> {
        let endpoint = Endpoint::from_shared(endpoint.to_string())
            .map_err(|err| SupervisorError::Unavailable(format!("invalid endpoint: {err}")))?
            .connect_timeout(Duration::from_secs(5));
        Ok(Self {
            channel: endpoint.connect_lazy(),
        })
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SupervisorPort for GrpcSupervisor {
    async fn workspace_info(&self) -> Result<WorkspaceInfo, SupervisorError> {
        let response = InfoServiceClient::new(self.channel.clone())
            .workspace_info(WorkspaceInfoRequest {})
            .await?;
        Ok(workspace_info_from_proto(response.into_inner()))
    }

    async fn token(&self, request: &TokenRequest) -> Result<AuthToken, SupervisorError> {
        let response = TokenServiceClient::new(self.channel.clone())
            .get_token(GetTokenRequest {
                host: request.host.clone(),
                scope: request.scopes.clone(),
                description: TOKEN_DESCRIPTION.to_string(),
                kind: request.kind.clone(),
            })
            .await?;
        AuthToken::new(response.into_inner().token).map_err(SupervisorError::InvalidMessage)
    }

    async fn subscribe_notifications(
        &self,
    ) -> Result<SupervisorStream<NotificationRequest>, SupervisorError> {
        let stream = NotificationServiceClient::new(self.channel.clone())
            .subscribe(SubscribeRequest {})
            .await?
            .into_inner();
        Ok(stream
            .map(|item| {
                item.map_err(SupervisorError::from)
                    .and_then(notification_from_proto)
            })
            .boxed())
    }

    async fn respond_notification(
        &self,
        response: NotificationResponse,
    ) -> Result<(), SupervisorError> {
        NotificationServiceClient::new(self.channel.clone())
            .respond(RespondRequest {
                request_id: response.request_id.get(),
                response: Some(NotifyResponse {
                    action: response.action,
                }),
            })
            .await?;
        Ok(())
    }

    async fn subscribe_port_status(
        &self,
    ) -> Result<SupervisorStream<Vec<PortStatus>>, SupervisorError> {
        let stream = StatusServiceClient::new(self.channel.clone())
            .ports_status(PortsStatusRequest { observe: true })
            .await?
            .into_inner();
        Ok(stream
            .map(|item| {
                item.map_err(SupervisorError::from).and_then(|batch| {
                    batch
                        .ports
                        .into_iter()
                        .map(port_from_proto)
                        .collect::<Result<Vec<_>, _>>()
                })
            })
            .boxed())
    }
}

impl From<Status> for SupervisorError {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::Unavailable => SupervisorError::Unavailable(status.message().to_string()),
            code => SupervisorError::Rpc {
                code: format!("{code:?}"),
                message: status.message().to_string(),
            },
        }
    }
}

fn workspace_info_from_proto(response: WorkspaceInfoResponse) -> WorkspaceInfo {
    let api = response.gitpod_api.unwrap_or_default();
    WorkspaceInfo {
        workspace_id: response.workspace_id,
        instance_id: response.instance_id,
        host: response.gitpod_host,
        api_endpoint: api.endpoint,
        api_host: api.host,
    }
}

fn notification_from_proto(
    response: SubscribeResponse,
) -> Result<NotificationRequest, SupervisorError> {
    let request = response.request.ok_or_else(|| {
        SupervisorError::InvalidMessage(format!(
            "notification {} has no request",
            response.request_id
        ))
    })?;
    let severity = match Level::try_from(request.level) {
        Ok(Level::Error) => Severity::Error,
        Ok(Level::Warning) => Severity::Warning,
        Ok(Level::Info) | Err(_) => Severity::Info,
    };
    Ok(NotificationRequest {
        id: NotificationId::new(response.request_id),
        message: request.message,
        severity,
        actions: request.actions,
    })
}

fn port_from_proto(port: PortsStatus) -> Result<PortStatus, SupervisorError> {
    let local_port = u16::try_from(port.local_port).map_err(|_| {
        SupervisorError::InvalidMessage(format!("port {} out of range", port.local_port))
    })?;
    Ok(PortStatus {
        local_port,
        served: port.served,
        exposed: port.exposed.map(|exposed| ExposedPort {
            url: exposed.url,
            on_exposed: on_exposed_from_proto(exposed.on_exposed),
        }),
    })
}

fn on_exposed_from_proto(value: i32) -> OnExposedAction {
    match OnPortExposedAction::try_from(value) {
        Ok(OnPortExposedAction::OpenBrowser) => OnExposedAction::OpenBrowser,
        Ok(OnPortExposedAction::OpenPreview) => OnExposedAction::OpenPreview,
        Ok(OnPortExposedAction::Notify) => OnExposedAction::Notify,
        Ok(OnPortExposedAction::NotifyPrivate) => OnExposedAction::NotifyPrivate,
        Ok(OnPortExposedAction::Ignore) => OnExposedAction::Ignore,
        Err(_) => OnExposedAction::Other(value),
    }
}
