//! Remote orchestration API access.
//!
//! The core only ever talks to the remote side through the [`Gateway`]
//! trait; [`HttpGateway`] is the production implementation. Tests inject
//! their own stub.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::directory::Service;
use crate::error::GatewayError;
use crate::layout::LayoutSnapshot;
use crate::types::ContainerStats;

pub mod push;

/// Create-service payload for `POST /services`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateService {
    pub name: String,
    pub category: String,
    pub image: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub icon: String,
    pub ports: Vec<String>,
    pub env_vars: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
}

/// Interface to the external orchestration API. Container state transitions
/// acknowledged here are asynchronous: the ack only means the command was
/// accepted, the directory catches up through a later fetch.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn list_services(&self) -> Result<Vec<Service>, GatewayError>;
    async fn create_service(&self, spec: &CreateService) -> Result<Service, GatewayError>;
    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), GatewayError>;
    async fn start_container(&self, id: &str) -> Result<(), GatewayError>;
    async fn stop_container(&self, id: &str) -> Result<(), GatewayError>;
    async fn restart_container(&self, id: &str) -> Result<(), GatewayError>;
    async fn container_stats(&self, id: &str) -> Result<ContainerStats, GatewayError>;
    async fn container_logs(&self, id: &str, tail: u32) -> Result<String, GatewayError>;
    async fn save_layout(&self, snapshot: &LayoutSnapshot) -> Result<(), GatewayError>;
}

/// Error body shape the orchestration API uses for rejections.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogsBody {
    logs: String,
}

/// HTTP client for the orchestration API.
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(self.error_for(status, response).await)
    }

    async fn expect_ok(&self, response: Response) -> Result<(), GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(self.error_for(status, response).await)
    }

    async fn error_for(&self, status: StatusCode, response: Response) -> GatewayError {
        let reason = match response.json::<ApiErrorBody>().await {
            Ok(body) => body.detail.unwrap_or_else(|| status.to_string()),
            Err(_) => status.to_string(),
        };
        match status {
            StatusCode::NOT_FOUND => GatewayError::NotFound { resource: reason },
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                GatewayError::Validation { reason }
            }
            _ => GatewayError::Api {
                status: status.as_u16(),
                reason,
            },
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list_services(&self) -> Result<Vec<Service>, GatewayError> {
        debug!("fetching service directory");
        let response = self.client.get(self.url("/services")).send().await?;
        self.parse_response(response).await
    }

    async fn create_service(&self, spec: &CreateService) -> Result<Service, GatewayError> {
        let response = self
            .client
            .post(self.url("/services"))
            .json(spec)
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), GatewayError> {
        let response = self
            .client
            .patch(self.url(&format!("/services/{id}/enable")))
            .query(&[("enabled", enabled)])
            .send()
            .await?;
        self.expect_ok(response).await
    }

    async fn start_container(&self, id: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("/containers/{id}/start")))
            .send()
            .await?;
        self.expect_ok(response).await
    }

    async fn stop_container(&self, id: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("/containers/{id}/stop")))
            .send()
            .await?;
        self.expect_ok(response).await
    }

    async fn restart_container(&self, id: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("/containers/{id}/restart")))
            .send()
            .await?;
        self.expect_ok(response).await
    }

    async fn container_stats(&self, id: &str) -> Result<ContainerStats, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("/containers/{id}/stats")))
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn container_logs(&self, id: &str, tail: u32) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("/containers/{id}/logs")))
            .query(&[("tail", tail)])
            .send()
            .await?;
        let body: LogsBody = self.parse_response(response).await?;
        Ok(body.logs)
    }

    async fn save_layout(&self, snapshot: &LayoutSnapshot) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url("/layouts"))
            .json(snapshot)
            .send()
            .await?;
        self.expect_ok(response).await
    }
}
