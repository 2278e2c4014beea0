use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::api::error::ApiError;
use crate::api::types::{
    AvailableModel, AvailableModelsResponse, CreateSessionRequest, CreateSessionResponse,
    HealthReport, SessionStatus, SynapseEventsReport,
};
use crate::config::ClientConfig;
use crate::session::types::SessionId;

/// HTTP client for the collaboration server.
///
/// Request/response calls carry the configured timeout. The event stream is
/// long-lived and only bounded by the connect timeout.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }

        let http_client = Client::builder().connect_timeout(request_timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            request_timeout,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        let url = self.endpoint(&["api", "health"])?;
        self.get_json("health", url).await
    }

    pub async fn available_models(&self) -> Result<Vec<AvailableModel>, ApiError> {
        let url = self.endpoint(&["api", "panels", "available-models"])?;
        let response: AvailableModelsResponse = self.get_json("available_models", url).await?;
        Ok(response.models)
    }

    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, ApiError> {
        request
            .validate()
            .map_err(|details| ApiError::InvalidRequest {
                endpoint: "create_session".to_string(),
                details,
            })?;

        let url = self.endpoint(&["api", "chat", "sessions", "create"])?;
        debug!(target: "chorus::api", %url, mission = %request.mission, "creating session");

        let response = self
            .http_client
            .post(url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        decode_json("create_session", response).await
    }

    pub async fn session_status(&self, session_id: &SessionId) -> Result<SessionStatus, ApiError> {
        let url = self.endpoint(&["api", "chat", session_id.as_str(), "status"])?;
        self.get_json("session_status", url).await
    }

    pub async fn synapse_events(
        &self,
        session_id: &SessionId,
    ) -> Result<SynapseEventsReport, ApiError> {
        let url = self.endpoint(&["api", "chat", session_id.as_str(), "synapse-events"])?;
        self.get_json("synapse_events", url).await
    }

    /// Opens the per-turn event stream. The returned response has a success
    /// status; its body is the SSE byte stream.
    pub async fn open_stream(
        &self,
        session_id: &SessionId,
        prompt: &str,
    ) -> Result<Response, ApiError> {
        let mut url = self.endpoint(&["api", "chat", session_id.as_str(), "stream"])?;
        url.query_pairs_mut().append_pair("message", prompt);

        debug!(target: "chorus::api", session_id = %session_id, "opening event stream");

        let response = self
            .http_client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status("stream", status.as_u16(), details));
        }

        Ok(response)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
    ) -> Result<T, ApiError> {
        debug!(target: "chorus::api", %url, endpoint, "GET");
        let response = self
            .http_client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        decode_json(endpoint, response).await
    }
}

async fn decode_json<T: DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(endpoint, status.as_u16(), details));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::ResponseParsingError {
        endpoint: endpoint.to_string(),
        details: e.to_string(),
    })
}
