use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use leadboard_core::config::AppConfig;
use leadboard_core::pipeline::{
    ApiErrorBody, MoveRequest, PipelineData, StageChangeAck, StageChangeRequest,
};

use crate::error::GatewayError;

/// The server half of the board contract.
#[async_trait]
pub trait PipelineGateway: Send + Sync {
    async fn fetch_pipeline(&self) -> Result<PipelineData, GatewayError>;

    async fn request_stage_change(
        &self,
        request: &MoveRequest,
    ) -> Result<StageChangeAck, GatewayError>;
}

#[derive(Clone)]
pub struct HttpPipelineGateway {
    base_url: Url,
    client: Client,
    admin_token: Option<SecretString>,
}

impl HttpPipelineGateway {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, GatewayError> {
        let base_url =
            Url::parse(base_url).map_err(|_| GatewayError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidBaseUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { base_url, client, admin_token: None })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        let gateway = Self::new(&config.client.base_url, config.pipeline.move_timeout())?;
        Ok(match &config.auth.admin_token {
            Some(token) => gateway.with_admin_token(token.clone()),
            None => gateway,
        })
    }

    /// Token presented on forced moves.
    pub fn with_admin_token(mut self, token: SecretString) -> Self {
        self.admin_token = Some(token);
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl PipelineGateway for HttpPipelineGateway {
    async fn fetch_pipeline(&self) -> Result<PipelineData, GatewayError> {
        let url = self.endpoint(&["pipeline"])?;
        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<PipelineData>().await?)
    }

    async fn request_stage_change(
        &self,
        request: &MoveRequest,
    ) -> Result<StageChangeAck, GatewayError> {
        let url = self.endpoint(&["leads", request.lead_id.as_str(), "stage"])?;
        let mut builder = self.client.patch(url).json(&StageChangeRequest::from(request));
        if request.force {
            if let Some(token) = &self.admin_token {
                builder = builder.bearer_auth(token.expose_secret());
            }
        }

        debug!(
            event_name = "client.move.sent",
            lead_id = %request.lead_id,
            target_stage = %request.target_stage,
            force = request.force,
            "stage change sent"
        );
        let response = ensure_success(builder.send().await?).await?;
        Ok(response.json::<StageChangeAck>().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (reason, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(error) => (error.reason, error.message),
        Err(_) => ("unexpected_status".to_string(), format!("{status}: {body}")),
    };
    Err(GatewayError::Rejected { status: status.as_u16(), reason, message })
}
