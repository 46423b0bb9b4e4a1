use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::dto::attempt_dto::{
    AttemptReview, SubmitAnswerRequest, SubmitAnswerResponse, ViolationOutcome,
};
use crate::error::{Error, Result};
use crate::models::attempt::Attempt;

/// Remote attempt service consumed by the session controller and the answer
/// path. Implementations must be cheap to clone: answer and violation calls
/// are spawned while the session loop keeps processing ticks and events.
pub trait AttemptApi: Clone + Send + Sync + 'static {
    fn start_attempt(&self, exam_id: Uuid) -> impl Future<Output = Result<Attempt>> + Send;
    fn get_attempt(&self, attempt_id: Uuid) -> impl Future<Output = Result<Attempt>> + Send;
    fn list_attempts(&self) -> impl Future<Output = Result<Vec<Attempt>>> + Send;
    fn submit_answer(
        &self,
        attempt_id: Uuid,
        request: SubmitAnswerRequest,
    ) -> impl Future<Output = Result<SubmitAnswerResponse>> + Send;
    /// The response carries the authoritative count; at the limit the server
    /// finalizes the attempt on its side.
    fn record_violation(
        &self,
        attempt_id: Uuid,
    ) -> impl Future<Output = Result<ViolationOutcome>> + Send;
    /// Idempotent on repeat.
    fn finish_attempt(&self, attempt_id: Uuid) -> impl Future<Output = Result<Attempt>> + Send;
    fn get_review(&self, attempt_id: Uuid) -> impl Future<Output = Result<AttemptReview>> + Send;
}

#[derive(Clone)]
pub struct HttpAttemptService {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpAttemptService {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(Error::Reqwest)?;
        Self::with_client(client, &config.api_base_url, config.auth_token.clone())
    }

    pub fn with_client(client: Client, base_url: &str, auth_token: Option<String>) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'.
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let base_url = Url::parse(&normalized)?;
        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid endpoint path {}: {}", path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self.authorize(self.client.get(url)).send().await?;
        read_json(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }
}

impl AttemptApi for HttpAttemptService {
    async fn start_attempt(&self, exam_id: Uuid) -> Result<Attempt> {
        info!("Starting attempt for exam {}", exam_id);
        self.post_json(&format!("attempts/start/{}/", exam_id), &serde_json::json!({}))
            .await
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Attempt> {
        self.get_json(&format!("attempts/{}/", attempt_id)).await
    }

    async fn list_attempts(&self) -> Result<Vec<Attempt>> {
        self.get_json("attempts/").await
    }

    async fn submit_answer(
        &self,
        attempt_id: Uuid,
        request: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse> {
        let body = serde_json::to_value(&request)?;
        self.post_json(&format!("attempts/{}/submit-answer/", attempt_id), &body)
            .await
    }

    async fn record_violation(&self, attempt_id: Uuid) -> Result<ViolationOutcome> {
        self.post_json(
            &format!("attempts/{}/record-violation/", attempt_id),
            &serde_json::json!({}),
        )
        .await
    }

    async fn finish_attempt(&self, attempt_id: Uuid) -> Result<Attempt> {
        info!("Finishing attempt {}", attempt_id);
        self.post_json(
            &format!("attempts/{}/finish/", attempt_id),
            &serde_json::json!({}),
        )
        .await
    }

    async fn get_review(&self, attempt_id: Uuid) -> Result<AttemptReview> {
        self.get_json(&format!("attempts/{}/review/", attempt_id))
            .await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or(body);
        return Err(match status {
            StatusCode::BAD_REQUEST => Error::BadRequest(detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(detail),
            StatusCode::NOT_FOUND => Error::NotFound(detail),
            _ => Error::Service {
                status: status.as_u16(),
                detail,
            },
        });
    }
    Ok(response.json::<T>().await?)
}
