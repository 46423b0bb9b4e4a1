pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod platform;
pub mod services;
pub mod utils;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::platform::ExamSurface;
use crate::services::attempt_api::HttpAttemptService;
use crate::services::session::{SessionController, SessionTarget};
use reqwest::Client;
use uuid::Uuid;

/// Shared wiring for one exam-taking client: the configuration and the HTTP
/// client every session borrows.
#[derive(Clone)]
pub struct SessionRuntime {
    pub config: SessionConfig,
    pub attempt_api: HttpAttemptService,
}

impl SessionRuntime {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(Error::Reqwest)?;
        let attempt_api = HttpAttemptService::with_client(
            http_client,
            &config.api_base_url,
            config.auth_token.clone(),
        )?;
        Ok(Self {
            config,
            attempt_api,
        })
    }

    /// Controller that starts a fresh attempt at `exam_id`.
    pub fn start_session<S: ExamSurface>(
        &self,
        surface: S,
        exam_id: Uuid,
    ) -> SessionController<S, HttpAttemptService> {
        SessionController::new(
            self.config.clone(),
            self.attempt_api.clone(),
            surface,
            SessionTarget::Start { exam_id },
        )
    }

    /// Controller that resumes an attempt the student already holds.
    pub fn resume_session<S: ExamSurface>(
        &self,
        surface: S,
        attempt_id: Uuid,
    ) -> SessionController<S, HttpAttemptService> {
        SessionController::new(
            self.config.clone(),
            self.attempt_api.clone(),
            surface,
            SessionTarget::Resume { attempt_id },
        )
    }
}
