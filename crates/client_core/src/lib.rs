use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::User,
    error::ApiError,
    protocol::{
        AuthGoogleRequest, AuthGoogleResponse, RunAgentRequest, RunAgentResponse,
        AUTH_GOOGLE_PATH, RUN_AGENT_PATH,
    },
};
use tracing::debug;

pub mod error;
pub mod oauth;
mod session_controller;

pub use error::ClientError;
pub use oauth::{AuthCodeRequest, MissingOAuthProvider, OAuthError, OAuthProvider};
pub use session_controller::{
    run_failed_line, AgentReport, ClientEvent, RestorePolicy, SessionController, SessionHandle,
    SessionView, RUN_COMPLETED_LINE, RUN_STARTED_LINE,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The two remote calls the client makes. Everything behind them (token
/// storage, mailbox access, reasoning) belongs to the backend.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn exchange_auth_code(&self, code: &str) -> Result<User>;
    async fn run_agent(&self, email: &str) -> Result<String>;
}

pub struct MissingAgentBackend;

#[async_trait]
impl AgentBackend for MissingAgentBackend {
    async fn exchange_auth_code(&self, _code: &str) -> Result<User> {
        Err(anyhow!("agent backend is unavailable"))
    }

    async fn run_agent(&self, _email: &str) -> Result<String> {
        Err(anyhow!("agent backend is unavailable"))
    }
}

pub struct HttpAgentBackend {
    http: Client,
    api_base: String,
}

impl HttpAgentBackend {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_base, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            api_base: normalize_api_base(&api_base.into()),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.api_base);
        debug!(%url, "posting to backend");
        let res = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&text)
                .ok()
                .and_then(|err| err.message())
                .unwrap_or(text);
            if detail.trim().is_empty() {
                bail!("backend returned {status} for {path}");
            }
            bail!("backend returned {status} for {path}: {}", detail.trim());
        }

        res.json::<R>()
            .await
            .with_context(|| format!("malformed response body from {path}"))
    }
}

#[async_trait]
impl AgentBackend for HttpAgentBackend {
    async fn exchange_auth_code(&self, code: &str) -> Result<User> {
        let body: AuthGoogleResponse = self
            .post_json(
                AUTH_GOOGLE_PATH,
                &AuthGoogleRequest {
                    code: code.to_string(),
                },
            )
            .await?;
        if body.user.email.trim().is_empty() {
            bail!("backend returned a user without an email address");
        }
        Ok(body.user)
    }

    async fn run_agent(&self, email: &str) -> Result<String> {
        let body: RunAgentResponse = self
            .post_json(
                RUN_AGENT_PATH,
                &RunAgentRequest {
                    email: email.to_string(),
                },
            )
            .await?;
        Ok(body.agent_response)
    }
}

fn normalize_api_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
