use serde::{Deserialize, Serialize};

use crate::domain::User;

pub const AUTH_GOOGLE_PATH: &str = "/auth/google";
pub const RUN_AGENT_PATH: &str = "/run-agent";

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const GMAIL_COMPOSE_SCOPE: &str = "https://www.googleapis.com/auth/gmail.compose";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OAuthFlow {
    AuthCode,
    Implicit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthGoogleRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthGoogleResponse {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAgentRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAgentResponse {
    pub agent_response: String,
}
