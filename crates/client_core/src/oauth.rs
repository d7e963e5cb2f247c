//! OAuth authorization-code acquisition.

use async_trait::async_trait;
use shared::protocol::{OAuthFlow, GMAIL_COMPOSE_SCOPE, GMAIL_READONLY_SCOPE};
use thiserror::Error;
use url::Url;

pub const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCodeRequest {
    pub flow: OAuthFlow,
    pub scopes: Vec<String>,
}

impl AuthCodeRequest {
    /// Authorization-code request for reading and composing mail.
    pub fn gmail() -> Self {
        Self {
            flow: OAuthFlow::AuthCode,
            scopes: vec![
                GMAIL_READONLY_SCOPE.to_string(),
                GMAIL_COMPOSE_SCOPE.to_string(),
            ],
        }
    }

    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OAuthError {
    #[error("authorization cancelled by user")]
    Cancelled,
    #[error("{0}")]
    Provider(String),
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    async fn request_code(&self, request: &AuthCodeRequest) -> Result<String, OAuthError>;
}

pub struct MissingOAuthProvider;

#[async_trait]
impl OAuthProvider for MissingOAuthProvider {
    async fn request_code(&self, _request: &AuthCodeRequest) -> Result<String, OAuthError> {
        Err(OAuthError::Provider(
            "no oauth provider configured".to_string(),
        ))
    }
}

/// Builds the Google consent URL for an authorization-code request.
pub fn google_authorization_url(
    client_id: &str,
    redirect_uri: &str,
    request: &AuthCodeRequest,
) -> Result<Url, OAuthError> {
    if request.flow != OAuthFlow::AuthCode {
        return Err(OAuthError::Provider(
            "only the auth-code flow is supported".to_string(),
        ));
    }
    if client_id.trim().is_empty() {
        return Err(OAuthError::Provider(
            "google client id is not configured".to_string(),
        ));
    }

    let mut url = Url::parse(GOOGLE_AUTHORIZATION_ENDPOINT)
        .map_err(|err| OAuthError::Provider(format!("invalid authorization endpoint: {err}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id.trim())
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &request.scope_param())
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    Ok(url)
}

/// Extracts the authorization code from what the user pasted back: either the
/// bare code or the full redirect URL.
pub fn parse_authorization_response(input: &str) -> Result<String, OAuthError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(OAuthError::Cancelled);
    }

    if !(input.starts_with("http://") || input.starts_with("https://")) {
        return Ok(input.to_string());
    }

    let url = Url::parse(input)
        .map_err(|err| OAuthError::Provider(format!("invalid redirect url: {err}")))?;

    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (code, error) {
        (_, Some(error)) if error == "access_denied" => Err(OAuthError::Cancelled),
        (_, Some(error)) => Err(OAuthError::Provider(format!(
            "authorization server returned error '{error}'"
        ))),
        (Some(code), None) if !code.is_empty() => Ok(code),
        _ => Err(OAuthError::Provider(
            "redirect url did not carry an authorization code".to_string(),
        )),
    }
}

#[cfg(test)]
#[path = "tests/oauth_tests.rs"]
mod tests;
