use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("login cancelled")]
    LoginCancelled,
    #[error("oauth provider error: {0}")]
    OAuthProvider(String),
    #[error("login exchange failed: {0}")]
    LoginExchangeFailed(String),
    #[error("agent invocation failed: {0}")]
    AgentInvocationFailed(String),
    #[error("malformed persisted session: {0}")]
    MalformedPersistedSession(String),
    #[error("an agent run is already in progress")]
    RunInProgress,
    #[error("agent run cancelled")]
    RunCancelled,
    #[error("local store error: {source:#}")]
    Storage { source: anyhow::Error },
}

impl ClientError {
    pub fn storage(source: anyhow::Error) -> Self {
        Self::Storage { source }
    }

    /// Cancellations are user intent, not failures worth surfacing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::LoginCancelled | Self::RunCancelled)
    }
}
