use serde::{Deserialize, Serialize};

/// Key under which the signed-in user is persisted in the local store.
pub const PERSISTED_USER_KEY: &str = "inbox_zero_user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            picture: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl AgentRunStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "run")]
pub enum SessionPhase {
    Unauthenticated,
    Authenticating,
    Authenticated(AgentRunStatus),
}

impl SessionPhase {
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated(AgentRunStatus::Idle) => "authenticated-idle",
            Self::Authenticated(AgentRunStatus::Running) => "authenticated-running",
            Self::Authenticated(AgentRunStatus::Completed) => "authenticated-completed",
            Self::Authenticated(AgentRunStatus::Failed) => "authenticated-failed",
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
