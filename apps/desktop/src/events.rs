//! User-facing error modeling for the terminal front-end.

use client_core::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    Startup,
    Login,
    RunAgent,
    Logout,
}

impl UiErrorContext {
    pub fn label(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Login => "login",
            Self::RunAgent => "run",
            Self::Logout => "logout",
        }
    }
}

pub fn classify_login_failure(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    if lower.contains("failed to reach")
        || lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("timed out")
    {
        "Server unreachable; check API_BASE and your network, then retry login.".to_string()
    } else if lower.contains("invalid_grant") || lower.contains("400") {
        "Google rejected the authorization code; it may have expired. Retry login.".to_string()
    } else {
        format!("Login failed: {message}")
    }
}

fn categorize(message: &str) -> UiErrorCategory {
    let message_lower = message.to_ascii_lowercase();
    if message_lower.contains("401")
        || message_lower.contains("403")
        || message_lower.contains("unauthorized")
        || message_lower.contains("forbidden")
        || message_lower.contains("invalid_grant")
    {
        UiErrorCategory::Auth
    } else if message_lower.contains("invalid")
        || message_lower.contains("missing")
        || message_lower.contains("malformed")
        || message_lower.contains("not configured")
    {
        UiErrorCategory::Validation
    } else if message_lower.contains("timed out")
        || message_lower.contains("connection")
        || message_lower.contains("failed to reach")
        || message_lower.contains("unavailable")
    {
        UiErrorCategory::Transport
    } else {
        UiErrorCategory::Unknown
    }
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            category: categorize(&message),
            context,
            message,
        }
    }

    /// Maps a controller failure to what the terminal should print. `None`
    /// means the failure is already visible (agent log line) or is a
    /// cancellation that is deliberately silent.
    pub fn from_client_error(context: UiErrorContext, err: &ClientError) -> Option<Self> {
        let raw = err.to_string();
        let message = match err {
            ClientError::LoginCancelled | ClientError::AgentInvocationFailed(_) => return None,
            ClientError::LoginExchangeFailed(message) => classify_login_failure(message),
            ClientError::OAuthProvider(message) => format!("Google sign-in failed: {message}"),
            ClientError::RunInProgress => {
                "An agent run is already in progress; wait for it to finish.".to_string()
            }
            ClientError::RunCancelled => "Agent run cancelled.".to_string(),
            ClientError::MalformedPersistedSession(_) | ClientError::Storage { .. } => raw.clone(),
        };
        Some(Self {
            category: categorize(&raw),
            context,
            message,
        })
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == UiErrorCategory::Auth
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
