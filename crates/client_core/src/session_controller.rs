//! Session & agent controller.
//!
//! Owns the signed-in user and the current agent run. The presentation layer
//! only sees [`SessionView`] snapshots and [`ClientEvent`]s, and drives the
//! controller through [`SessionHandle`].

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use shared::domain::{AgentRunStatus, SessionPhase, User, PERSISTED_USER_KEY};
use storage::KeyValueStore;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    oauth::{AuthCodeRequest, MissingOAuthProvider, OAuthError, OAuthProvider},
    AgentBackend,
};

pub const RUN_STARTED_LINE: &str = "> Initializing Inbox Zero agent...";
pub const RUN_COMPLETED_LINE: &str = "> Agent finished. Report:";

pub fn run_failed_line(reason: &str) -> String {
    format!("> Agent failed: {reason}")
}

/// Whether a persisted user is trusted on startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestorePolicy {
    /// Persisted sessions never expire on the client.
    #[default]
    Trust,
    /// Persisted sessions older than the duration are discarded.
    MaxAge(Duration),
    /// Always start signed out.
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub user: Option<User>,
    pub run_status: AgentRunStatus,
    pub log: Vec<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReport {
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionChanged(SessionView),
    LogAppended(String),
    Error(String),
}

/// Intents the presentation layer may issue.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn restore_session(&self) -> Result<Option<User>, ClientError>;
    async fn begin_login(&self) -> Result<User, ClientError>;
    async fn complete_login(&self, code: &str) -> Result<User, ClientError>;
    async fn run_agent(&self) -> Result<Option<AgentReport>, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
    fn view(&self) -> SessionView;
    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent>;
}

#[derive(Default)]
struct ControllerState {
    user: Option<User>,
    logins_in_flight: u32,
    run_status: AgentRunStatus,
    log: Vec<String>,
    in_flight: u32,
    run_generation: u64,
    session_epoch: u64,
    active_run: Option<CancellationToken>,
}

impl ControllerState {
    fn view(&self) -> SessionView {
        let phase = if self.logins_in_flight > 0 {
            SessionPhase::Authenticating
        } else if self.user.is_some() {
            SessionPhase::Authenticated(self.run_status)
        } else {
            SessionPhase::Unauthenticated
        };
        SessionView {
            phase,
            user: self.user.clone(),
            run_status: self.run_status,
            log: self.log.clone(),
            loading: self.in_flight > 0,
        }
    }

    fn cancel_active_run(&mut self) -> bool {
        self.run_generation += 1;
        match self.active_run.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

pub struct SessionController {
    backend: Arc<dyn AgentBackend>,
    store: Arc<dyn KeyValueStore>,
    oauth: Arc<dyn OAuthProvider>,
    restore_policy: RestorePolicy,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<ClientEvent>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn AgentBackend>, store: Arc<dyn KeyValueStore>) -> Arc<Self> {
        Self::new_with_dependencies(
            backend,
            store,
            Arc::new(MissingOAuthProvider),
            RestorePolicy::default(),
        )
    }

    pub fn new_with_dependencies(
        backend: Arc<dyn AgentBackend>,
        store: Arc<dyn KeyValueStore>,
        oauth: Arc<dyn OAuthProvider>,
        restore_policy: RestorePolicy,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            store,
            oauth,
            restore_policy,
            state: Mutex::new(ControllerState::default()),
            events,
        })
    }

    pub fn restore_policy(&self) -> RestorePolicy {
        self.restore_policy
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn publish_view(&self) {
        let view = self.lock_state().view();
        self.emit(ClientEvent::SessionChanged(view));
    }

    async fn discard_persisted_user(&self) {
        if let Err(err) = self.store.delete(PERSISTED_USER_KEY).await {
            warn!("failed to remove persisted session: {err:#}");
        }
    }

    pub async fn restore_session(&self) -> Result<Option<User>, ClientError> {
        if self.restore_policy == RestorePolicy::Never {
            debug!("session restore disabled by policy");
            return Ok(None);
        }

        let entry = self
            .store
            .get(PERSISTED_USER_KEY)
            .await
            .map_err(ClientError::storage)?;
        let Some(entry) = entry else {
            debug!("no persisted session");
            return Ok(None);
        };

        let user = match parse_persisted_user(&entry.value) {
            Ok(user) => user,
            Err(err) => {
                warn!("ignoring persisted session: {err}");
                self.discard_persisted_user().await;
                return Ok(None);
            }
        };

        if let RestorePolicy::MaxAge(max_age) = self.restore_policy {
            let age = Utc::now().signed_duration_since(entry.updated_at);
            let expired = match chrono::Duration::from_std(max_age) {
                Ok(max_age) => age > max_age,
                Err(_) => false,
            };
            if expired {
                info!(
                    email = %user.email,
                    age_secs = age.num_seconds(),
                    "persisted session is older than the configured max age; discarding"
                );
                self.discard_persisted_user().await;
                return Ok(None);
            }
        }

        {
            let mut state = self.lock_state();
            state.cancel_active_run();
            state.user = Some(user.clone());
            state.run_status = AgentRunStatus::Idle;
            state.log.clear();
        }
        info!(email = %user.email, "restored persisted session");
        self.publish_view();
        Ok(Some(user))
    }

    pub async fn begin_login(&self) -> Result<User, ClientError> {
        let request = AuthCodeRequest::gmail();
        let code = match self.oauth.request_code(&request).await {
            Ok(code) => code,
            Err(OAuthError::Cancelled) => {
                debug!("oauth login cancelled by user");
                return Err(ClientError::LoginCancelled);
            }
            Err(OAuthError::Provider(message)) => {
                warn!("oauth provider error: {message}");
                return Err(ClientError::OAuthProvider(message));
            }
        };

        self.complete_login(&code).await
    }

    pub async fn complete_login(&self, code: &str) -> Result<User, ClientError> {
        let epoch = {
            let mut state = self.lock_state();
            state.in_flight += 1;
            state.logins_in_flight += 1;
            state.session_epoch
        };
        let _login = LoginGuard { controller: self };
        self.publish_view();

        let user = match self.backend.exchange_auth_code(code).await {
            Ok(user) => user,
            Err(err) => {
                let message = format!("{err:#}");
                warn!("backend login failed: {message}");
                self.emit(ClientEvent::Error(format!("Login failed: {message}")));
                return Err(ClientError::LoginExchangeFailed(message));
            }
        };

        if self.lock_state().session_epoch != epoch {
            info!(email = %user.email, "discarding login that completed after logout");
            return Err(ClientError::LoginCancelled);
        }

        let persisted = match serde_json::to_string(&user) {
            Ok(serialized) => match self.store.put(PERSISTED_USER_KEY, &serialized).await {
                Ok(()) => true,
                Err(err) => {
                    warn!("signed in but failed to persist session: {err:#}");
                    self.emit(ClientEvent::Error(format!(
                        "Signed in, but the session could not be saved locally: {err:#}"
                    )));
                    false
                }
            },
            Err(err) => {
                warn!("failed to serialize user for persistence: {err}");
                false
            }
        };

        // A logout may have landed while the record was being written.
        let superseded = {
            let mut state = self.lock_state();
            if state.session_epoch != epoch {
                Some(state.user.is_none())
            } else {
                state.cancel_active_run();
                state.user = Some(user.clone());
                state.run_status = AgentRunStatus::Idle;
                state.log.clear();
                None
            }
        };
        if let Some(signed_out) = superseded {
            if persisted && signed_out {
                self.discard_persisted_user().await;
            }
            info!(email = %user.email, "discarding login that completed after logout");
            return Err(ClientError::LoginCancelled);
        }

        info!(email = %user.email, "signed in");
        Ok(user)
    }

    pub async fn run_agent(&self) -> Result<Option<AgentReport>, ClientError> {
        let (email, generation, cancel) = {
            let mut state = self.lock_state();
            let Some(user) = state.user.as_ref() else {
                debug!("run requested without a signed-in user; ignoring");
                return Ok(None);
            };
            if state.run_status == AgentRunStatus::Running {
                return Err(ClientError::RunInProgress);
            }

            let email = user.email.clone();
            let cancel = CancellationToken::new();
            state.run_generation += 1;
            state.active_run = Some(cancel.clone());
            state.run_status = AgentRunStatus::Running;
            state.log = vec![RUN_STARTED_LINE.to_string()];
            state.in_flight += 1;
            (email, state.run_generation, cancel)
        };
        let _run = RunGuard {
            controller: self,
            generation,
        };
        info!(%email, generation, "agent run started");
        self.emit(ClientEvent::LogAppended(RUN_STARTED_LINE.to_string()));
        self.publish_view();

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                info!(%email, generation, "agent run cancelled");
                return Err(ClientError::RunCancelled);
            }
            outcome = self.backend.run_agent(&email) => outcome,
        };

        match outcome {
            Ok(agent_response) => {
                let lines: Vec<String> = agent_response.lines().map(str::to_string).collect();
                let mut appended = Vec::with_capacity(lines.len() + 1);
                appended.push(RUN_COMPLETED_LINE.to_string());
                appended.extend(lines.iter().cloned());

                if !self.finish_run(generation, AgentRunStatus::Completed, &appended) {
                    return Err(ClientError::RunCancelled);
                }
                info!(%email, generation, lines = lines.len(), "agent run completed");
                Ok(Some(AgentReport { lines }))
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(%email, generation, "agent run failed: {message}");
                let line = run_failed_line(&message);
                if !self.finish_run(generation, AgentRunStatus::Failed, &[line]) {
                    return Err(ClientError::RunCancelled);
                }
                Err(ClientError::AgentInvocationFailed(message))
            }
        }
    }

    /// Applies the terminal state of a run unless the run has been superseded.
    fn finish_run(&self, generation: u64, status: AgentRunStatus, lines: &[String]) -> bool {
        {
            let mut state = self.lock_state();
            if state.run_generation != generation {
                return false;
            }
            state.log.extend(lines.iter().cloned());
            state.run_status = status;
            state.active_run = None;
        }
        for line in lines {
            self.emit(ClientEvent::LogAppended(line.clone()));
        }
        true
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let (email, cancelled_run) = {
            let mut state = self.lock_state();
            let cancelled_run = state.cancel_active_run();
            state.session_epoch += 1;
            state.run_status = AgentRunStatus::Idle;
            state.log.clear();
            (state.user.take().map(|user| user.email), cancelled_run)
        };
        if cancelled_run {
            info!("cancelled in-flight agent run on logout");
        }

        let removed = self.store.delete(PERSISTED_USER_KEY).await;
        self.publish_view();
        removed.map_err(ClientError::storage)?;

        match email {
            Some(email) => info!(%email, "signed out"),
            None => debug!("logout without a signed-in user"),
        }
        Ok(())
    }

    pub fn view(&self) -> SessionView {
        self.lock_state().view()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl SessionHandle for SessionController {
    async fn restore_session(&self) -> Result<Option<User>, ClientError> {
        SessionController::restore_session(self).await
    }

    async fn begin_login(&self) -> Result<User, ClientError> {
        SessionController::begin_login(self).await
    }

    async fn complete_login(&self, code: &str) -> Result<User, ClientError> {
        SessionController::complete_login(self, code).await
    }

    async fn run_agent(&self) -> Result<Option<AgentReport>, ClientError> {
        SessionController::run_agent(self).await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        SessionController::logout(self).await
    }

    fn view(&self) -> SessionView {
        SessionController::view(self)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        SessionController::subscribe_events(self)
    }
}

/// Releases the loading and authenticating counters however the login
/// future ends.
struct LoginGuard<'a> {
    controller: &'a SessionController,
}

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.controller.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.logins_in_flight = state.logins_in_flight.saturating_sub(1);
        }
        self.controller.publish_view();
    }
}

/// Releases the loading flag for a run and marks the run failed if its future
/// was dropped before it reached a terminal state.
struct RunGuard<'a> {
    controller: &'a SessionController,
    generation: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let interrupted = {
            let mut state = self.controller.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);
            let interrupted = state.run_generation == self.generation
                && state.run_status == AgentRunStatus::Running;
            if interrupted {
                let line = run_failed_line("run interrupted before a response arrived");
                state.log.push(line.clone());
                state.run_status = AgentRunStatus::Failed;
                state.active_run = None;
                Some(line)
            } else {
                None
            }
        };
        if let Some(line) = interrupted {
            self.controller.emit(ClientEvent::LogAppended(line));
        }
        self.controller.publish_view();
    }
}

fn parse_persisted_user(raw: &str) -> Result<User, ClientError> {
    let user: User = serde_json::from_str(raw)
        .map_err(|err| ClientError::MalformedPersistedSession(err.to_string()))?;
    if user.email.trim().is_empty() {
        return Err(ClientError::MalformedPersistedSession(
            "persisted user has no email".to_string(),
        ));
    }
    Ok(user)
}

#[cfg(test)]
#[path = "tests/session_controller_tests.rs"]
mod tests;
