//! Line input shared by the shell and the OAuth prompt, and the console OAuth
//! provider that uses it.

use std::{io, sync::Arc};

use async_trait::async_trait;
use client_core::{
    oauth::{google_authorization_url, parse_authorization_response},
    AuthCodeRequest, OAuthError, OAuthProvider,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader, Lines},
    sync::Mutex,
};

use crate::terminal::Terminal;

type LineSource = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

#[derive(Clone)]
pub struct ConsoleInput {
    lines: Arc<Mutex<LineSource>>,
}

impl ConsoleInput {
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            lines: Arc::new(Mutex::new(BufReader::new(reader).lines())),
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    pub async fn read_line(&self) -> io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }
}

pub struct ConsoleOAuthProvider {
    client_id: Option<String>,
    redirect_uri: String,
    input: ConsoleInput,
    terminal: Terminal,
}

impl ConsoleOAuthProvider {
    pub fn new(
        client_id: Option<String>,
        redirect_uri: impl Into<String>,
        input: ConsoleInput,
        terminal: Terminal,
    ) -> Self {
        Self {
            client_id,
            redirect_uri: redirect_uri.into(),
            input,
            terminal,
        }
    }
}

#[async_trait]
impl OAuthProvider for ConsoleOAuthProvider {
    async fn request_code(&self, request: &AuthCodeRequest) -> Result<String, OAuthError> {
        let client_id = self.client_id.as_deref().unwrap_or_default();
        let url = google_authorization_url(client_id, &self.redirect_uri, request)?;

        self.terminal
            .line("Open this URL in a browser and approve Gmail access:");
        self.terminal.line(&format!("  {url}"));
        self.terminal
            .prompt("Paste the authorization code or redirect URL (empty to cancel): ");

        let line = self
            .input
            .read_line()
            .await
            .map_err(|err| OAuthError::Provider(format!("failed to read authorization code: {err}")))?;
        match line {
            Some(line) => parse_authorization_response(&line),
            None => Err(OAuthError::Cancelled),
        }
    }
}
