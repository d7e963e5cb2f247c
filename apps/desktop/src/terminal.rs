//! Terminal rendering of the session projection and the agent log.

use std::{
    future::Future,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};

use client_core::{ClientEvent, SessionView};
use shared::domain::SessionPhase;
use tokio::sync::broadcast::{self, error::RecvError};

struct TerminalInner {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

/// Cloneable handle over the output streams; every write takes the lock
/// briefly so the shell and the OAuth prompt can share it.
#[derive(Clone)]
pub struct Terminal {
    inner: Arc<Mutex<TerminalInner>>,
}

impl Terminal {
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn new(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TerminalInner { out, err })),
        }
    }

    pub fn line(&self, text: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(inner.out, "{text}");
        let _ = inner.out.flush();
    }

    pub fn prompt(&self, text: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = write!(inner.out, "{text}");
        let _ = inner.out.flush();
    }

    pub fn error(&self, text: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(inner.err, "{text}");
        let _ = inner.err.flush();
    }

    pub fn render_event(&self, event: &ClientEvent) {
        // Errors are reported by the command that caused them.
        if let ClientEvent::LogAppended(line) = event {
            self.line(&render_log_line(line));
        }
    }
}

/// Progress lines already carry their `> ` marker; report lines are indented
/// under them.
pub fn render_log_line(line: &str) -> String {
    if line.starts_with("> ") {
        line.to_string()
    } else {
        format!("  {line}")
    }
}

pub fn status_lines(view: &SessionView) -> Vec<String> {
    let mut lines = Vec::new();
    match &view.user {
        Some(user) => match &user.name {
            Some(name) => lines.push(format!("Signed in as {name} <{}>", user.email)),
            None => lines.push(format!("Signed in as {}", user.email)),
        },
        None if view.phase == SessionPhase::Authenticating => {
            lines.push("Signing in...".to_string())
        }
        None => lines.push("Not signed in. Use `login` to connect Gmail.".to_string()),
    }
    if view.user.is_some() {
        let mut agent = format!("Agent: {}", view.run_status.label());
        if view.loading {
            agent.push_str(" (working...)");
        }
        lines.push(agent);
    }
    lines.extend(view.log.iter().map(|line| render_log_line(line)));
    lines
}

/// Drives `fut` to completion while rendering controller events as they
/// arrive, then flushes whatever is still queued.
pub async fn with_live_log<F: Future>(
    terminal: &Terminal,
    events: &mut broadcast::Receiver<ClientEvent>,
    fut: F,
) -> F::Output {
    tokio::pin!(fut);
    let mut events_open = true;
    let output = loop {
        tokio::select! {
            biased;
            event = events.recv(), if events_open => match event {
                Ok(event) => terminal.render_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "terminal fell behind controller events");
                }
                Err(RecvError::Closed) => events_open = false,
            },
            output = &mut fut => break output,
        }
    };

    while let Ok(event) = events.try_recv() {
        terminal.render_event(&event);
    }
    output
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/terminal_tests.rs"]
mod tests;
