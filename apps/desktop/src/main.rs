use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpAgentBackend, SessionController};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod events;
mod shell;
mod terminal;

use config::{load_settings, DEFAULT_CONFIG_FILE};
use console::{ConsoleInput, ConsoleOAuthProvider};
use events::{UiError, UiErrorContext};
use shell::{execute, run_shell, Outcome, ShellCommand};
use terminal::Terminal;

#[derive(Parser, Debug)]
#[command(name = "inbox-zero", about = "Connect Gmail and run the Inbox Zero agent")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with Google; prompts for the authorization code unless given.
    Login {
        #[arg(long)]
        code: Option<String>,
    },
    /// Run the agent once and print its report.
    Run,
    /// Forget the saved session.
    Logout,
    /// Show the restored session.
    Status,
    /// Interactive shell (default).
    Shell,
}

impl Command {
    fn into_shell_command(self) -> Option<ShellCommand> {
        match self {
            Self::Login { code } => Some(ShellCommand::Login { code }),
            Self::Run => Some(ShellCommand::Run),
            Self::Logout => Some(ShellCommand::Logout),
            Self::Status => Some(ShellCommand::Status),
            Self::Shell => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = load_settings(&args.config);
    if let Some(api_base) = args.api_base {
        settings.api_base = api_base;
    }
    if let Some(database_url) = args.database_url {
        settings.database_url = database_url;
    }

    let store = Storage::new(&settings.database_url).await.map_err(|err| {
        error!(
            database_url = %settings.database_url,
            %err,
            "failed to open session store; verify the directory is writable"
        );
        err
    })?;
    let backend = HttpAgentBackend::with_timeout(&settings.api_base, settings.request_timeout())
        .context("failed to configure agent backend client")?;
    info!(api_base = %backend.api_base(), "using agent backend");

    let terminal = Terminal::stdio();
    let input = ConsoleInput::stdin();
    let oauth = ConsoleOAuthProvider::new(
        settings.google_client_id.clone(),
        settings.oauth_redirect_uri.clone(),
        input.clone(),
        terminal.clone(),
    );
    let controller = SessionController::new_with_dependencies(
        Arc::new(backend),
        Arc::new(store),
        Arc::new(oauth),
        settings.restore_policy,
    );

    if let Err(err) = controller.restore_session().await {
        let ui_error = UiError::from_message(UiErrorContext::Startup, err.to_string());
        terminal.error(&format!("warning: {}", ui_error.message()));
    }

    match args.command.and_then(Command::into_shell_command) {
        Some(command) => match execute(controller.as_ref(), &terminal, command).await {
            Outcome::Failed => Ok(ExitCode::FAILURE),
            Outcome::Ok | Outcome::Exit => Ok(ExitCode::SUCCESS),
        },
        None => {
            run_shell(controller.as_ref(), &terminal, &input).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
