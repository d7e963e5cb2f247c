//! Intent dispatch for one-shot subcommands and the interactive shell.

use std::str::FromStr;

use anyhow::Result;
use client_core::{SessionHandle, SessionView};

use crate::{
    console::ConsoleInput,
    events::{UiError, UiErrorContext},
    terminal::{status_lines, with_live_log, Terminal},
};

const PROMPT: &str = "inbox-zero> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Login { code: Option<String> },
    Run,
    Logout,
    Status,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".to_string());
        };
        let rest: Vec<&str> = parts.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "login" | "connect" => match rest.as_slice() {
                [] => Self::Login { code: None },
                [code] => Self::Login {
                    code: Some((*code).to_string()),
                },
                _ => return Err("usage: login [CODE]".to_string()),
            },
            "run" | "run-agent" => Self::Run,
            "logout" => Self::Logout,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{other}'; type `help`")),
        };

        if !rest.is_empty() && !matches!(command, Self::Login { .. }) {
            return Err(format!("`{verb}` takes no arguments"));
        }
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failed,
    Exit,
}

pub async fn execute(
    handle: &dyn SessionHandle,
    terminal: &Terminal,
    command: ShellCommand,
) -> Outcome {
    match command {
        ShellCommand::Login { code } => {
            let result = match code {
                Some(code) => handle.complete_login(&code).await,
                None => handle.begin_login().await,
            };
            match result {
                Ok(user) => {
                    terminal.line(&format!("Welcome, {}", user.display_name()));
                    terminal.line("Ready to process your inbox. Type `run` to start the agent.");
                    Outcome::Ok
                }
                Err(err) if err.is_cancellation() => {
                    tracing::debug!("login cancelled");
                    Outcome::Ok
                }
                Err(err) => report(terminal, UiErrorContext::Login, &err),
            }
        }
        ShellCommand::Run => {
            let mut events = handle.subscribe_events();
            match with_live_log(terminal, &mut events, handle.run_agent()).await {
                Ok(Some(_)) => Outcome::Ok,
                Ok(None) => {
                    terminal.line("Not signed in. Use `login` to connect Gmail first.");
                    Outcome::Failed
                }
                Err(err) => report(terminal, UiErrorContext::RunAgent, &err),
            }
        }
        ShellCommand::Logout => match handle.logout().await {
            Ok(()) => {
                terminal.line("Logged out.");
                Outcome::Ok
            }
            Err(err) => report(terminal, UiErrorContext::Logout, &err),
        },
        ShellCommand::Status => {
            print_status(terminal, &handle.view());
            Outcome::Ok
        }
        ShellCommand::Help => {
            for line in HELP {
                terminal.line(line);
            }
            Outcome::Ok
        }
        ShellCommand::Quit => Outcome::Exit,
    }
}

pub async fn run_shell(
    handle: &dyn SessionHandle,
    terminal: &Terminal,
    input: &ConsoleInput,
) -> Result<()> {
    terminal.line("Inbox Zero Agent");
    print_status(terminal, &handle.view());

    loop {
        terminal.prompt(PROMPT);
        let Some(line) = input.read_line().await? else {
            terminal.line("");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ShellCommand>() {
            Ok(command) => {
                if execute(handle, terminal, command).await == Outcome::Exit {
                    break;
                }
            }
            Err(message) => terminal.error(&message),
        }
    }
    Ok(())
}

fn print_status(terminal: &Terminal, view: &SessionView) {
    for line in status_lines(view) {
        terminal.line(&line);
    }
}

fn report(terminal: &Terminal, context: UiErrorContext, err: &client_core::ClientError) -> Outcome {
    let Some(ui_error) = UiError::from_client_error(context, err) else {
        return Outcome::Failed;
    };
    terminal.error(&format!(
        "error ({}): {}",
        ui_error.context().label(),
        ui_error.message()
    ));
    if ui_error.requires_reauth() {
        terminal.error("hint: sign in again with `login`.");
    }
    Outcome::Failed
}

const HELP: &[&str] = &[
    "Commands:",
    "  login [CODE]  connect Gmail (prompts for the Google authorization code)",
    "  run           run the Inbox Zero agent and show its report",
    "  status        show the signed-in user and the last agent log",
    "  logout        disconnect and forget the saved session",
    "  quit          leave the shell",
];

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
