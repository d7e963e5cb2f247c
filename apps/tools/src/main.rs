use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use shared::domain::{User, PERSISTED_USER_KEY};
use storage::{KeyValueStore, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value_t = storage::default_database_url())]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the persisted user record and how old it is.
    ShowSession,
    /// Delete the persisted user record.
    ClearSession,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    storage
        .health_check()
        .await
        .with_context(|| format!("session store at {} is not usable", cli.database_url))?;

    match cli.command {
        Command::ShowSession => match storage.get(PERSISTED_USER_KEY).await? {
            Some(entry) => {
                let age = Utc::now().signed_duration_since(entry.updated_at);
                println!("{}", entry.value);
                println!(
                    "saved {} ({}s ago)",
                    entry.updated_at.to_rfc3339(),
                    age.num_seconds().max(0)
                );
                match serde_json::from_str::<User>(&entry.value)
                    .context("persisted session is not a valid user record")
                {
                    Ok(user) => println!("user: {}", user.display_name()),
                    Err(err) => eprintln!("warning: {err:#}"),
                }
            }
            None => println!("no persisted session in {}", cli.database_url),
        },
        Command::ClearSession => {
            if storage.delete(PERSISTED_USER_KEY).await? {
                println!("cleared persisted session");
            } else {
                println!("no persisted session to clear");
            }
        }
    }

    storage.close().await;
    Ok(())
}
