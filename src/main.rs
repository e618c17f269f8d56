// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::warn;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    // Ctrl-C cancels the running refresh or acquisition at its next suspension point
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "knxkit", &mut std::io::stdout());
            Ok(())
        }
        Commands::Keygen {
            private_key,
            public_key,
            key_id,
            force,
        } => commands::cmd_keygen(&private_key, &public_key, key_id, force),
        command => {
            let session = Session::load(cli.config.as_deref(), cli.storage)?;
            match command {
                Commands::Refresh { prereleases } => {
                    commands::cmd_refresh(&session, prereleases, &cancel).await
                }
                Commands::Repos => commands::cmd_repos(&session),
                Commands::Releases { repository } => commands::cmd_releases(&session, &repository),
                Commands::Acquire {
                    repository,
                    release,
                } => commands::cmd_acquire(&session, &repository, &release, &cancel).await,
                Commands::Local => commands::cmd_local(&session),
                Commands::Remove {
                    repository,
                    release,
                } => commands::cmd_remove(&session, &repository, &release),
                Commands::Export {
                    repository,
                    release,
                    product,
                    output,
                } => commands::cmd_export(&session, &repository, &release, &product, output),
                Commands::Completions { .. } | Commands::Keygen { .. } => Ok(()),
            }
        }
    }
}
