//! fieldsync CLI - operate the offline-first sync engine from a terminal
//!
//! Records time entries and notes locally, runs sync passes for an external
//! scheduler, and inspects the sync backlog.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::commands::common::Context;
use crate::commands::config::{run_config_init, run_config_show, ConfigInitArgs};
use crate::commands::connection::{run_detect, run_monitor};
use crate::commands::entries::{run_add_entry, run_edit_entry, AddEntryArgs, EditEntryArgs};
use crate::commands::notes::{run_add_note, AddNoteArgs};
use crate::commands::projects::run_projects;
use crate::commands::records::{run_failed, run_pending, run_retry};
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "fieldsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(cli.db_path, cli.config)?;

    match cli.command {
        Commands::Sync {
            upload_only,
            download_only,
            json,
        } => run_sync(&ctx, cli::sync_kind(upload_only, download_only), json).await?,
        Commands::Status { json } => run_status(&ctx, json).await?,
        Commands::Pending { kind, json } => run_pending(&ctx, kind, json).await?,
        Commands::Failed { kind, json } => run_failed(&ctx, kind, json).await?,
        Commands::Retry { kind, id } => run_retry(&ctx, kind, &id).await?,
        Commands::Detect => run_detect(&ctx).await?,
        Commands::Monitor { interval } => run_monitor(&ctx, interval).await?,
        Commands::AddEntry {
            project,
            work_type,
            hours,
            date,
            from,
            to,
            description,
        } => {
            run_add_entry(
                &ctx,
                AddEntryArgs {
                    project,
                    work_type,
                    hours,
                    date,
                    from,
                    to,
                    description,
                },
            )
            .await?;
        }
        Commands::EditEntry {
            id,
            project,
            work_type,
            hours,
            date,
            from,
            to,
            description,
        } => {
            run_edit_entry(
                &ctx,
                &id,
                EditEntryArgs {
                    project,
                    work_type,
                    hours,
                    date,
                    from,
                    to,
                    description,
                },
            )
            .await?;
        }
        Commands::AddNote {
            title,
            content,
            project,
            note_type,
            file,
            mime_type,
            important,
            tags,
        } => {
            run_add_note(
                &ctx,
                AddNoteArgs {
                    title,
                    content,
                    project,
                    note_type,
                    file,
                    mime_type,
                    important,
                    tags,
                },
            )
            .await?;
        }
        Commands::Projects { work_types, json } => run_projects(&ctx, work_types, json).await?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => run_config_show(&ctx)?,
            ConfigCommands::Init {
                server_url,
                download_window_days,
                media_max_attempts,
                monitor_interval_secs,
            } => run_config_init(
                &ctx,
                ConfigInitArgs {
                    server_url,
                    download_window_days,
                    media_max_attempts,
                    monitor_interval_secs,
                },
            )?,
        },
    }

    Ok(())
}
