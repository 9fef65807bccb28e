use fieldsync_core::{SyncEvent, SyncKind};

use crate::commands::common::{open_services, Context};
use crate::error::CliError;

pub async fn run_sync(ctx: &Context, kind: SyncKind, as_json: bool) -> Result<(), CliError> {
    let services = open_services(ctx).await?;

    let run = services.engine.start(kind).await;
    let result = run
        .wait_with(|event| {
            if as_json {
                return;
            }
            match event {
                SyncEvent::Started(phase) => println!("Starting {phase}"),
                SyncEvent::Progress {
                    message,
                    current,
                    total,
                } => println!("  [{current}/{total}] {message}"),
                SyncEvent::Completed(_) | SyncEvent::Failed(_) => {}
            }
        })
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Sync completed ({})", result.summary());
    for error in &result.errors {
        println!("  - {error}");
    }
    Ok(())
}
