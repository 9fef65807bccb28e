use fieldsync_core::models::RecordSummary;
use fieldsync_core::store::LocalStore;
use fieldsync_core::RecordKind;
use serde::Serialize;

use crate::cli::{selected_kinds, KindArg};
use crate::commands::common::{open_database, parse_local_id, Context};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct PendingItem {
    kind: &'static str,
    pending: usize,
}

pub async fn run_pending(
    ctx: &Context,
    kind: Option<KindArg>,
    as_json: bool,
) -> Result<(), CliError> {
    let db = open_database(&ctx.db_path).await?;

    let mut items = Vec::new();
    for kind in selected_kinds(kind) {
        items.push(PendingItem {
            kind: kind.as_str(),
            pending: db.pending_count(Some(kind)).await?,
        });
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!("{}: {} pending", item.kind, item.pending);
        }
    }
    Ok(())
}

pub async fn run_failed(
    ctx: &Context,
    kind: Option<KindArg>,
    as_json: bool,
) -> Result<(), CliError> {
    let db = open_database(&ctx.db_path).await?;

    let mut failed = Vec::new();
    for kind in selected_kinds(kind) {
        failed.extend(db.list_failed(kind).await?);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&failed)?);
        return Ok(());
    }

    if failed.is_empty() {
        println!("No failed records.");
        return Ok(());
    }

    for summary in &failed {
        println!("{}", format_failed_line(summary));
    }
    println!("Run `fieldsync retry <kind> <id>` to queue a record again.");
    Ok(())
}

pub fn format_failed_line(summary: &RecordSummary) -> String {
    let mut line = format!(
        "{} {} ({} attempts) {}",
        summary.kind, summary.local_id, summary.attempts, summary.label
    );
    if let Some(error) = &summary.last_error {
        line.push_str("\n    last error: ");
        line.push_str(error);
    }
    line
}

pub async fn run_retry(ctx: &Context, kind: KindArg, id: &str) -> Result<(), CliError> {
    let kind = RecordKind::from(kind);
    let local_id = parse_local_id(id)?;
    let db = open_database(&ctx.db_path).await?;

    if !db.reset_for_retry(kind, &local_id).await? {
        return Err(CliError::NothingToRetry {
            kind: kind.to_string(),
            id: local_id.to_string(),
        });
    }

    println!("Queued {kind} {local_id} for the next sync");
    Ok(())
}
