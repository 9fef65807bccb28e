use fieldsync_core::connection::{format_elapsed, ConnectionMode};
use fieldsync_core::store::SyncStateStore;
use fieldsync_core::sync::SyncStatusSummary;
use fieldsync_core::util::unix_timestamp_millis_now;
use serde::Serialize;

use crate::commands::common::{format_timestamp, open_database, Context};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    server_url: Option<&'a str>,
    connection_mode: ConnectionMode,
    last_online_at: Option<i64>,
    #[serde(flatten)]
    sync: SyncStatusSummary,
}

pub async fn run_status(ctx: &Context, as_json: bool) -> Result<(), CliError> {
    let db = open_database(&ctx.db_path).await?;
    let summary = SyncStatusSummary::collect(&db, &db, None).await?;
    let state = db.load_state().await?;

    if as_json {
        let report = StatusReport {
            server_url: ctx.config.server_url.as_deref(),
            connection_mode: state.connection_mode,
            last_online_at: state.last_online_at,
            sync: summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let since_online = state.last_online_at.map(|at| {
        let elapsed = unix_timestamp_millis_now().saturating_sub(at).max(0);
        std::time::Duration::from_millis(u64::try_from(elapsed).unwrap_or_default())
    });

    println!(
        "Server: {}",
        ctx.config.server_url.as_deref().unwrap_or("not configured")
    );
    println!(
        "Connection: {} ({})",
        state.connection_mode,
        state.connection_mode.message()
    );
    println!(
        "Last online: {} ({})",
        format_timestamp(state.last_online_at),
        format_elapsed(since_online)
    );
    println!("{summary}");
    Ok(())
}
