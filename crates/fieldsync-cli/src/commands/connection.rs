use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use fieldsync_core::{ConnectionMode, ModeListener};

use crate::commands::common::{open_manager, Context};
use crate::error::CliError;

pub async fn run_detect(ctx: &Context) -> Result<(), CliError> {
    let (_services, manager) = open_manager(ctx).await?;

    let detection = manager.detect_connection_mode().await;
    println!(
        "{}: {}",
        if detection.online { "Online" } else { "Offline" },
        detection.message
    );

    if let Some(auto_sync) = detection.auto_sync {
        match auto_sync.wait().await {
            Ok(result) => println!("Automatic sync completed ({})", result.summary()),
            Err(error) => println!("Automatic sync failed: {error}"),
        }
    }

    println!("{}", manager.status_message().await?);
    Ok(())
}

/// Prints transitions for an operator watching the terminal
struct ConsoleListener;

impl ModeListener for ConsoleListener {
    fn on_mode_changed(&self, old: ConnectionMode, new: ConnectionMode, reason: &str) {
        println!("[{}] {old} -> {new} ({reason})", Local::now().format("%H:%M:%S"));
    }

    fn on_sync_started(&self) {
        println!("[{}] automatic sync started", Local::now().format("%H:%M:%S"));
    }

    fn on_sync_completed(&self, synced: usize, failed: usize) {
        println!(
            "[{}] automatic sync finished: {synced} synced, {failed} failed",
            Local::now().format("%H:%M:%S")
        );
    }

    fn on_sync_error(&self, message: &str) {
        println!(
            "[{}] automatic sync failed: {message}",
            Local::now().format("%H:%M:%S")
        );
    }
}

pub async fn run_monitor(ctx: &Context, interval: Option<u64>) -> Result<(), CliError> {
    let (_services, manager) = open_manager(ctx).await?;
    manager.add_mode_listener(Arc::new(ConsoleListener));

    let interval = interval.map_or_else(|| ctx.config.monitor_interval(), Duration::from_secs);
    manager.start_monitoring(interval);
    println!(
        "Monitoring {} every {}s (Ctrl-C to stop)",
        ctx.server_url()?,
        interval.as_secs().max(1)
    );

    tokio::signal::ctrl_c().await?;
    manager.stop_monitoring();
    println!("Monitoring stopped ({})", manager.get_current_mode());
    Ok(())
}
