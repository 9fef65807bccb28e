use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fieldsync_core::{RecordKind, SyncKind};

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Offline-first time tracking sync from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the engine config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a sync pass against the server
    Sync {
        /// Only send local changes
        #[arg(long, conflicts_with = "download_only")]
        upload_only: bool,
        /// Only fetch server data
        #[arg(long)]
        download_only: bool,
        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sync backlog and last sync times
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count records waiting for upload
    Pending {
        /// Restrict to one record kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records that ran out of upload attempts
    Failed {
        /// Restrict to one record kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-queue a failed record with a fresh attempt budget
    Retry {
        /// Record kind
        #[arg(value_enum)]
        kind: KindArg,
        /// Local record id
        id: String,
    },
    /// Probe the server and update the connection mode
    Detect,
    /// Watch the connection and sync on reconnection until Ctrl-C
    Monitor {
        /// Seconds between probes (config value when omitted)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Record a time entry locally
    AddEntry {
        /// Project id
        #[arg(long)]
        project: i64,
        /// Work type id
        #[arg(long)]
        work_type: i64,
        /// Hours worked
        #[arg(long)]
        hours: f64,
        /// Report date, YYYY-MM-DD (today when omitted)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        /// Start time, HH:MM
        #[arg(long, value_name = "TIME")]
        from: Option<String>,
        /// End time, HH:MM
        #[arg(long, value_name = "TIME")]
        to: Option<String>,
        /// Free-text description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Change a recorded time entry; it is uploaded again on the next sync
    EditEntry {
        /// Local entry id
        id: String,
        /// Project id
        #[arg(long)]
        project: Option<i64>,
        /// Work type id
        #[arg(long)]
        work_type: Option<i64>,
        /// Hours worked
        #[arg(long)]
        hours: Option<f64>,
        /// Report date, YYYY-MM-DD
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        /// Start time, HH:MM (empty to clear)
        #[arg(long, value_name = "TIME")]
        from: Option<String>,
        /// End time, HH:MM (empty to clear)
        #[arg(long, value_name = "TIME")]
        to: Option<String>,
        /// Free-text description (empty to clear)
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Record a project note locally
    AddNote {
        /// Note title
        #[arg(long)]
        title: String,
        /// Note body
        #[arg(long, default_value = "")]
        content: String,
        /// Project id
        #[arg(long)]
        project: Option<i64>,
        /// Note type (text, audio, photo, video)
        #[arg(long = "type", default_value = "text")]
        note_type: String,
        /// Media file to attach
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
        /// MIME type of the attached file (guessed when omitted)
        #[arg(long, value_name = "TYPE")]
        mime_type: Option<String>,
        /// Flag the note as important
        #[arg(long)]
        important: bool,
        /// Tag, may be repeated
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// List downloaded projects
    Projects {
        /// List work types instead
        #[arg(long)]
        work_types: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or write the engine config
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Entry,
    Note,
}

impl From<KindArg> for RecordKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Entry => Self::TimeEntry,
            KindArg::Note => Self::ProjectNote,
        }
    }
}

/// Record kinds selected by an optional `--kind`
pub fn selected_kinds(kind: Option<KindArg>) -> Vec<RecordKind> {
    kind.map_or_else(|| RecordKind::USER_OWNED.to_vec(), |kind| vec![kind.into()])
}

pub const fn sync_kind(upload_only: bool, download_only: bool) -> SyncKind {
    if upload_only {
        SyncKind::UploadOnly
    } else if download_only {
        SyncKind::DownloadOnly
    } else {
        SyncKind::Full
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective config
    Show,
    /// Create or update the config file
    Init {
        /// Base URL of the time-tracking API
        #[arg(long, value_name = "URL")]
        server_url: Option<String>,
        /// Days of time entries fetched per download
        #[arg(long, value_name = "DAYS")]
        download_window_days: Option<u32>,
        /// Upload attempts before a media note is parked
        #[arg(long, value_name = "N")]
        media_max_attempts: Option<u32>,
        /// Seconds between monitoring probes
        #[arg(long, value_name = "SECS")]
        monitor_interval_secs: Option<u64>,
    },
}
