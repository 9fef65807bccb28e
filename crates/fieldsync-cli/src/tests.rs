use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use fieldsync_core::models::{RemoteTimeEntry, SyncStatus, TimeEntry};
use fieldsync_core::store::LocalStore;
use fieldsync_core::{
    EngineConfig, LocalId, RecordKind, ServerId, SyncError, SyncKind, SyncResult,
};
use pretty_assertions::assert_eq;

use crate::cli::{selected_kinds, sync_kind, Cli, Commands, KindArg};
use crate::commands::common::{
    describe_upload, format_timestamp, open_database, parse_local_id, resolve_db_path, Context,
};
use crate::commands::config::{apply_init_args, normalize_server_url, ConfigInitArgs};
use crate::commands::entries::{
    apply_entry_edit, build_entry_payload, run_edit_entry, AddEntryArgs, EditEntryArgs,
};
use crate::commands::notes::{build_note, AddNoteArgs};
use crate::commands::records::{format_failed_line, run_retry};
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn entry_args(hours: f64) -> AddEntryArgs {
    AddEntryArgs {
        project: 3,
        work_type: 7,
        hours,
        date: None,
        from: None,
        to: None,
        description: None,
    }
}

fn note_args(title: &str) -> AddNoteArgs {
    AddNoteArgs {
        title: title.to_string(),
        content: String::new(),
        project: Some(3),
        note_type: "text".to_string(),
        file: None,
        mime_type: None,
        important: false,
        tags: Vec::new(),
    }
}

fn test_context(dir: &tempfile::TempDir) -> Context {
    Context {
        db_path: dir.path().join("fieldsync.db"),
        config_path: dir.path().join("config.json"),
        config: EngineConfig::default(),
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
}

#[test]
fn sync_command_parses_upload_only() {
    let cli = Cli::try_parse_from(["fieldsync", "sync", "--upload-only", "--json"]).unwrap();
    match cli.command {
        Commands::Sync {
            upload_only,
            download_only,
            json,
        } => {
            assert!(upload_only);
            assert!(!download_only);
            assert!(json);
        }
        _ => panic!("expected sync command"),
    }
}

#[test]
fn sync_command_rejects_conflicting_directions() {
    assert!(
        Cli::try_parse_from(["fieldsync", "sync", "--upload-only", "--download-only"]).is_err()
    );
}

#[test]
fn add_note_collects_repeated_tags() {
    let cli = Cli::try_parse_from([
        "fieldsync",
        "add-note",
        "--title",
        "Pump room",
        "--tag",
        "site",
        "--tag",
        "safety",
        "--type",
        "photo",
    ])
    .unwrap();
    match cli.command {
        Commands::AddNote {
            tags, note_type, ..
        } => {
            assert_eq!(tags, vec!["site".to_string(), "safety".to_string()]);
            assert_eq!(note_type, "photo");
        }
        _ => panic!("expected add-note command"),
    }
}

#[test]
fn global_db_path_is_accepted_after_subcommand() {
    let cli = Cli::try_parse_from(["fieldsync", "status", "--db-path", "/tmp/x.db"]).unwrap();
    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.db")));
}

#[test]
fn sync_kind_maps_flags() {
    assert_eq!(sync_kind(false, false), SyncKind::Full);
    assert_eq!(sync_kind(true, false), SyncKind::UploadOnly);
    assert_eq!(sync_kind(false, true), SyncKind::DownloadOnly);
}

#[test]
fn selected_kinds_defaults_to_user_owned() {
    assert_eq!(
        selected_kinds(None),
        vec![RecordKind::TimeEntry, RecordKind::ProjectNote]
    );
    assert_eq!(
        selected_kinds(Some(KindArg::Note)),
        vec![RecordKind::ProjectNote]
    );
}

#[test]
fn build_entry_payload_defaults_to_today() {
    let payload = build_entry_payload(entry_args(7.5), today()).unwrap();
    assert_eq!(payload.report_date, "2024-05-14");
    assert_eq!(payload.project_id, 3);
    assert_eq!(payload.work_type_id, 7);
    assert_eq!(payload.datetime_from, None);
}

#[test]
fn build_entry_payload_normalizes_times_and_description() {
    let mut args = entry_args(2.0);
    args.date = Some("2024-05-01".to_string());
    args.from = Some("8:00".to_string());
    args.to = Some(" 10:00 ".to_string());
    args.description = Some("   ".to_string());

    let payload = build_entry_payload(args, today()).unwrap();
    assert_eq!(payload.report_date, "2024-05-01");
    assert_eq!(payload.datetime_from.as_deref(), Some("08:00"));
    assert_eq!(payload.datetime_to.as_deref(), Some("10:00"));
    assert_eq!(payload.description, None);
}

#[test]
fn build_entry_payload_rejects_invalid_values() {
    assert!(matches!(
        build_entry_payload(entry_args(0.0), today()),
        Err(CliError::InvalidInput(_))
    ));
    assert!(matches!(
        build_entry_payload(entry_args(24.5), today()),
        Err(CliError::InvalidInput(_))
    ));

    let mut bad_date = entry_args(1.0);
    bad_date.date = Some("14/05/2024".to_string());
    assert!(build_entry_payload(bad_date, today()).is_err());

    let mut bad_time = entry_args(1.0);
    bad_time.from = Some("25:00".to_string());
    assert!(build_entry_payload(bad_time, today()).is_err());

    let mut bad_project = entry_args(1.0);
    bad_project.project = 0;
    assert!(build_entry_payload(bad_project, today()).is_err());
}

#[test]
fn build_note_normalizes_tags_and_type() {
    let mut args = note_args("  Pump room  ");
    args.note_type = "Photo".to_string();
    args.tags = vec![
        "Site".to_string(),
        " ".to_string(),
        "site".to_string(),
        "alpha".to_string(),
    ];

    let (payload, media) = build_note(args).unwrap();
    assert_eq!(payload.title, "Pump room");
    assert_eq!(payload.note_type, "photo");
    assert_eq!(payload.tags, vec!["alpha".to_string(), "site".to_string()]);
    assert!(media.is_none());
}

#[test]
fn build_note_rejects_empty_title_and_unknown_type() {
    assert!(build_note(note_args("   ")).is_err());

    let mut args = note_args("Title");
    args.note_type = "hologram".to_string();
    assert!(build_note(args).is_err());
}

#[test]
fn build_note_attaches_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.jpg");
    std::fs::write(&path, b"jpeg").unwrap();

    let mut args = note_args("With photo");
    args.file = Some(path.clone());
    let (_, media) = build_note(args).unwrap();
    let media = media.unwrap();
    assert_eq!(
        PathBuf::from(&media.local_file_path),
        path.canonicalize().unwrap()
    );
    assert!(!media.is_uploaded());

    let mut missing = note_args("Missing");
    missing.file = Some(dir.path().join("nope.jpg"));
    assert!(build_note(missing).is_err());
}

#[test]
fn normalize_server_url_requires_http_scheme() {
    assert_eq!(
        normalize_server_url(" https://ptms.example.com/api ").unwrap(),
        "https://ptms.example.com/api/"
    );
    assert!(normalize_server_url("ptms.example.com").is_err());
    assert!(normalize_server_url("  ").is_err());
}

#[test]
fn apply_init_args_rejects_zero_media_attempts() {
    let mut config = EngineConfig::default();
    let result = apply_init_args(
        &mut config,
        ConfigInitArgs {
            server_url: None,
            download_window_days: None,
            media_max_attempts: Some(0),
            monitor_interval_secs: None,
        },
    );
    assert!(matches!(result, Err(CliError::Config(_))));
    assert_eq!(config.media_max_attempts, 3);
}

#[test]
fn config_init_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir);

    crate::commands::config::run_config_init(
        &ctx,
        ConfigInitArgs {
            server_url: Some("http://localhost:8080".to_string()),
            download_window_days: Some(14),
            media_max_attempts: None,
            monitor_interval_secs: Some(0),
        },
    )
    .unwrap();

    let loaded = EngineConfig::load_from_path(&ctx.config_path).unwrap();
    assert_eq!(loaded.server_url.as_deref(), Some("http://localhost:8080/"));
    assert_eq!(loaded.download_window_days, 14);
    assert_eq!(loaded.media_max_attempts, 3);
    assert_eq!(loaded.monitor_interval_secs, 1);
}

#[test]
fn format_timestamp_handles_missing_value() {
    assert_eq!(format_timestamp(None), "never");
    assert_ne!(format_timestamp(Some(1_700_000_000_000)), "never");
}

#[test]
fn resolve_db_path_prefers_explicit_argument() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn parse_local_id_rejects_garbage() {
    let id = LocalId::new();
    assert_eq!(parse_local_id(&format!(" {id} ")).unwrap(), id);
    assert!(matches!(
        parse_local_id("not-an-id"),
        Err(CliError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn run_sync_requires_server_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir);

    let result = run_sync(&ctx, SyncKind::Full, false).await;
    assert!(matches!(result, Err(CliError::ServerNotConfigured)));
}

#[tokio::test]
async fn run_retry_requeues_only_unsynced_records() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir);

    let missing = LocalId::new().to_string();
    assert!(matches!(
        run_retry(&ctx, KindArg::Entry, &missing).await,
        Err(CliError::NothingToRetry { .. })
    ));

    let db = open_database(&ctx.db_path).await.unwrap();
    let entry = TimeEntry::new(build_entry_payload(entry_args(1.0), today()).unwrap());
    db.insert_time_entry(&entry).await.unwrap();

    run_retry(&ctx, KindArg::Entry, &entry.local_id.to_string())
        .await
        .unwrap();

    let stored = db.get_time_entry(&entry.local_id).await.unwrap().unwrap();
    assert_eq!(stored.sync.status, SyncStatus::Pending);
    assert_eq!(stored.sync.attempts, 0);
}

#[tokio::test]
async fn failed_line_includes_last_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir);
    let db = open_database(&ctx.db_path).await.unwrap();

    assert!(db.list_failed(RecordKind::TimeEntry).await.unwrap().is_empty());

    let summary = fieldsync_core::models::RecordSummary {
        kind: RecordKind::ProjectNote,
        local_id: LocalId::new(),
        server_id: None,
        status: SyncStatus::Failed,
        attempts: 3,
        last_error: Some("HTTP 500".to_string()),
        label: "Pump room".to_string(),
    };
    let line = format_failed_line(&summary);
    assert!(line.contains("project_note"));
    assert!(line.contains("3 attempts"));
    assert!(line.contains("last error: HTTP 500"));
}

#[test]
fn edit_entry_command_parses_partial_fields() {
    let id = LocalId::new().to_string();
    let cli = Cli::try_parse_from([
        "fieldsync",
        "edit-entry",
        id.as_str(),
        "--hours",
        "6.5",
        "--from",
        "",
    ])
    .unwrap();
    match cli.command {
        Commands::EditEntry {
            id: parsed,
            hours,
            from,
            project,
            description,
            ..
        } => {
            assert_eq!(parsed, id);
            assert_eq!(hours, Some(6.5));
            assert_eq!(from.as_deref(), Some(""));
            assert_eq!(project, None);
            assert_eq!(description, None);
        }
        _ => panic!("expected edit-entry command"),
    }
}

#[test]
fn apply_entry_edit_keeps_unset_fields_and_clears_empty_ones() {
    let mut add = entry_args(4.0);
    add.from = Some("07:30".to_string());
    add.description = Some("Formwork".to_string());
    let current = build_entry_payload(add, today()).unwrap();

    let edited = apply_entry_edit(
        &current,
        EditEntryArgs {
            hours: Some(5.5),
            from: Some(String::new()),
            ..EditEntryArgs::default()
        },
    )
    .unwrap();

    assert!((edited.hours - 5.5).abs() < f64::EPSILON);
    assert_eq!(edited.datetime_from, None);
    assert_eq!(edited.description.as_deref(), Some("Formwork"));
    assert_eq!(edited.report_date, current.report_date);
    assert_eq!(edited.project_id, current.project_id);
}

#[test]
fn apply_entry_edit_validates_changed_values() {
    let current = build_entry_payload(entry_args(4.0), today()).unwrap();
    let too_long = EditEntryArgs {
        hours: Some(30.0),
        ..EditEntryArgs::default()
    };
    let bad_date = EditEntryArgs {
        date: Some("2024-13-01".to_string()),
        ..EditEntryArgs::default()
    };
    assert!(matches!(
        apply_entry_edit(&current, too_long),
        Err(CliError::InvalidInput(_))
    ));
    assert!(apply_entry_edit(&current, bad_date).is_err());
}

#[tokio::test]
async fn run_edit_entry_requeues_synced_entry() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir);
    let db = open_database(&ctx.db_path).await.unwrap();
    let local_id = db
        .insert_server_time_entry(&RemoteTimeEntry {
            server_id: ServerId::new(55),
            payload: build_entry_payload(entry_args(2.0), today()).unwrap(),
            last_modified: Some("2024-05-14 12:00:00".to_string()),
        })
        .await
        .unwrap();

    run_edit_entry(
        &ctx,
        &local_id.to_string(),
        EditEntryArgs {
            hours: Some(3.0),
            ..EditEntryArgs::default()
        },
    )
    .await
    .unwrap();

    let stored = db.get_time_entry(&local_id).await.unwrap().unwrap();
    assert!((stored.payload.hours - 3.0).abs() < f64::EPSILON);
    assert_eq!(stored.sync.status, SyncStatus::Pending);
    assert_eq!(stored.sync.server_id, ServerId::new(55));
    assert_eq!(stored.sync.revision, 1);
}

#[tokio::test]
async fn run_edit_entry_rejects_unknown_id() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir);

    let result = run_edit_entry(&ctx, &LocalId::new().to_string(), EditEntryArgs::default()).await;
    assert!(matches!(result, Err(CliError::InvalidInput(_))));
}

#[test]
fn describe_upload_covers_every_outcome() {
    assert!(describe_upload(None).starts_with("upload deferred"));

    let finished: Result<SyncResult, SyncError> = Ok(SyncResult {
        uploaded: 1,
        ..SyncResult::default()
    });
    assert_eq!(
        describe_upload(Some(&finished)),
        "upload finished: uploaded: 1, downloaded: 0, conflicts resolved: 0, failed: 0"
    );

    let refused: Result<SyncResult, SyncError> = Err(SyncError::AlreadyRunning);
    assert!(describe_upload(Some(&refused)).starts_with("upload not run"));
}
