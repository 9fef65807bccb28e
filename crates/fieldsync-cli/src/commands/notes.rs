use std::path::PathBuf;

use fieldsync_core::models::{MediaAttachment, NotePayload, ProjectNote};
use fieldsync_core::store::LocalStore;
use fieldsync_core::util::normalize_text_option;

use crate::commands::common::{describe_upload, open_database, open_services, Context};
use crate::error::CliError;

const NOTE_TYPES: [&str; 6] = ["text", "audio", "dictation", "image", "photo", "video"];

pub struct AddNoteArgs {
    pub title: String,
    pub content: String,
    pub project: Option<i64>,
    pub note_type: String,
    pub file: Option<PathBuf>,
    pub mime_type: Option<String>,
    pub important: bool,
    pub tags: Vec<String>,
}

pub fn build_note(args: AddNoteArgs) -> Result<(NotePayload, Option<MediaAttachment>), CliError> {
    let title = args.title.trim().to_string();
    if title.is_empty() {
        return Err(CliError::InvalidInput("note title cannot be empty".to_string()));
    }
    if args.project.is_some_and(|id| id <= 0) {
        return Err(CliError::InvalidInput(
            "project id must be positive".to_string(),
        ));
    }

    let note_type = args.note_type.trim().to_ascii_lowercase();
    if !NOTE_TYPES.contains(&note_type.as_str()) {
        return Err(CliError::InvalidInput(format!(
            "unknown note type '{note_type}', expected one of {}",
            NOTE_TYPES.join(", ")
        )));
    }

    let media = args
        .file
        .map(|path| {
            let path = path.canonicalize().map_err(|error| {
                CliError::InvalidInput(format!("cannot attach {}: {error}", path.display()))
            })?;
            if !path.is_file() {
                return Err(CliError::InvalidInput(format!(
                    "cannot attach {}: not a file",
                    path.display()
                )));
            }
            Ok(MediaAttachment::new(
                path.to_string_lossy(),
                normalize_text_option(args.mime_type),
            ))
        })
        .transpose()?;

    let mut tags: Vec<String> = args
        .tags
        .into_iter()
        .filter_map(|tag| normalize_text_option(Some(tag)))
        .map(|tag| tag.to_lowercase())
        .collect();
    tags.sort();
    tags.dedup();

    Ok((
        NotePayload {
            project_id: args.project,
            note_type,
            note_group: None,
            title,
            content: args.content.trim().to_string(),
            transcription: None,
            is_important: args.important,
            tags,
        },
        media,
    ))
}

pub async fn run_add_note(ctx: &Context, args: AddNoteArgs) -> Result<(), CliError> {
    let (payload, media) = build_note(args)?;

    let (note, upload) = if ctx.has_server() {
        let services = open_services(ctx).await?;
        let write = services.engine.record_note(payload, media).await?;
        let (note, outcome) = write.settle().await;
        let note = services.db.get_note(&note.local_id).await?.unwrap_or(note);
        (note, Some(describe_upload(outcome.as_ref())))
    } else {
        let db = open_database(&ctx.db_path).await?;
        let note = ProjectNote::new(payload, media);
        db.insert_note(&note).await?;
        (note, None)
    };

    println!(
        "Recorded {} [{}] {}",
        note.local_id,
        note.sync.status,
        note.label()
    );
    if let Some(upload) = upload {
        println!("  {upload}");
    }
    if let Some(error) = &note.sync.last_error {
        println!("  last upload error: {error}");
    }
    Ok(())
}
