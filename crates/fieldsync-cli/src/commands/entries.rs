use chrono::{NaiveDate, NaiveTime};
use fieldsync_core::models::{TimeEntry, TimeEntryPayload};
use fieldsync_core::store::LocalStore;
use fieldsync_core::util::{local_date_today, normalize_text_option, DATE_FORMAT};

use crate::commands::common::{
    describe_upload, open_database, open_services, parse_local_id, Context,
};
use crate::error::CliError;

pub struct AddEntryArgs {
    pub project: i64,
    pub work_type: i64,
    pub hours: f64,
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub description: Option<String>,
}

/// Fields to change on an existing entry; `None` keeps the current value.
/// An empty string clears the optional text fields.
#[derive(Default)]
pub struct EditEntryArgs {
    pub project: Option<i64>,
    pub work_type: Option<i64>,
    pub hours: Option<f64>,
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub description: Option<String>,
}

pub fn build_entry_payload(
    args: AddEntryArgs,
    today: NaiveDate,
) -> Result<TimeEntryPayload, CliError> {
    validate_ids(args.project, args.work_type)?;
    validate_hours(args.hours)?;

    let report_date = match normalize_text_option(args.date) {
        Some(raw) => parse_report_date(&raw)?,
        None => today.format(DATE_FORMAT).to_string(),
    };

    Ok(TimeEntryPayload {
        project_id: args.project,
        work_type_id: args.work_type,
        report_date,
        datetime_from: normalize_clock(args.from)?,
        datetime_to: normalize_clock(args.to)?,
        hours: args.hours,
        description: normalize_text_option(args.description),
    })
}

/// Merge an edit onto the current payload, validating what changed
pub fn apply_entry_edit(
    current: &TimeEntryPayload,
    args: EditEntryArgs,
) -> Result<TimeEntryPayload, CliError> {
    let project_id = args.project.unwrap_or(current.project_id);
    let work_type_id = args.work_type.unwrap_or(current.work_type_id);
    validate_ids(project_id, work_type_id)?;

    let hours = args.hours.unwrap_or(current.hours);
    validate_hours(hours)?;

    let report_date = match normalize_text_option(args.date) {
        Some(raw) => parse_report_date(&raw)?,
        None => current.report_date.clone(),
    };

    Ok(TimeEntryPayload {
        project_id,
        work_type_id,
        report_date,
        datetime_from: match args.from {
            Some(raw) => normalize_clock(Some(raw))?,
            None => current.datetime_from.clone(),
        },
        datetime_to: match args.to {
            Some(raw) => normalize_clock(Some(raw))?,
            None => current.datetime_to.clone(),
        },
        hours,
        description: match args.description {
            Some(raw) => normalize_text_option(Some(raw)),
            None => current.description.clone(),
        },
    })
}

fn validate_ids(project: i64, work_type: i64) -> Result<(), CliError> {
    if project <= 0 || work_type <= 0 {
        return Err(CliError::InvalidInput(
            "project and work type ids must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_hours(hours: f64) -> Result<(), CliError> {
    if !(hours > 0.0 && hours <= 24.0) {
        return Err(CliError::InvalidInput(format!(
            "hours must be within (0, 24], got {hours}"
        )));
    }
    Ok(())
}

fn parse_report_date(raw: &str) -> Result<String, CliError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(|date| date.format(DATE_FORMAT).to_string())
        .map_err(|_| CliError::InvalidInput(format!("invalid date '{raw}', use YYYY-MM-DD")))
}

fn normalize_clock(value: Option<String>) -> Result<Option<String>, CliError> {
    normalize_text_option(value)
        .map(|raw| {
            NaiveTime::parse_from_str(&raw, "%H:%M")
                .map(|time| time.format("%H:%M").to_string())
                .map_err(|_| CliError::InvalidInput(format!("invalid time '{raw}', use HH:MM")))
        })
        .transpose()
}

pub async fn run_add_entry(ctx: &Context, args: AddEntryArgs) -> Result<(), CliError> {
    let payload = build_entry_payload(args, local_date_today())?;

    let (entry, upload) = if ctx.has_server() {
        let services = open_services(ctx).await?;
        let write = services.engine.record_time_entry(payload).await?;
        let (entry, outcome) = write.settle().await;
        let entry = services
            .db
            .get_time_entry(&entry.local_id)
            .await?
            .unwrap_or(entry);
        (entry, Some(describe_upload(outcome.as_ref())))
    } else {
        let db = open_database(&ctx.db_path).await?;
        let entry = TimeEntry::new(payload);
        db.insert_time_entry(&entry).await?;
        (entry, None)
    };

    println!(
        "Recorded {} [{}] {}",
        entry.local_id,
        entry.sync.status,
        entry.label()
    );
    if let Some(upload) = upload {
        println!("  {upload}");
    }
    Ok(())
}

pub async fn run_edit_entry(ctx: &Context, id: &str, args: EditEntryArgs) -> Result<(), CliError> {
    let local_id = parse_local_id(id)?;
    let db = open_database(&ctx.db_path).await?;
    let current = db
        .get_time_entry(&local_id)
        .await?
        .ok_or_else(|| CliError::InvalidInput(format!("no time entry with id {id}")))?;

    let payload = apply_entry_edit(&current.payload, args)?;
    if payload == current.payload {
        println!("Nothing to change on {}", current.local_id);
        return Ok(());
    }

    let (entry, upload) = if ctx.has_server() {
        let services = open_services(ctx).await?;
        let write = services.engine.edit_time_entry(&local_id, &payload).await?;
        let (entry, outcome) = write.settle().await;
        let entry = services
            .db
            .get_time_entry(&local_id)
            .await?
            .unwrap_or(entry);
        (entry, Some(describe_upload(outcome.as_ref())))
    } else {
        (db.update_time_entry(&local_id, &payload).await?, None)
    };

    println!(
        "Updated {} [{}] {}",
        entry.local_id,
        entry.sync.status,
        entry.label()
    );
    if let Some(upload) = upload {
        println!("  {upload}");
    }
    Ok(())
}
