//! Time entry model

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::record::{LocalId, ServerId, SyncMeta, Versioned};
use crate::util::DATE_FORMAT;

/// Domain fields of a time entry, as exchanged with the remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntryPayload {
    pub project_id: i64,
    pub work_type_id: i64,
    /// Calendar day the work was done (`YYYY-MM-DD`)
    pub report_date: String,
    #[serde(default)]
    pub datetime_from: Option<String>,
    #[serde(default)]
    pub datetime_to: Option<String>,
    pub hours: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// A time entry in the local store
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEntry {
    pub local_id: LocalId,
    pub payload: TimeEntryPayload,
    pub sync: SyncMeta,
}

impl TimeEntry {
    /// Create a new locally-authored entry, pending upload
    #[must_use]
    pub fn new(payload: TimeEntryPayload) -> Self {
        Self {
            local_id: LocalId::new(),
            payload,
            sync: SyncMeta::local_write(),
        }
    }

    /// Short human label for listings
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} {:.2}h project #{}",
            self.payload.report_date, self.payload.hours, self.payload.project_id
        )
    }
}

impl Versioned for TimeEntry {
    fn last_modified(&self) -> Option<&str> {
        self.sync.last_modified.as_deref()
    }
}

/// A time entry as listed by the remote
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTimeEntry {
    pub server_id: Option<ServerId>,
    pub payload: TimeEntryPayload,
    pub last_modified: Option<String>,
}

impl Versioned for RemoteTimeEntry {
    fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }
}

/// Query window for listing remote time entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntryFilter {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub project_id: Option<i64>,
}

impl TimeEntryFilter {
    /// Window of `days` days ending on `today`, across all projects
    #[must_use]
    pub fn trailing_days(today: NaiveDate, days: u32) -> Self {
        Self {
            date_from: today
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(today),
            date_to: today,
            project_id: None,
        }
    }

    pub fn date_from_param(&self) -> String {
        self.date_from.format(DATE_FORMAT).to_string()
    }

    pub fn date_to_param(&self) -> String {
        self.date_to.format(DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncStatus;

    fn payload() -> TimeEntryPayload {
        TimeEntryPayload {
            project_id: 7,
            work_type_id: 2,
            report_date: "2024-05-02".to_string(),
            datetime_from: None,
            datetime_to: None,
            hours: 7.5,
            description: Some("Site survey".to_string()),
        }
    }

    #[test]
    fn test_new_entry_is_pending() {
        let entry = TimeEntry::new(payload());
        assert_eq!(entry.sync.status, SyncStatus::Pending);
        assert!(entry.sync.server_id.is_none());
        assert_eq!(entry.label(), "2024-05-02 7.50h project #7");
    }

    #[test]
    fn test_trailing_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let filter = TimeEntryFilter::trailing_days(today, 30);
        assert_eq!(filter.date_from_param(), "2024-02-14");
        assert_eq!(filter.date_to_param(), "2024-03-15");
        assert_eq!(filter.project_id, None);
    }
}
