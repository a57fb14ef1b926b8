use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::collection::{new_id, Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Maternity,
    Unpaid,
    Other,
}

super::text_enum!(LeaveType {
    Annual => "annual",
    Sick => "sick",
    Maternity => "maternity",
    Unpaid => "unpaid",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

super::text_enum!(LeaveStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

impl LeaveStatus {
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        use LeaveStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled) | (Approved, Cancelled)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: String,
    pub employee_id: String,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn new(
        employee_id: impl Into<String>,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            employee_id: employee_id.into(),
            leave_type,
            start_date,
            end_date,
            reason: String::new(),
            status: LeaveStatus::Pending,
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Calendar days covered, both ends inclusive. Zero for an inverted range.
    pub fn total_days(&self) -> i64 {
        if self.end_date < self.start_date {
            return 0;
        }
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Monday to Friday days covered, both ends inclusive.
    pub fn working_days(&self) -> i64 {
        working_days_between(self.start_date, self.end_date)
    }

    /// Working days of this request that fall inside `year`.
    pub fn working_days_in_year(&self, year: i32) -> i64 {
        let (Some(jan1), Some(dec31)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return 0;
        };
        working_days_between(self.start_date.max(jan1), self.end_date.min(dec31))
    }

    pub fn overlaps(&self, other: &LeaveRequest) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }
}

fn working_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}

impl Entity for LeaveRequest {
    const COLLECTION: Collection = Collection::LeaveRequests;

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for LeaveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} leave {} to {} ({} day(s), {})",
            self.leave_type,
            self.start_date,
            self.end_date,
            self.total_days(),
            self.status
        )
    }
}
