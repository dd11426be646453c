use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Accepted as an end time meaning midnight at the close of the day.
pub const END_OF_DAY: &str = "24:00";
const MINUTES_PER_DAY: u32 = 24 * 60;

pub fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Planned,
    NextUp,
    InProgress,
    Done,
    Archive,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Planned => "planned",
            Self::NextUp => "next_up",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Archive => "archive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "backlog" => Some(Self::Backlog),
            "planned" => Some(Self::Planned),
            "next_up" => Some(Self::NextUp),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "archive" => Some(Self::Archive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Task,
    Unavailable,
}

impl BlockType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Unavailable => "unavailable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "task" => Some(Self::Task),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "project.id")?;
        validate_non_empty(&self.name, "project.name")?;
        let start = self
            .start_date
            .as_deref()
            .map(|value| parse_date_field(value, "project.start_date"))
            .transpose()?;
        let end = self
            .end_date
            .as_deref()
            .map(|value| parse_date_field(value, "project.end_date"))
            .transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err("project.end_date must be on or after project.start_date".to_string());
            }
        }
        Ok(())
    }

    /// The scheduling window, present only when both bounds are set and parse.
    pub fn window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = parse_date(self.start_date.as_deref()?)?;
        let end = parse_date(self.end_date.as_deref()?)?;
        Some((start, end))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub complexity_level: i32,
    pub start_date: Option<String>,
    pub deadline: Option<String>,
    pub estimated_hours: i64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.title, "task.title")?;
        if self.complexity_level < 1 {
            return Err("task.complexity_level must be >= 1".to_string());
        }
        if self.estimated_hours < 0 {
            return Err("task.estimated_hours must be >= 0".to_string());
        }
        if let Some(start_date) = self.start_date.as_deref() {
            validate_date(start_date, "task.start_date")?;
        }
        if let Some(deadline) = self.deadline.as_deref() {
            validate_date(deadline, "task.deadline")?;
        }
        Ok(())
    }
}

/// The part of a task the scheduler reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskEstimate {
    pub id: String,
    pub estimated_hours: i64,
}

impl TaskEstimate {
    pub fn new(id: impl Into<String>, estimated_hours: i64) -> Self {
        Self {
            id: id.into(),
            estimated_hours,
        }
    }
}

impl From<&Task> for TaskEstimate {
    fn from(task: &Task) -> Self {
        Self::new(task.id.clone(), task.estimated_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarBlock {
    pub id: String,
    pub task_id: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
    pub block_type: BlockType,
}

impl CalendarBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        validate_date(&self.date, "block.date")?;
        let start = start_minutes_field(&self.start_time, "block.start_time")?;
        let end = end_minutes_field(&self.end_time, "block.end_time")?;
        if end <= start {
            return Err("block.end_time must be after block.start_time".to_string());
        }
        if self.block_type == BlockType::Task
            && self
                .task_id
                .as_deref()
                .map(|task_id| task_id.trim().is_empty())
                .unwrap_or(true)
        {
            return Err("block.task_id is required for task blocks".to_string());
        }
        Ok(())
    }

    pub fn unavailable(
        date: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            id: next_id("blk"),
            task_id: None,
            date: date.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            is_available: false,
            block_type: BlockType::Unavailable,
        }
    }
}

/// A half-open `[start_time, end_time)` reservation on `date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnavailableInterval {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

impl UnavailableInterval {
    pub fn new(
        date: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_date(&self.date, "unavailable.date")?;
        let start = start_minutes_field(&self.start_time, "unavailable.start_time")?;
        let end = end_minutes_field(&self.end_time, "unavailable.end_time")?;
        if end <= start {
            return Err("unavailable.end_time must be after unavailable.start_time".to_string());
        }
        Ok(())
    }
}

impl From<&CalendarBlock> for UnavailableInterval {
    fn from(block: &CalendarBlock) -> Self {
        Self::new(
            block.date.clone(),
            block.start_time.clone(),
            block.end_time.clone(),
        )
    }
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    parse_hhmm_field(value, field_name).map(|_| ())
}

pub(crate) fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    parse_date_field(value, field_name).map(|_| ())
}

fn parse_hhmm_field(value: &str, field_name: &str) -> Result<NaiveTime, String> {
    let mut split = value.split(':');
    let (Some(hour_str), Some(minute_str), None) = (split.next(), split.next(), split.next()) else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    if hour_str.len() != 2 || minute_str.len() != 2 {
        return Err(format!("{field_name} must be HH:MM"));
    }
    let hour = hour_str
        .parse::<u32>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    let minute = minute_str
        .parse::<u32>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| format!("{field_name} must be HH:MM"))
}

fn start_minutes_field(value: &str, field_name: &str) -> Result<u32, String> {
    parse_hhmm_field(value, field_name).map(|time| time.hour() * 60 + time.minute())
}

fn end_minutes_field(value: &str, field_name: &str) -> Result<u32, String> {
    if value == END_OF_DAY {
        return Ok(MINUTES_PER_DAY);
    }
    start_minutes_field(value, field_name)
}

fn parse_date_field(value: &str, field_name: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("{field_name} must be YYYY-MM-DD"))
}

/// Minutes since midnight for an `HH:MM` bound, with `24:00` as the end of
/// the day.
pub(crate) fn parse_minutes(value: &str) -> Option<u32> {
    end_minutes_field(value.trim(), "time").ok()
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn format_hour(hour: u32) -> String {
    format!("{hour:02}:00")
}
