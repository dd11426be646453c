//! Task-to-calendar scheduling.
//!
//! Packs ordered task estimates into one-hour slots between 09:00 and 17:00
//! on Monday through Friday, skipping slots covered by unavailable intervals.
//! Packing is greedy and forward-only: one cursor `(date, hour)` is shared by
//! every task of a call and never moves backwards, so a gap left on an
//! earlier day is never refilled by a later task.

use crate::domain::models::{
    format_date, format_hour, next_id, parse_date, parse_minutes, BlockType, CalendarBlock,
    TaskEstimate, UnavailableInterval,
};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

pub const WORK_START_HOUR: u32 = 9;
pub const WORK_END_HOUR: u32 = 17;
pub const WORKING_DAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

pub fn is_working_day(date: NaiveDate) -> bool {
    WORKING_DAYS.contains(&date.weekday())
}

/// Forward-only position in the calendar.
///
/// `date` becomes `None` if the calendar itself runs out, which counts as
/// exhausted for any window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    date: Option<NaiveDate>,
    hour: u32,
}

impl Cursor {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            hour: WORK_START_HOUR,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn is_exhausted(&self, window_end: NaiveDate) -> bool {
        self.date.map(|date| date > window_end).unwrap_or(true)
    }

    pub fn advance_day(self) -> Self {
        Self {
            date: self.date.and_then(|date| date.succ_opt()),
            hour: WORK_START_HOUR,
        }
    }

    pub fn advance_hour(self) -> Self {
        let hour = self.hour + 1;
        if hour >= WORK_END_HOUR {
            return self.advance_day();
        }
        Self { hour, ..self }
    }
}

/// An unavailable interval with its bounds in minutes since midnight, so an
/// end of `24:00` covers the rest of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exclusion {
    pub date: NaiveDate,
    pub start: u32,
    pub end: u32,
}

impl Exclusion {
    pub fn parse(interval: &UnavailableInterval) -> Option<Self> {
        Some(Self {
            date: parse_date(&interval.date)?,
            start: parse_minutes(&interval.start_time)?,
            end: parse_minutes(&interval.end_time)?,
        })
    }

    /// Intervals that fail to parse are dropped; they cannot block anything.
    pub fn parse_all(intervals: &[UnavailableInterval]) -> Vec<Self> {
        intervals.iter().filter_map(Self::parse).collect()
    }

    fn covers_start_of(&self, date: NaiveDate, slot_start: u32) -> bool {
        self.date == date && self.start <= slot_start && self.end > slot_start
    }

    fn overlaps(&self, date: NaiveDate, start: u32, end: u32) -> bool {
        self.date == date && self.start < end && start < self.end
    }
}

/// A slot is blocked when any exclusion on its date covers the slot's start.
pub fn is_slot_blocked(date: NaiveDate, hour: u32, exclusions: &[Exclusion]) -> bool {
    let slot_start = hour_minutes(hour);
    exclusions
        .iter()
        .any(|exclusion| exclusion.covers_start_of(date, slot_start))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOutcome {
    SkippedDay,
    Placed { date: NaiveDate, hour: u32 },
    Blocked,
}

/// One slot attempt: returns the advanced cursor and what happened at the
/// slot it pointed to. Non-working days are skipped without consuming an hour.
pub fn attempt_slot(cursor: Cursor, exclusions: &[Exclusion]) -> (Cursor, SlotOutcome) {
    let Some(date) = cursor.date() else {
        return (cursor, SlotOutcome::SkippedDay);
    };
    if !is_working_day(date) {
        return (cursor.advance_day(), SlotOutcome::SkippedDay);
    }

    let hour = cursor.hour();
    let outcome = if is_slot_blocked(date, hour, exclusions) {
        SlotOutcome::Blocked
    } else {
        SlotOutcome::Placed { date, hour }
    };
    (cursor.advance_hour(), outcome)
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleRequest<'a> {
    pub tasks: &'a [TaskEstimate],
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub unavailable: &'a [UnavailableInterval],
}

impl<'a> ScheduleRequest<'a> {
    pub fn new(
        tasks: &'a [TaskEstimate],
        window_start: NaiveDate,
        window_end: NaiveDate,
        unavailable: &'a [UnavailableInterval],
    ) -> Self {
        Self {
            tasks,
            window_start,
            window_end,
            unavailable,
        }
    }
}

/// A one-hour slot assigned to a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub task_id: String,
    pub date: NaiveDate,
    pub hour: u32,
}

impl Placement {
    pub fn into_block(self) -> CalendarBlock {
        CalendarBlock {
            id: next_id("blk"),
            task_id: Some(self.task_id),
            date: format_date(self.date),
            start_time: format_hour(self.hour),
            end_time: format_hour(self.hour + 1),
            is_available: false,
            block_type: BlockType::Task,
        }
    }
}

pub trait PlacementStrategy {
    fn place(&self, request: &ScheduleRequest<'_>) -> Vec<Placement>;
}

/// First-fit packing over a single shared cursor.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyFirstFit;

impl PlacementStrategy for GreedyFirstFit {
    fn place(&self, request: &ScheduleRequest<'_>) -> Vec<Placement> {
        let exclusions = Exclusion::parse_all(request.unavailable);
        let mut cursor = Cursor::new(request.window_start);
        let mut placements = Vec::new();

        for task in request.tasks {
            if cursor.is_exhausted(request.window_end) {
                break;
            }
            let mut hours_left = task.estimated_hours.max(0);
            while hours_left > 0 && !cursor.is_exhausted(request.window_end) {
                let (next, outcome) = attempt_slot(cursor, &exclusions);
                if let SlotOutcome::Placed { date, hour } = outcome {
                    placements.push(Placement {
                        task_id: task.id.clone(),
                        date,
                        hour,
                    });
                    hours_left -= 1;
                }
                cursor = next;
            }
        }

        placements
    }
}

pub fn schedule_with<S>(strategy: &S, request: &ScheduleRequest<'_>) -> Vec<CalendarBlock>
where
    S: PlacementStrategy + ?Sized,
{
    strategy
        .place(request)
        .into_iter()
        .map(Placement::into_block)
        .collect()
}

/// Schedules `tasks` in order between `window_start` and `window_end`
/// (both inclusive). Hours that do not fit in the window are silently left
/// unscheduled; see [`summarize_schedule`].
pub fn schedule_tasks_in_calendar(
    tasks: &[TaskEstimate],
    window_start: NaiveDate,
    window_end: NaiveDate,
    unavailable: &[UnavailableInterval],
) -> Vec<CalendarBlock> {
    let request = ScheduleRequest::new(tasks, window_start, window_end, unavailable);
    schedule_with(&GreedyFirstFit, &request)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskScheduleSummary {
    pub task_id: String,
    pub requested_hours: i64,
    pub scheduled_hours: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub tasks: Vec<TaskScheduleSummary>,
}

impl ScheduleSummary {
    pub fn unscheduled_hours(&self) -> i64 {
        self.tasks
            .iter()
            .map(|task| (task.requested_hours - task.scheduled_hours).max(0))
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unscheduled_hours() == 0
    }
}

pub fn summarize_schedule(tasks: &[TaskEstimate], blocks: &[CalendarBlock]) -> ScheduleSummary {
    let tasks = tasks
        .iter()
        .map(|task| {
            let scheduled_hours = blocks
                .iter()
                .filter(|block| block.task_id.as_deref() == Some(task.id.as_str()))
                .map(block_hours)
                .sum();
            TaskScheduleSummary {
                task_id: task.id.clone(),
                requested_hours: task.estimated_hours.max(0),
                scheduled_hours,
            }
        })
        .collect();
    ScheduleSummary { tasks }
}

fn block_hours(block: &CalendarBlock) -> i64 {
    match (parse_minutes(&block.start_time), parse_minutes(&block.end_time)) {
        (Some(start), Some(end)) if end > start => i64::from((end - start) / 60),
        _ => 0,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AvailableSlot {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_hours: u32,
}

/// Every whole-hour window of `duration_hours` inside working hours on the
/// working days of `[start, end]` that does not intersect an exclusion.
pub fn available_slots(
    start: NaiveDate,
    end: NaiveDate,
    duration_hours: u32,
    unavailable: &[UnavailableInterval],
) -> Vec<AvailableSlot> {
    let working_span = WORK_END_HOUR - WORK_START_HOUR;
    if duration_hours == 0 || duration_hours > working_span {
        return Vec::new();
    }
    let exclusions = Exclusion::parse_all(unavailable);
    let mut slots = Vec::new();

    for date in start.iter_days().take_while(|date| *date <= end) {
        if !is_working_day(date) {
            continue;
        }
        for hour in WORK_START_HOUR..=(WORK_END_HOUR - duration_hours) {
            let slot_start = hour_minutes(hour);
            let slot_end = hour_minutes(hour + duration_hours);
            if exclusions
                .iter()
                .any(|exclusion| exclusion.overlaps(date, slot_start, slot_end))
            {
                continue;
            }
            slots.push(AvailableSlot {
                date: format_date(date),
                start_time: format_hour(hour),
                end_time: format_hour(hour + duration_hours),
                duration_hours,
            });
        }
    }
    slots
}

fn hour_minutes(hour: u32) -> u32 {
    hour * 60
}
