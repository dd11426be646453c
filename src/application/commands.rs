use crate::application::bootstrap::{bootstrap_workspace, prepare_workspace, BootstrapResult};
use crate::domain::models::{
    format_date, next_id, parse_date, BlockType, CalendarBlock, Project, Task, TaskEstimate,
    TaskStatus, UnavailableInterval,
};
use crate::domain::scheduler::{
    available_slots, schedule_tasks_in_calendar, summarize_schedule, AvailableSlot,
    ScheduleSummary,
};
use crate::domain::subtasks::{KeywordTemplateGenerator, SubtaskGenerator};
use crate::infrastructure::config::read_template_catalog;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::repository::{BlockQuery, PlanStore, TaskQuery};
use crate::infrastructure::sqlite_store::SqliteStore;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

const DEFAULT_SLOT_HOURS: u32 = 1;
const DEFAULT_TASK_COMPLEXITY: i32 = 1;
const DEFAULT_TASK_HOURS: i64 = 1;

pub struct AppState {
    logs_dir: PathBuf,
    store: Arc<dyn PlanStore>,
    generator: Box<dyn SubtaskGenerator + Send + Sync>,
    plan_guard: Mutex<()>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let workspace = bootstrap_workspace(&workspace_root)?;
        let store = Arc::new(SqliteStore::new(&workspace.database_path));
        Self::from_workspace(workspace, store)
    }

    /// Uses `store` instead of the workspace database, which is left uncreated.
    pub fn with_store(
        workspace_root: PathBuf,
        store: Arc<dyn PlanStore>,
    ) -> Result<Self, InfraError> {
        let workspace = prepare_workspace(&workspace_root)?;
        Self::from_workspace(workspace, store)
    }

    fn from_workspace(
        workspace: BootstrapResult,
        store: Arc<dyn PlanStore>,
    ) -> Result<Self, InfraError> {
        let catalog = read_template_catalog(&workspace.config_dir)?;
        Ok(Self {
            logs_dir: workspace.logs_dir,
            store,
            generator: Box::new(KeywordTemplateGenerator::new(catalog)),
            plan_guard: Mutex::new(()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_generator(mut self, generator: Box<dyn SubtaskGenerator + Send + Sync>) -> Self {
        self.generator = generator;
        self
    }

    /// Held while occupied hours are read and new calendar rows written, so
    /// concurrent writers cannot book the same slot.
    fn lock_calendar(&self) -> Result<MutexGuard<'_, ()>, InfraError> {
        self.plan_guard
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("calendar: {error}")))
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_warn(&self, command: &str, message: &str) {
        self.append_log("warn", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectPlanResponse {
    pub project: Project,
    pub tasks: Vec<Task>,
    pub blocks: Vec<CalendarBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ScheduleSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetailResponse {
    pub project: Project,
    pub tasks: Vec<Task>,
}

/// Fields accepted when creating or updating a task. On update, omitted
/// `status`, `complexity_level`, `estimated_hours` and `position` keep their
/// stored values; the remaining optional fields are replaced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInput {
    pub project_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub complexity_level: Option<i32>,
    pub start_date: Option<String>,
    pub deadline: Option<String>,
    pub estimated_hours: Option<i64>,
    pub position: Option<i32>,
}

/// Fields accepted when creating or replacing a calendar block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockInput {
    pub task_id: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub is_available: Option<bool>,
    pub block_type: Option<String>,
}

/// Creates a project, generates its tasks and, when a window is given,
/// schedules them around every occupied block already in the store. The
/// project, tasks and blocks are persisted together or not at all.
pub fn create_project_impl(
    state: &AppState,
    name: String,
    description: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<ProjectPlanResponse, InfraError> {
    let started_at = Instant::now();
    let name = required_input(&name, "name")?;
    let description = optional_input(description);
    let start_date = optional_input(start_date);
    let end_date = optional_input(end_date);
    if start_date.is_some() != end_date.is_some() {
        return Err(InfraError::Validation(
            "start_date and end_date must be provided together".to_string(),
        ));
    }

    let project = Project {
        id: next_id("prj"),
        name,
        description,
        start_date,
        end_date,
        created_at: Utc::now(),
    };
    project.validate().map_err(InfraError::Validation)?;

    let mut tasks = state
        .generator
        .generate(&project.name, project.description.as_deref());
    for task in &mut tasks {
        task.project_id = Some(project.id.clone());
    }

    let calendar_guard = state.lock_calendar()?;
    let (blocks, summary) = match project.window() {
        Some((window_start, window_end)) => {
            let unavailable = state
                .store
                .list_blocks(
                    &BlockQuery::range(format_date(window_start), format_date(window_end))
                        .unavailable(),
                )?
                .iter()
                .map(UnavailableInterval::from)
                .collect::<Vec<_>>();
            let estimates = tasks.iter().map(TaskEstimate::from).collect::<Vec<_>>();
            let blocks =
                schedule_tasks_in_calendar(&estimates, window_start, window_end, &unavailable);
            let summary = summarize_schedule(&estimates, &blocks);
            (blocks, Some(summary))
        }
        None => (Vec::new(), None),
    };

    state.store.insert_plan(&project, &tasks, &blocks)?;
    drop(calendar_guard);

    state.log_info(
        "create_project",
        &format!(
            "created project_id={} tasks={} blocks={} in {}ms",
            project.id,
            tasks.len(),
            blocks.len(),
            started_at.elapsed().as_millis()
        ),
    );
    if let Some(summary) = summary.as_ref().filter(|summary| !summary.is_complete()) {
        state.log_warn(
            "create_project",
            &format!(
                "project_id={} left {} hours unscheduled",
                project.id,
                summary.unscheduled_hours()
            ),
        );
    }

    Ok(ProjectPlanResponse {
        project,
        tasks,
        blocks,
        summary,
    })
}

pub fn list_projects_impl(state: &AppState) -> Result<Vec<Project>, InfraError> {
    state.store.list_projects()
}

pub fn get_project_impl(
    state: &AppState,
    project_id: String,
) -> Result<ProjectDetailResponse, InfraError> {
    let project_id = required_input(&project_id, "project_id")?;
    let project = state
        .store
        .get_project(&project_id)?
        .ok_or_else(|| InfraError::NotFound(format!("project {project_id}")))?;
    let tasks = state.store.list_tasks(&TaskQuery::for_project(project_id.as_str()))?;
    Ok(ProjectDetailResponse { project, tasks })
}

/// Updates project fields. Existing blocks are left as they are.
pub fn update_project_impl(
    state: &AppState,
    project_id: String,
    name: Option<String>,
    description: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<Project, InfraError> {
    let project_id = required_input(&project_id, "project_id")?;
    let mut project = state
        .store
        .get_project(&project_id)?
        .ok_or_else(|| InfraError::NotFound(format!("project {project_id}")))?;

    if let Some(name) = name {
        project.name = required_input(&name, "name")?;
    }
    if description.is_some() {
        project.description = optional_input(description);
    }
    if start_date.is_some() {
        project.start_date = optional_input(start_date);
    }
    if end_date.is_some() {
        project.end_date = optional_input(end_date);
    }
    project.validate().map_err(InfraError::Validation)?;

    if !state.store.update_project(&project)? {
        return Err(InfraError::NotFound(format!("project {project_id}")));
    }
    state.log_info("update_project", &format!("updated project_id={project_id}"));
    Ok(project)
}

pub fn delete_project_impl(state: &AppState, project_id: String) -> Result<bool, InfraError> {
    let project_id = required_input(&project_id, "project_id")?;
    let deleted = state.store.delete_project(&project_id)?;
    if deleted {
        state.log_info("delete_project", &format!("deleted project_id={project_id}"));
    }
    Ok(deleted)
}

pub fn list_tasks_impl(
    state: &AppState,
    project_id: Option<String>,
    status: Option<String>,
) -> Result<Vec<Task>, InfraError> {
    let status = optional_input(status)
        .map(|raw| parse_status(&raw))
        .transpose()?;
    let query = TaskQuery {
        project_id: optional_input(project_id),
        status,
    };
    state.store.list_tasks(&query)
}

pub fn get_task_impl(state: &AppState, task_id: String) -> Result<Task, InfraError> {
    let task_id = required_input(&task_id, "task_id")?;
    state
        .store
        .get_task(&task_id)?
        .ok_or_else(|| InfraError::NotFound(format!("task {task_id}")))
}

/// Adds a task by hand. It is not scheduled.
pub fn create_task_impl(state: &AppState, input: TaskInput) -> Result<Task, InfraError> {
    let project_id = optional_input(input.project_id.clone());
    if let Some(project_id) = project_id.as_deref() {
        if state.store.get_project(project_id)?.is_none() {
            return Err(InfraError::NotFound(format!("project {project_id}")));
        }
    }

    let mut task = Task {
        id: next_id("tsk"),
        project_id,
        title: String::new(),
        description: None,
        status: TaskStatus::Backlog,
        complexity_level: DEFAULT_TASK_COMPLEXITY,
        start_date: None,
        deadline: None,
        estimated_hours: DEFAULT_TASK_HOURS,
        position: 0,
        created_at: Utc::now(),
    };
    apply_task_input(&mut task, input)?;
    state.store.insert_task(&task)?;
    state.log_info(
        "create_task",
        &format!("created task_id={} hours={}", task.id, task.estimated_hours),
    );
    Ok(task)
}

pub fn update_task_impl(
    state: &AppState,
    task_id: String,
    input: TaskInput,
) -> Result<Task, InfraError> {
    let task_id = required_input(&task_id, "task_id")?;
    let mut task = state
        .store
        .get_task(&task_id)?
        .ok_or_else(|| InfraError::NotFound(format!("task {task_id}")))?;
    apply_task_input(&mut task, input)?;

    if !state.store.update_task(&task)? {
        return Err(InfraError::NotFound(format!("task {task_id}")));
    }
    state.log_info(
        "update_task",
        &format!("updated task_id={task_id} status={}", task.status.as_str()),
    );
    Ok(task)
}

/// Deletes the task together with its calendar blocks.
pub fn delete_task_impl(state: &AppState, task_id: String) -> Result<bool, InfraError> {
    let task_id = required_input(&task_id, "task_id")?;
    let deleted = state.store.delete_task(&task_id)?;
    if deleted {
        state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    }
    Ok(deleted)
}

pub fn list_blocks_impl(
    state: &AppState,
    start_date: Option<String>,
    end_date: Option<String>,
    task_id: Option<String>,
) -> Result<Vec<CalendarBlock>, InfraError> {
    let start_date = optional_input(start_date);
    let end_date = optional_input(end_date);
    let window = resolve_window(start_date.as_deref(), end_date.as_deref())?;

    let query = BlockQuery {
        start_date: window.map(|(start, _)| format_date(start)),
        end_date: window.map(|(_, end)| format_date(end)),
        task_id: optional_input(task_id),
        unavailable_only: false,
    };
    state.store.list_blocks(&query)
}

pub fn get_block_impl(state: &AppState, block_id: String) -> Result<CalendarBlock, InfraError> {
    let block_id = required_input(&block_id, "block_id")?;
    state
        .store
        .get_block(&block_id)?
        .ok_or_else(|| InfraError::NotFound(format!("calendar block {block_id}")))
}

pub fn list_blocks_for_date_impl(
    state: &AppState,
    date: String,
) -> Result<Vec<CalendarBlock>, InfraError> {
    let date = parse_date_input(&date, "date")?;
    state.store.list_blocks(&BlockQuery::for_date(format_date(date)))
}

pub fn create_block_impl(state: &AppState, input: BlockInput) -> Result<CalendarBlock, InfraError> {
    let block = block_from_input(next_id("blk"), input)?;
    let _calendar = state.lock_calendar()?;
    state.store.insert_block(&block)?;
    state.log_info(
        "create_block",
        &format!(
            "created block_id={} date={} {}-{}",
            block.id, block.date, block.start_time, block.end_time
        ),
    );
    Ok(block)
}

/// Records a reservation the scheduler will plan around.
pub fn mark_unavailable_impl(
    state: &AppState,
    date: String,
    start_time: String,
    end_time: String,
) -> Result<CalendarBlock, InfraError> {
    let interval = UnavailableInterval::new(date.trim(), start_time.trim(), end_time.trim());
    interval.validate().map_err(InfraError::Validation)?;

    let block = CalendarBlock::unavailable(interval.date, interval.start_time, interval.end_time);
    let _calendar = state.lock_calendar()?;
    state.store.insert_block(&block)?;
    state.log_info(
        "mark_unavailable",
        &format!(
            "blocked date={} {}-{} block_id={}",
            block.date, block.start_time, block.end_time, block.id
        ),
    );
    Ok(block)
}

pub fn update_block_impl(
    state: &AppState,
    block_id: String,
    input: BlockInput,
) -> Result<CalendarBlock, InfraError> {
    let block_id = required_input(&block_id, "block_id")?;
    let block = block_from_input(block_id.clone(), input)?;
    let _calendar = state.lock_calendar()?;
    if !state.store.update_block(&block)? {
        return Err(InfraError::NotFound(format!("calendar block {block_id}")));
    }
    state.log_info("update_block", &format!("updated block_id={block_id}"));
    Ok(block)
}

pub fn delete_block_impl(state: &AppState, block_id: String) -> Result<bool, InfraError> {
    let block_id = required_input(&block_id, "block_id")?;
    let deleted = state.store.delete_block(&block_id)?;
    if deleted {
        state.log_info("delete_block", &format!("deleted block_id={block_id}"));
    }
    Ok(deleted)
}

pub fn available_slots_impl(
    state: &AppState,
    start_date: String,
    end_date: String,
    duration_hours: Option<u32>,
) -> Result<Vec<AvailableSlot>, InfraError> {
    let (window_start, window_end) =
        resolve_window(Some(&start_date), Some(&end_date))?.ok_or_else(|| {
            InfraError::Validation("start_date and end_date are required".to_string())
        })?;
    let duration_hours = duration_hours.unwrap_or(DEFAULT_SLOT_HOURS);

    let unavailable = state
        .store
        .list_blocks(
            &BlockQuery::range(format_date(window_start), format_date(window_end)).unavailable(),
        )?
        .iter()
        .map(UnavailableInterval::from)
        .collect::<Vec<_>>();
    Ok(available_slots(
        window_start,
        window_end,
        duration_hours,
        &unavailable,
    ))
}

fn apply_task_input(task: &mut Task, input: TaskInput) -> Result<(), InfraError> {
    task.title = required_input(&input.title, "title")?;
    task.description = optional_input(input.description);
    task.start_date = optional_input(input.start_date);
    task.deadline = optional_input(input.deadline);
    if let Some(status) = optional_input(input.status) {
        task.status = parse_status(&status)?;
    }
    if let Some(complexity_level) = input.complexity_level {
        task.complexity_level = complexity_level;
    }
    if let Some(estimated_hours) = input.estimated_hours {
        task.estimated_hours = estimated_hours;
    }
    if let Some(position) = input.position {
        task.position = position;
    }
    task.validate().map_err(InfraError::Validation)
}

fn parse_status(raw: &str) -> Result<TaskStatus, InfraError> {
    TaskStatus::parse(raw).ok_or_else(|| InfraError::Validation(format!("unknown status '{raw}'")))
}

fn block_from_input(id: String, input: BlockInput) -> Result<CalendarBlock, InfraError> {
    let block_type = match input.block_type.as_deref() {
        Some(raw) => BlockType::parse(raw)
            .ok_or_else(|| InfraError::Validation(format!("unknown block_type '{raw}'")))?,
        None => BlockType::Task,
    };
    let block = CalendarBlock {
        id,
        task_id: optional_input(input.task_id),
        date: input.date.trim().to_string(),
        start_time: input.start_time.trim().to_string(),
        end_time: input.end_time.trim().to_string(),
        is_available: input.is_available.unwrap_or(false),
        block_type,
    };
    block.validate().map_err(InfraError::Validation)?;
    Ok(block)
}

fn resolve_window(
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<Option<(NaiveDate, NaiveDate)>, InfraError> {
    match (start_date, end_date) {
        (Some(start), Some(end)) => {
            let start = parse_date_input(start, "start_date")?;
            let end = parse_date_input(end, "end_date")?;
            if end < start {
                return Err(InfraError::Validation(
                    "end_date must be on or after start_date".to_string(),
                ));
            }
            Ok(Some((start, end)))
        }
        (None, None) => Ok(None),
        _ => Err(InfraError::Validation(
            "start_date and end_date must be provided together".to_string(),
        )),
    }
}

fn parse_date_input(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    parse_date(value)
        .ok_or_else(|| InfraError::Validation(format!("{field_name} must be YYYY-MM-DD")))
}

fn required_input(value: &str, field_name: &str) -> Result<String, InfraError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InfraError::Validation(format!(
            "{field_name} must not be empty"
        )));
    }
    Ok(value.to_string())
}

fn optional_input(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
