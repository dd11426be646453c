use crate::domain::models::{CalendarBlock, Project, Task, TaskStatus};
use crate::infrastructure::error::InfraError;

/// Filters for [`CalendarBlockRepository::list_blocks`]. The date range is
/// inclusive and only applied when both bounds are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub task_id: Option<String>,
    pub unavailable_only: bool,
}

impl BlockQuery {
    pub fn range(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            start_date: Some(start_date.into()),
            end_date: Some(end_date.into()),
            ..Self::default()
        }
    }

    pub fn for_date(date: impl Into<String>) -> Self {
        let date = date.into();
        Self::range(date.clone(), date)
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable_only = true;
        self
    }

    pub(crate) fn date_range(&self) -> Option<(&str, &str)> {
        match (self.start_date.as_deref(), self.end_date.as_deref()) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub(crate) fn matches(&self, block: &CalendarBlock) -> bool {
        if let Some((start, end)) = self.date_range() {
            if block.date.as_str() < start || block.date.as_str() > end {
                return false;
            }
        }
        if let Some(task_id) = self.task_id.as_deref() {
            if block.task_id.as_deref() != Some(task_id) {
                return false;
            }
        }
        !(self.unavailable_only && block.is_available)
    }
}

/// Filters for [`ProjectRepository::list_tasks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub project_id: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskQuery {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn matches(&self, task: &Task) -> bool {
        let project_matches = self.project_id.is_none()
            || task.project_id.as_deref() == self.project_id.as_deref();
        project_matches && self.status.map(|status| status == task.status).unwrap_or(true)
    }
}

pub trait ProjectRepository: Send + Sync {
    /// Stores a project with its tasks and blocks; nothing is stored on failure.
    fn insert_plan(
        &self,
        project: &Project,
        tasks: &[Task],
        blocks: &[CalendarBlock],
    ) -> Result<(), InfraError>;
    fn get_project(&self, project_id: &str) -> Result<Option<Project>, InfraError>;
    fn list_projects(&self) -> Result<Vec<Project>, InfraError>;
    /// Ordered by `(position, created_at)`.
    fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, InfraError>;
    fn update_project(&self, project: &Project) -> Result<bool, InfraError>;
    /// Removes the project, its tasks and their blocks.
    fn delete_project(&self, project_id: &str) -> Result<bool, InfraError>;

    fn insert_task(&self, task: &Task) -> Result<(), InfraError>;
    fn get_task(&self, task_id: &str) -> Result<Option<Task>, InfraError>;
    /// Replaces every mutable field; `id`, `project_id` and `created_at` stay.
    fn update_task(&self, task: &Task) -> Result<bool, InfraError>;
    /// Removes the task and its blocks together.
    fn delete_task(&self, task_id: &str) -> Result<bool, InfraError>;
}

pub trait CalendarBlockRepository: Send + Sync {
    fn insert_block(&self, block: &CalendarBlock) -> Result<(), InfraError>;
    fn get_block(&self, block_id: &str) -> Result<Option<CalendarBlock>, InfraError>;
    /// Ordered by `(date, start_time)`.
    fn list_blocks(&self, query: &BlockQuery) -> Result<Vec<CalendarBlock>, InfraError>;
    fn update_block(&self, block: &CalendarBlock) -> Result<bool, InfraError>;
    fn delete_block(&self, block_id: &str) -> Result<bool, InfraError>;
}

pub trait PlanStore: ProjectRepository + CalendarBlockRepository {}

impl<T> PlanStore for T where T: ProjectRepository + CalendarBlockRepository {}

pub(crate) fn sort_blocks(blocks: &mut [CalendarBlock]) {
    blocks.sort_by(|left, right| {
        (left.date.as_str(), left.start_time.as_str())
            .cmp(&(right.date.as_str(), right.start_time.as_str()))
    });
}
