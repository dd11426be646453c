//! Turns a project description into generated tasks and packs their
//! estimated hours into one-hour working blocks on a calendar.
//!
//! The scheduling engine in [`domain::scheduler`] is pure. Persistence,
//! configuration and the command log live in [`infrastructure`] and
//! [`application`].

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{bootstrap_workspace, prepare_workspace, BootstrapResult};
pub use application::commands::{
    available_slots_impl, create_block_impl, create_project_impl, create_task_impl,
    delete_block_impl, delete_project_impl, delete_task_impl, get_block_impl, get_project_impl,
    get_task_impl, list_blocks_for_date_impl, list_blocks_impl, list_projects_impl,
    list_tasks_impl, mark_unavailable_impl, update_block_impl, update_project_impl,
    update_task_impl, AppState, BlockInput, ProjectDetailResponse, ProjectPlanResponse, TaskInput,
};
pub use domain::models::{
    BlockType, CalendarBlock, Project, Task, TaskEstimate, TaskStatus, UnavailableInterval,
};
pub use domain::scheduler::{
    available_slots, schedule_tasks_in_calendar, schedule_with, summarize_schedule,
    AvailableSlot, GreedyFirstFit, PlacementStrategy, ScheduleRequest, ScheduleSummary,
};
pub use domain::subtasks::{KeywordTemplateGenerator, SubtaskGenerator, TemplateCatalog};
pub use infrastructure::error::InfraError;
pub use infrastructure::memory_store::InMemoryStore;
pub use infrastructure::repository::{
    BlockQuery, CalendarBlockRepository, PlanStore, ProjectRepository, TaskQuery,
};
pub use infrastructure::sqlite_store::SqliteStore;
