pub mod models;
pub mod scheduler;
pub mod subtasks;
