use crate::domain::models::{CalendarBlock, Project, Task};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::repository::{
    sort_blocks, BlockQuery, CalendarBlockRepository, ProjectRepository, TaskQuery,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    projects: HashMap<String, Project>,
    tasks: Vec<Task>,
    blocks: Vec<CalendarBlock>,
}

impl MemoryState {
    fn check_new_ids(&self, tasks: &[Task], blocks: &[CalendarBlock]) -> Result<(), InfraError> {
        let mut task_ids = self
            .tasks
            .iter()
            .map(|task| task.id.as_str())
            .collect::<HashSet<_>>();
        for task in tasks {
            if !task_ids.insert(task.id.as_str()) {
                return Err(duplicate("task", &task.id));
            }
        }
        let mut block_ids = self
            .blocks
            .iter()
            .map(|block| block.id.as_str())
            .collect::<HashSet<_>>();
        for block in blocks {
            if !block_ids.insert(block.id.as_str()) {
                return Err(duplicate("block", &block.id));
            }
        }
        Ok(())
    }
}

/// Process-local store with the same semantics as the SQLite store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("memory store: {error}")))
    }
}

impl ProjectRepository for InMemoryStore {
    fn insert_plan(
        &self,
        project: &Project,
        tasks: &[Task],
        blocks: &[CalendarBlock],
    ) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        if state.projects.contains_key(&project.id) {
            return Err(duplicate("project", &project.id));
        }
        state.check_new_ids(tasks, blocks)?;

        state.projects.insert(project.id.clone(), project.clone());
        state.tasks.extend(tasks.iter().cloned());
        state.blocks.extend(blocks.iter().cloned());
        Ok(())
    }

    fn get_project(&self, project_id: &str) -> Result<Option<Project>, InfraError> {
        let state = self.lock()?;
        Ok(state.projects.get(project_id).cloned())
    }

    fn list_projects(&self) -> Result<Vec<Project>, InfraError> {
        let state = self.lock()?;
        let mut projects = state.projects.values().cloned().collect::<Vec<_>>();
        projects.sort_by(|left, right| {
            (right.created_at, &right.id).cmp(&(left.created_at, &left.id))
        });
        Ok(projects)
    }

    fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, InfraError> {
        let state = self.lock()?;
        let mut tasks = state
            .tasks
            .iter()
            .filter(|task| query.matches(task))
            .cloned()
            .collect::<Vec<_>>();
        tasks.sort_by(|left, right| {
            (left.position, left.created_at).cmp(&(right.position, right.created_at))
        });
        Ok(tasks)
    }

    fn update_project(&self, project: &Project) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let Some(stored) = state.projects.get_mut(&project.id) else {
            return Ok(false);
        };
        stored.name = project.name.clone();
        stored.description = project.description.clone();
        stored.start_date = project.start_date.clone();
        stored.end_date = project.end_date.clone();
        Ok(true)
    }

    fn delete_project(&self, project_id: &str) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let task_ids = state
            .tasks
            .iter()
            .filter(|task| task.project_id.as_deref() == Some(project_id))
            .map(|task| task.id.clone())
            .collect::<HashSet<_>>();
        state.blocks.retain(|block| {
            block
                .task_id
                .as_ref()
                .map(|task_id| !task_ids.contains(task_id))
                .unwrap_or(true)
        });
        state
            .tasks
            .retain(|task| task.project_id.as_deref() != Some(project_id));
        Ok(state.projects.remove(project_id).is_some())
    }

    fn insert_task(&self, task: &Task) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        state.check_new_ids(std::slice::from_ref(task), &[])?;
        state.tasks.push(task.clone());
        Ok(())
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, InfraError> {
        let state = self.lock()?;
        Ok(state.tasks.iter().find(|task| task.id == task_id).cloned())
    }

    fn update_task(&self, task: &Task) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let Some(stored) = state.tasks.iter_mut().find(|stored| stored.id == task.id) else {
            return Ok(false);
        };
        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.status = task.status;
        stored.complexity_level = task.complexity_level;
        stored.start_date = task.start_date.clone();
        stored.deadline = task.deadline.clone();
        stored.estimated_hours = task.estimated_hours;
        stored.position = task.position;
        Ok(true)
    }

    fn delete_task(&self, task_id: &str) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        state
            .blocks
            .retain(|block| block.task_id.as_deref() != Some(task_id));
        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != task_id);
        Ok(state.tasks.len() != before)
    }
}

impl CalendarBlockRepository for InMemoryStore {
    fn insert_block(&self, block: &CalendarBlock) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        state.check_new_ids(&[], std::slice::from_ref(block))?;
        state.blocks.push(block.clone());
        Ok(())
    }

    fn get_block(&self, block_id: &str) -> Result<Option<CalendarBlock>, InfraError> {
        let state = self.lock()?;
        Ok(state.blocks.iter().find(|block| block.id == block_id).cloned())
    }

    fn list_blocks(&self, query: &BlockQuery) -> Result<Vec<CalendarBlock>, InfraError> {
        let state = self.lock()?;
        let mut blocks = state
            .blocks
            .iter()
            .filter(|block| query.matches(block))
            .cloned()
            .collect::<Vec<_>>();
        sort_blocks(&mut blocks);
        Ok(blocks)
    }

    fn update_block(&self, block: &CalendarBlock) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let Some(stored) = state.blocks.iter_mut().find(|stored| stored.id == block.id) else {
            return Ok(false);
        };
        *stored = block.clone();
        Ok(true)
    }

    fn delete_block(&self, block_id: &str) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        let before = state.blocks.len();
        state.blocks.retain(|block| block.id != block_id);
        Ok(state.blocks.len() != before)
    }
}

fn duplicate(kind: &str, id: &str) -> InfraError {
    InfraError::Validation(format!("{kind} id already exists: {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BlockType, TaskStatus};
    use chrono::{DateTime, Utc};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn project(id: &str) -> Project {
        Project {
            id: id.to_string(),
            name: "Project".to_string(),
            description: None,
            start_date: None,
            end_date: None,
            created_at: fixed_time("2026-02-15T08:00:00Z"),
        }
    }

    fn task(id: &str, project_id: &str, position: i32) -> Task {
        Task {
            id: id.to_string(),
            project_id: Some(project_id.to_string()),
            title: "Task".to_string(),
            description: None,
            status: TaskStatus::Backlog,
            complexity_level: 1,
            start_date: None,
            deadline: None,
            estimated_hours: 1,
            position,
            created_at: fixed_time("2026-02-15T08:00:00Z"),
        }
    }

    fn block(id: &str, task_id: Option<&str>, date: &str, start: &str) -> CalendarBlock {
        CalendarBlock {
            id: id.to_string(),
            task_id: task_id.map(ToOwned::to_owned),
            date: date.to_string(),
            start_time: start.to_string(),
            end_time: "17:00".to_string(),
            is_available: false,
            block_type: if task_id.is_some() {
                BlockType::Task
            } else {
                BlockType::Unavailable
            },
        }
    }

    #[test]
    fn duplicate_ids_reject_the_whole_plan() {
        let store = InMemoryStore::default();
        let result = store.insert_plan(
            &project("prj-1"),
            &[task("tsk-1", "prj-1", 0), task("tsk-1", "prj-1", 1)],
            &[],
        );
        assert!(matches!(result, Err(InfraError::Validation(_))));
        assert!(store.get_project("prj-1").expect("get").is_none());
        assert!(store
            .list_tasks(&TaskQuery::default())
            .expect("tasks")
            .is_empty());
    }

    #[test]
    fn blocks_are_sorted_and_filtered() {
        let store = InMemoryStore::default();
        store
            .insert_plan(
                &project("prj-1"),
                &[task("tsk-1", "prj-1", 0)],
                &[
                    block("blk-b", Some("tsk-1"), "2026-02-17", "09:00"),
                    block("blk-a", Some("tsk-1"), "2026-02-16", "14:00"),
                ],
            )
            .expect("insert plan");
        store
            .insert_block(&block("blk-u", None, "2026-02-16", "09:00"))
            .expect("insert block");

        let all = store.list_blocks(&BlockQuery::default()).expect("list");
        assert_eq!(
            all.iter().map(|block| block.id.as_str()).collect::<Vec<_>>(),
            vec!["blk-u", "blk-a", "blk-b"]
        );
        let monday = store
            .list_blocks(&BlockQuery::for_date("2026-02-16"))
            .expect("list monday");
        assert_eq!(monday.len(), 2);
        assert!(store
            .insert_block(&block("blk-u", None, "2026-02-18", "09:00"))
            .is_err());
    }

    #[test]
    fn delete_project_keeps_unrelated_blocks() {
        let store = InMemoryStore::default();
        store
            .insert_plan(
                &project("prj-1"),
                &[task("tsk-1", "prj-1", 0)],
                &[block("blk-1", Some("tsk-1"), "2026-02-16", "09:00")],
            )
            .expect("insert plan");
        store
            .insert_block(&block("blk-u", None, "2026-02-16", "12:00"))
            .expect("insert block");

        assert!(store.delete_project("prj-1").expect("delete"));
        let remaining = store.list_blocks(&BlockQuery::default()).expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "blk-u");
        assert!(!store.update_project(&project("prj-1")).expect("update"));
    }

    #[test]
    fn task_updates_keep_ownership_and_delete_drops_blocks() {
        let store = InMemoryStore::default();
        store
            .insert_plan(
                &project("prj-1"),
                &[task("tsk-1", "prj-1", 0), task("tsk-2", "prj-1", 1)],
                &[
                    block("blk-1", Some("tsk-1"), "2026-02-16", "09:00"),
                    block("blk-2", Some("tsk-2"), "2026-02-16", "10:00"),
                ],
            )
            .expect("insert plan");

        let mut changed = task("tsk-2", "other-project", 4);
        changed.status = TaskStatus::Done;
        assert!(store.update_task(&changed).expect("update"));
        let stored = store.get_task("tsk-2").expect("get").expect("stored task");
        assert_eq!(stored.project_id.as_deref(), Some("prj-1"));
        assert_eq!(stored.position, 4);

        let done = store
            .list_tasks(&TaskQuery::for_project("prj-1").with_status(TaskStatus::Done))
            .expect("list done");
        assert_eq!(done.len(), 1);

        assert!(store.delete_task("tsk-2").expect("delete"));
        assert!(!store.delete_task("tsk-2").expect("delete again"));
        let remaining = store.list_blocks(&BlockQuery::default()).expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "blk-1");
        assert!(store.insert_task(&task("tsk-1", "prj-1", 0)).is_err());
    }
}
