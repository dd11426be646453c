use crate::domain::models::{BlockType, CalendarBlock, Project, Task, TaskStatus};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::repository::{
    BlockQuery, CalendarBlockRepository, ProjectRepository, TaskQuery,
};
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const PROJECT_COLUMNS: &str = "id, name, description, start_date, end_date, created_at";
const TASK_COLUMNS: &str = "id, project_id, title, description, status, complexity_level, \
                            start_date, deadline, estimated_hours, position, created_at";
const BLOCK_COLUMNS: &str = "id, task_id, date, start_time, end_time, is_available, block_type";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl ProjectRepository for SqliteStore {
    fn insert_plan(
        &self,
        project: &Project,
        tasks: &[Task],
        blocks: &[CalendarBlock],
    ) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute(
            &format!("INSERT INTO projects ({PROJECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                project.id,
                project.name,
                project.description,
                project.start_date,
                project.end_date,
                project.created_at.to_rfc3339(),
            ],
        )?;
        for task in tasks {
            insert_task_row(&transaction, task)?;
        }
        for block in blocks {
            insert_block_row(&transaction, block)?;
        }
        transaction.commit()?;
        Ok(())
    }

    fn get_project(&self, project_id: &str) -> Result<Option<Project>, InfraError> {
        let connection = self.connect()?;
        let project = connection
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                [project_id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    fn list_projects(&self) -> Result<Vec<Project>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC, id DESC"
        ))?;
        let projects = statement
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, InfraError> {
        let status = query.status.map(|status| status.as_str());
        let mut conditions = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();
        if query.project_id.is_some() {
            conditions.push(format!("project_id = ?{}", values.len() + 1));
            values.push(&query.project_id);
        }
        if status.is_some() {
            conditions.push(format!("status = ?{}", values.len() + 1));
            values.push(&status);
        }

        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY position, created_at");

        let connection = self.connect()?;
        let mut statement = connection.prepare(&sql)?;
        let tasks = statement
            .query_map(values.as_slice(), task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    fn update_project(&self, project: &Project) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE projects SET name = ?1, description = ?2, start_date = ?3, end_date = ?4
             WHERE id = ?5",
            params![
                project.name,
                project.description,
                project.start_date,
                project.end_date,
                project.id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_project(&self, project_id: &str) -> Result<bool, InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute(
            "DELETE FROM calendar_blocks
             WHERE task_id IN (SELECT id FROM tasks WHERE project_id = ?1)",
            [project_id],
        )?;
        transaction.execute("DELETE FROM tasks WHERE project_id = ?1", [project_id])?;
        let removed = transaction.execute("DELETE FROM projects WHERE id = ?1", [project_id])?;
        transaction.commit()?;
        Ok(removed > 0)
    }

    fn insert_task(&self, task: &Task) -> Result<(), InfraError> {
        let connection = self.connect()?;
        insert_task_row(&connection, task)
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, InfraError> {
        let connection = self.connect()?;
        let task = connection
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                [task_id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    fn update_task(&self, task: &Task) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE tasks
             SET title = ?1, description = ?2, status = ?3, complexity_level = ?4,
                 start_date = ?5, deadline = ?6, estimated_hours = ?7, position = ?8
             WHERE id = ?9",
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.complexity_level,
                task.start_date,
                task.deadline,
                task.estimated_hours,
                task.position,
                task.id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_task(&self, task_id: &str) -> Result<bool, InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute("DELETE FROM calendar_blocks WHERE task_id = ?1", [task_id])?;
        let removed = transaction.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
        transaction.commit()?;
        Ok(removed > 0)
    }
}

impl CalendarBlockRepository for SqliteStore {
    fn insert_block(&self, block: &CalendarBlock) -> Result<(), InfraError> {
        let connection = self.connect()?;
        insert_block_row(&connection, block)
    }

    fn get_block(&self, block_id: &str) -> Result<Option<CalendarBlock>, InfraError> {
        let connection = self.connect()?;
        let block = connection
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM calendar_blocks WHERE id = ?1"),
                [block_id],
                block_from_row,
            )
            .optional()?;
        Ok(block)
    }

    fn list_blocks(&self, query: &BlockQuery) -> Result<Vec<CalendarBlock>, InfraError> {
        let mut conditions = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();
        if query.date_range().is_some() {
            conditions.push(format!(
                "date BETWEEN ?{} AND ?{}",
                values.len() + 1,
                values.len() + 2
            ));
            values.push(&query.start_date);
            values.push(&query.end_date);
        }
        if query.task_id.is_some() {
            conditions.push(format!("task_id = ?{}", values.len() + 1));
            values.push(&query.task_id);
        }
        if query.unavailable_only {
            conditions.push("is_available = 0".to_string());
        }

        let mut sql = format!("SELECT {BLOCK_COLUMNS} FROM calendar_blocks");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY date, start_time");

        let connection = self.connect()?;
        let mut statement = connection.prepare(&sql)?;
        let blocks = statement
            .query_map(values.as_slice(), block_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    fn update_block(&self, block: &CalendarBlock) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE calendar_blocks
             SET task_id = ?1, date = ?2, start_time = ?3, end_time = ?4,
                 is_available = ?5, block_type = ?6
             WHERE id = ?7",
            params![
                block.task_id,
                block.date,
                block.start_time,
                block.end_time,
                block.is_available,
                block.block_type.as_str(),
                block.id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_block(&self, block_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute("DELETE FROM calendar_blocks WHERE id = ?1", [block_id])?;
        Ok(removed > 0)
    }
}

fn insert_task_row(connection: &Connection, task: &Task) -> Result<(), InfraError> {
    connection.execute(
        &format!(
            "INSERT INTO tasks ({TASK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            task.id,
            task.project_id,
            task.title,
            task.description,
            task.status.as_str(),
            task.complexity_level,
            task.start_date,
            task.deadline,
            task.estimated_hours,
            task.position,
            task.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_block_row(connection: &Connection, block: &CalendarBlock) -> Result<(), InfraError> {
    connection.execute(
        &format!(
            "INSERT INTO calendar_blocks ({BLOCK_COLUMNS}, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            block.id,
            block.task_id,
            block.date,
            block.start_time,
            block.end_time,
            block.is_available,
            block.block_type.as_str(),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status_raw: String = row.get(4)?;
    let status = TaskStatus::parse(&status_raw)
        .ok_or_else(|| invalid_column(4, format!("unknown task status '{status_raw}'")))?;
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status,
        complexity_level: row.get(5)?,
        start_date: row.get(6)?,
        deadline: row.get(7)?,
        estimated_hours: row.get(8)?,
        position: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
    })
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<CalendarBlock> {
    let block_type_raw: String = row.get(6)?;
    let block_type = BlockType::parse(&block_type_raw)
        .ok_or_else(|| invalid_column(6, format!("unknown block type '{block_type_raw}'")))?;
    Ok(CalendarBlock {
        id: row.get(0)?,
        task_id: row.get(1)?,
        date: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        is_available: row.get(5)?,
        block_type,
    })
}

fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| invalid_column(index, format!("invalid timestamp '{raw}': {error}")))
}

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DATABASE: AtomicUsize = AtomicUsize::new(0);

    struct TempDatabase {
        dir: PathBuf,
        store: SqliteStore,
    }

    impl TempDatabase {
        fn new() -> Self {
            let sequence = NEXT_DATABASE.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "kanban-calendar-sqlite-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp dir");
            let path = dir.join("store.sqlite");
            initialize_database(&path).expect("initialize database");
            Self {
                dir,
                store: SqliteStore::new(path),
            }
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn project(id: &str, created_at: &str) -> Project {
        Project {
            id: id.to_string(),
            name: format!("Project {id}"),
            description: None,
            start_date: Some("2026-02-16".to_string()),
            end_date: Some("2026-02-20".to_string()),
            created_at: fixed_time(created_at),
        }
    }

    fn task(id: &str, project_id: &str, position: i32) -> Task {
        Task {
            id: id.to_string(),
            project_id: Some(project_id.to_string()),
            title: format!("Task {id}"),
            description: None,
            status: TaskStatus::Backlog,
            complexity_level: 2,
            start_date: None,
            deadline: None,
            estimated_hours: 2,
            position,
            created_at: fixed_time("2026-02-15T08:00:00Z"),
        }
    }

    fn task_block(id: &str, task_id: &str, date: &str, start: &str, end: &str) -> CalendarBlock {
        CalendarBlock {
            id: id.to_string(),
            task_id: Some(task_id.to_string()),
            date: date.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            is_available: false,
            block_type: BlockType::Task,
        }
    }

    #[test]
    fn plan_roundtrips_through_sqlite() {
        let db = TempDatabase::new();
        let project = project("prj-1", "2026-02-15T08:00:00Z");
        let tasks = vec![task("tsk-2", "prj-1", 1), task("tsk-1", "prj-1", 0)];
        let blocks = vec![
            task_block("blk-2", "tsk-1", "2026-02-16", "10:00", "11:00"),
            task_block("blk-1", "tsk-1", "2026-02-16", "09:00", "10:00"),
        ];
        db.store
            .insert_plan(&project, &tasks, &blocks)
            .expect("insert plan");

        assert_eq!(
            db.store.get_project("prj-1").expect("get project"),
            Some(project)
        );
        let listed = db
            .store
            .list_tasks(&TaskQuery::for_project("prj-1"))
            .expect("list tasks");
        assert_eq!(
            listed.iter().map(|task| task.id.as_str()).collect::<Vec<_>>(),
            vec!["tsk-1", "tsk-2"]
        );
        let stored = db
            .store
            .list_blocks(&BlockQuery {
                task_id: Some("tsk-1".to_string()),
                ..BlockQuery::default()
            })
            .expect("list blocks");
        assert_eq!(
            stored.iter().map(|block| block.id.as_str()).collect::<Vec<_>>(),
            vec!["blk-1", "blk-2"]
        );
        assert_eq!(stored[0], blocks[1]);
    }

    #[test]
    fn failed_plan_leaves_no_rows_behind() {
        let db = TempDatabase::new();
        let tasks = vec![task("tsk-1", "prj-1", 0)];
        let duplicate_blocks = vec![
            task_block("blk-1", "tsk-1", "2026-02-16", "09:00", "10:00"),
            task_block("blk-1", "tsk-1", "2026-02-16", "10:00", "11:00"),
        ];
        let result = db.store.insert_plan(
            &project("prj-1", "2026-02-15T08:00:00Z"),
            &tasks,
            &duplicate_blocks,
        );
        assert!(matches!(result, Err(InfraError::Sqlite(_))));

        assert_eq!(db.store.get_project("prj-1").expect("get project"), None);
        assert!(db
            .store
            .list_tasks(&TaskQuery::default())
            .expect("list tasks")
            .is_empty());
        assert!(db
            .store
            .list_blocks(&BlockQuery::default())
            .expect("list blocks")
            .is_empty());
    }

    #[test]
    fn projects_list_newest_first_and_delete_cascades() {
        let db = TempDatabase::new();
        db.store
            .insert_plan(
                &project("prj-old", "2026-02-01T08:00:00Z"),
                &[task("tsk-old", "prj-old", 0)],
                &[task_block("blk-old", "tsk-old", "2026-02-02", "09:00", "10:00")],
            )
            .expect("insert old plan");
        db.store
            .insert_plan(&project("prj-new", "2026-02-10T08:00:00Z"), &[], &[])
            .expect("insert new plan");
        db.store
            .insert_block(&CalendarBlock::unavailable("2026-02-02", "12:00", "13:00"))
            .expect("insert unavailable");

        let listed = db.store.list_projects().expect("list projects");
        assert_eq!(
            listed.iter().map(|project| project.id.as_str()).collect::<Vec<_>>(),
            vec!["prj-new", "prj-old"]
        );

        assert!(db.store.delete_project("prj-old").expect("delete"));
        assert!(!db.store.delete_project("prj-old").expect("delete again"));
        assert!(db
            .store
            .list_tasks(&TaskQuery::for_project("prj-old"))
            .expect("tasks")
            .is_empty());
        let remaining = db
            .store
            .list_blocks(&BlockQuery::default())
            .expect("list blocks");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].block_type, BlockType::Unavailable);
    }

    #[test]
    fn block_queries_filter_by_range_and_availability() {
        let db = TempDatabase::new();
        for block in [
            task_block("blk-mon", "tsk-1", "2026-02-16", "09:00", "10:00"),
            task_block("blk-wed", "tsk-1", "2026-02-18", "09:00", "10:00"),
            task_block("blk-next", "tsk-2", "2026-02-23", "09:00", "10:00"),
        ] {
            db.store.insert_block(&block).expect("insert block");
        }
        let mut open = CalendarBlock::unavailable("2026-02-17", "09:00", "10:00");
        open.is_available = true;
        db.store.insert_block(&open).expect("insert open block");

        let week = db
            .store
            .list_blocks(&BlockQuery::range("2026-02-16", "2026-02-20"))
            .expect("list week");
        assert_eq!(week.len(), 3);

        let busy = db
            .store
            .list_blocks(&BlockQuery::range("2026-02-16", "2026-02-20").unavailable())
            .expect("list busy");
        assert_eq!(
            busy.iter().map(|block| block.id.as_str()).collect::<Vec<_>>(),
            vec!["blk-mon", "blk-wed"]
        );

        let single_day = db
            .store
            .list_blocks(&BlockQuery::for_date("2026-02-23"))
            .expect("list day");
        assert_eq!(single_day.len(), 1);
        assert_eq!(single_day[0].task_id.as_deref(), Some("tsk-2"));
    }

    #[test]
    fn update_and_delete_block_report_missing_rows() {
        let db = TempDatabase::new();
        let mut block = task_block("blk-1", "tsk-1", "2026-02-16", "09:00", "10:00");
        db.store.insert_block(&block).expect("insert block");

        block.start_time = "13:00".to_string();
        block.end_time = "14:00".to_string();
        assert!(db.store.update_block(&block).expect("update"));
        assert_eq!(
            db.store.get_block("blk-1").expect("get block"),
            Some(block.clone())
        );

        block.id = "missing".to_string();
        assert!(!db.store.update_block(&block).expect("update missing"));
        assert!(db.store.delete_block("blk-1").expect("delete"));
        assert!(!db.store.delete_block("blk-1").expect("delete again"));
    }

    #[test]
    fn task_crud_and_status_filter() {
        let db = TempDatabase::new();
        db.store
            .insert_plan(
                &project("prj-1", "2026-02-15T08:00:00Z"),
                &[task("tsk-1", "prj-1", 0)],
                &[
                    task_block("blk-1", "tsk-1", "2026-02-16", "09:00", "10:00"),
                    task_block("blk-2", "tsk-1", "2026-02-16", "10:00", "11:00"),
                ],
            )
            .expect("insert plan");
        db.store
            .insert_block(&CalendarBlock::unavailable("2026-02-16", "12:00", "13:00"))
            .expect("insert unavailable");

        let mut manual = task("tsk-2", "prj-1", 1);
        manual.status = TaskStatus::InProgress;
        db.store.insert_task(&manual).expect("insert task");
        assert_eq!(
            db.store.get_task("tsk-2").expect("get task"),
            Some(manual.clone())
        );

        let in_progress = db
            .store
            .list_tasks(&TaskQuery::for_project("prj-1").with_status(TaskStatus::InProgress))
            .expect("filter by status");
        assert_eq!(in_progress, vec![manual.clone()]);

        manual.title = "Renamed".to_string();
        manual.status = TaskStatus::Done;
        manual.estimated_hours = 5;
        assert!(db.store.update_task(&manual).expect("update task"));
        assert_eq!(db.store.get_task("tsk-2").expect("get task"), Some(manual.clone()));
        manual.id = "missing".to_string();
        assert!(!db.store.update_task(&manual).expect("update missing"));

        assert!(db.store.delete_task("tsk-1").expect("delete task"));
        assert!(!db.store.delete_task("tsk-1").expect("delete again"));
        let remaining = db
            .store
            .list_blocks(&BlockQuery::default())
            .expect("list blocks");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].block_type, BlockType::Unavailable);
    }

    #[test]
    fn update_project_changes_window() {
        let db = TempDatabase::new();
        let mut stored = project("prj-1", "2026-02-15T08:00:00Z");
        db.store.insert_plan(&stored, &[], &[]).expect("insert plan");

        stored.end_date = Some("2026-02-27".to_string());
        assert!(db.store.update_project(&stored).expect("update"));
        assert_eq!(
            db.store
                .get_project("prj-1")
                .expect("get")
                .and_then(|project| project.end_date),
            Some("2026-02-27".to_string())
        );
    }
}
