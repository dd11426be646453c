use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;

const PLAN_SCHEMA: &str = include_str!("../../sql/schema.sql");
const PLAN_SCHEMA_VERSION: i64 = 1;

/// Creates the plan tables if missing and stamps the schema version.
/// A database written by a newer schema is refused.
pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    let version: i64 = connection.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > PLAN_SCHEMA_VERSION {
        return Err(InfraError::InvalidConfig(format!(
            "database schema version {version} is newer than supported {PLAN_SCHEMA_VERSION}: {}",
            path.display()
        )));
    }

    connection.execute_batch(PLAN_SCHEMA)?;
    connection.pragma_update(None, "user_version", PLAN_SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_database(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "kanban-calendar-storage-{name}-{}.sqlite",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn initialize_database_is_idempotent_and_creates_tables() {
        let path = temp_database("init");

        initialize_database(&path).expect("first init");
        initialize_database(&path).expect("second init");

        let connection = Connection::open(&path).expect("open");
        let tables: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('projects', 'tasks', 'calendar_blocks')",
                [],
                |row| row.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 3);
        let version: i64 = connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("user_version");
        assert_eq!(version, PLAN_SCHEMA_VERSION);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let path = temp_database("newer");
        Connection::open(&path)
            .expect("open")
            .pragma_update(None, "user_version", PLAN_SCHEMA_VERSION + 1)
            .expect("stamp version");

        assert!(matches!(
            initialize_database(&path),
            Err(InfraError::InvalidConfig(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
