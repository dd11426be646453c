use crate::domain::subtasks::TemplateCatalog;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const TEMPLATES_JSON: &str = "templates.json";
const DEFAULT_DATABASE_FILE: &str = "kanban_calendar.sqlite";
const SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub templates: serde_json::Value,
}

fn default_files() -> Result<Vec<(&'static str, serde_json::Value)>, InfraError> {
    let mut templates = serde_json::to_value(TemplateCatalog::default())?;
    if let Some(object) = templates.as_object_mut() {
        object.insert("schema".to_string(), serde_json::json!(SCHEMA_VERSION));
    }

    Ok(vec![
        (
            APP_JSON,
            serde_json::json!({
                "schema": SCHEMA_VERSION,
                "appName": "Kanban Calendar",
                "databaseFile": DEFAULT_DATABASE_FILE
            }),
        ),
        (TEMPLATES_JSON, templates),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files()? {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SCHEMA_VERSION {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        templates: read_config(&config_dir.join(TEMPLATES_JSON))?,
    })
}

pub fn read_database_file(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let file = app
        .get("databaseFile")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_DATABASE_FILE);
    if file.contains(['/', '\\']) {
        return Err(InfraError::InvalidConfig(format!(
            "databaseFile must be a plain file name, got '{file}'"
        )));
    }
    Ok(file.to_string())
}

pub fn read_template_catalog(config_dir: &Path) -> Result<TemplateCatalog, InfraError> {
    let path = config_dir.join(TEMPLATES_JSON);
    let value = read_config(&path)?;
    let catalog: TemplateCatalog = serde_json::from_value(value)?;
    catalog.validate().map_err(|message| {
        InfraError::InvalidConfig(format!("{message} in {}", path.display()))
    })?;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_CONFIG_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_CONFIG_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "kanban-calendar-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_and_loadable() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let bundle = load_configs(&dir.path).expect("load configs");
        assert_eq!(bundle.app["appName"], "Kanban Calendar");
        assert_eq!(
            read_database_file(&dir.path).expect("database file"),
            DEFAULT_DATABASE_FILE
        );
        assert_eq!(
            read_template_catalog(&dir.path).expect("templates"),
            TemplateCatalog::default()
        );
    }

    #[test]
    fn existing_files_are_not_overwritten() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema": 1, "appName": "Custom", "databaseFile": "custom.sqlite"}"#,
        )
        .expect("write app.json");
        ensure_default_configs(&dir.path).expect("write defaults");

        assert_eq!(
            read_database_file(&dir.path).expect("database file"),
            "custom.sqlite"
        );
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        fs::write(dir.path.join(APP_JSON), r#"{"schema": 2}"#).expect("write app.json");

        match load_configs(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config error, got {other:?}"),
        }
    }

    #[test]
    fn database_file_must_not_contain_paths() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema": 1, "databaseFile": "../escape.sqlite"}"#,
        )
        .expect("write app.json");
        assert!(read_database_file(&dir.path).is_err());
    }

    #[test]
    fn invalid_templates_are_reported_as_config_errors() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(TEMPLATES_JSON),
            r#"{"schema": 1, "templates": [], "default": [{"title": "", "complexity": 1, "hours": 1}]}"#,
        )
        .expect("write templates.json");
        assert!(matches!(
            read_template_catalog(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));
    }
}
