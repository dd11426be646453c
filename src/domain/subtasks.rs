use crate::domain::models::{next_id, validate_non_empty, Task, TaskStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubtaskTemplate {
    pub title: String,
    pub complexity: i32,
    pub hours: i64,
}

impl SubtaskTemplate {
    fn new(title: &str, complexity: i32, hours: i64) -> Self {
        Self {
            title: title.to_string(),
            complexity,
            hours,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "template.tasks[].title")?;
        if self.complexity < 1 {
            return Err("template.tasks[].complexity must be >= 1".to_string());
        }
        if self.hours < 0 {
            return Err("template.tasks[].hours must be >= 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectTemplate {
    pub name: String,
    pub keywords: Vec<String>,
    pub tasks: Vec<SubtaskTemplate>,
}

impl ProjectTemplate {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "template.name")?;
        if self.keywords.is_empty() {
            return Err(format!("template '{}' must declare keywords", self.name));
        }
        for keyword in &self.keywords {
            validate_non_empty(keyword, "template.keywords[]")?;
        }
        for task in &self.tasks {
            task.validate()?;
        }
        Ok(())
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()))
    }
}

/// Keyword templates checked in order, with a fallback for unmatched text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateCatalog {
    pub templates: Vec<ProjectTemplate>,
    #[serde(rename = "default")]
    pub fallback: Vec<SubtaskTemplate>,
}

impl TemplateCatalog {
    pub fn validate(&self) -> Result<(), String> {
        for template in &self.templates {
            template.validate()?;
        }
        for task in &self.fallback {
            task.validate()?;
        }
        Ok(())
    }

    pub fn select(&self, text: &str) -> &[SubtaskTemplate] {
        let text = text.to_lowercase();
        self.templates
            .iter()
            .find(|template| template.matches(&text))
            .map(|template| template.tasks.as_slice())
            .unwrap_or(&self.fallback)
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self {
            templates: vec![
                ProjectTemplate {
                    name: "web development".to_string(),
                    keywords: vec!["web".to_string(), "website".to_string(), "api".to_string()],
                    tasks: vec![
                        SubtaskTemplate::new("Setup project structure", 2, 2),
                        SubtaskTemplate::new("Design database schema", 3, 3),
                        SubtaskTemplate::new("Create API endpoints", 4, 6),
                        SubtaskTemplate::new("Build frontend components", 4, 8),
                        SubtaskTemplate::new("Implement authentication", 3, 4),
                        SubtaskTemplate::new("Testing and debugging", 2, 4),
                        SubtaskTemplate::new("Deploy to production", 2, 2),
                    ],
                },
                ProjectTemplate {
                    name: "mobile app".to_string(),
                    keywords: vec![
                        "mobile".to_string(),
                        "app".to_string(),
                        "react native".to_string(),
                    ],
                    tasks: vec![
                        SubtaskTemplate::new("Setup React Native project", 2, 2),
                        SubtaskTemplate::new("Design app navigation", 3, 3),
                        SubtaskTemplate::new("Create core screens", 4, 8),
                        SubtaskTemplate::new("Implement state management", 3, 4),
                        SubtaskTemplate::new("Add API integration", 3, 4),
                        SubtaskTemplate::new("Test on devices", 2, 3),
                        SubtaskTemplate::new("Prepare for app store", 2, 2),
                    ],
                },
                ProjectTemplate {
                    name: "marketing campaign".to_string(),
                    keywords: vec![
                        "marketing".to_string(),
                        "campaign".to_string(),
                        "promotion".to_string(),
                    ],
                    tasks: vec![
                        SubtaskTemplate::new("Market research", 2, 4),
                        SubtaskTemplate::new("Define target audience", 2, 2),
                        SubtaskTemplate::new("Create content strategy", 3, 4),
                        SubtaskTemplate::new("Design marketing materials", 3, 6),
                        SubtaskTemplate::new("Launch campaign", 2, 2),
                        SubtaskTemplate::new("Monitor and optimize", 2, 3),
                        SubtaskTemplate::new("Analyze results", 2, 2),
                    ],
                },
            ],
            fallback: vec![
                SubtaskTemplate::new("Research and planning", 2, 3),
                SubtaskTemplate::new("Initial setup", 2, 2),
                SubtaskTemplate::new("Core implementation", 4, 6),
                SubtaskTemplate::new("Testing and refinement", 3, 4),
                SubtaskTemplate::new("Final review", 2, 2),
            ],
        }
    }
}

pub trait SubtaskGenerator {
    fn generate(&self, project_name: &str, description: Option<&str>) -> Vec<Task>;
}

#[derive(Debug, Clone, Default)]
pub struct KeywordTemplateGenerator {
    catalog: TemplateCatalog,
}

impl KeywordTemplateGenerator {
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self { catalog }
    }
}

impl SubtaskGenerator for KeywordTemplateGenerator {
    fn generate(&self, project_name: &str, description: Option<&str>) -> Vec<Task> {
        let text = description
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(project_name);
        let created_at = Utc::now();

        self.catalog
            .select(text)
            .iter()
            .enumerate()
            .map(|(index, template)| Task {
                id: next_id("tsk"),
                project_id: None,
                title: template.title.clone(),
                description: Some(format!("Auto-generated subtask for: {project_name}")),
                status: TaskStatus::Backlog,
                complexity_level: template.complexity,
                start_date: None,
                deadline: None,
                estimated_hours: template.hours,
                position: i32::try_from(index).unwrap_or(i32::MAX),
                created_at,
            })
            .collect()
    }
}
