//! Recipe model - validated, ordered task lists.
//!
//! A recipe document is JSON:
//!
//! ```json
//! {
//!   "name": "example-server",
//!   "version": "1.0.0",
//!   "author": "someone",
//!   "description": "Dedicated server with default config",
//!   "variables": { "port": "27015" },
//!   "tasks": [
//!     { "action": "ensure_directory", "path": "cfg" },
//!     { "action": "write_file", "file": "cfg/server.cfg", "content": "port={{port}}\n" }
//!   ]
//! }
//! ```
//!
//! Documents are checked in full before a [`Recipe`] exists, so the executor
//! never sees a missing or unknown action.

use crate::core::vars::flatten_scalars;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("invalid recipe JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("recipe must be a JSON object")]
    NotAnObject,
    #[error("missing recipe name")]
    MissingName,
    #[error("missing task list")]
    MissingTasks,
    #[error("invalid default variables: {0}")]
    InvalidVariables(String),
    #[error("task {index}: missing action")]
    MissingAction { index: usize },
    #[error("task {index}: unknown action: {action}")]
    UnknownAction { index: usize, action: String },
    #[error("task {index} ({action}): {message}")]
    InvalidTask {
        index: usize,
        action: String,
        message: String,
    },
}

/// One path or a list of paths.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PathList {
    One(String),
    Many(Vec<String>),
}

impl PathList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            PathList::One(p) => std::slice::from_ref(p),
            PathList::Many(ps) => ps,
        };
        slice.iter().map(String::as_str)
    }

    fn is_empty(&self) -> bool {
        self.iter().all(|p| p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Truncate,
    Append,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceMode {
    #[default]
    AllVars,
    Template,
    Literal,
}

fn default_true() -> bool {
    true
}

/// The fixed set of actions a task can perform.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskAction {
    DownloadFile {
        url: String,
        destination: String,
        #[serde(default)]
        sha256: Option<String>,
    },
    DownloadSourceArchive {
        /// `owner/repo`
        repository: String,
        #[serde(default, rename = "ref")]
        reference: Option<String>,
        #[serde(default)]
        subpath: Option<String>,
        destination: String,
    },
    Unzip {
        source: String,
        destination: String,
    },
    Move {
        source: String,
        destination: String,
        #[serde(default)]
        overwrite: bool,
    },
    Copy {
        source: String,
        destination: String,
        #[serde(default = "default_true")]
        overwrite: bool,
        /// Only consulted when `overwrite` is false: fail (true) or skip (false).
        #[serde(default = "default_true")]
        error_on_exist: bool,
    },
    Remove {
        #[serde(alias = "paths")]
        path: PathList,
    },
    EnsureDirectory {
        path: String,
    },
    WriteFile {
        file: String,
        content: String,
        #[serde(default)]
        mode: WriteMode,
        #[serde(default = "default_true")]
        substitute: bool,
    },
    ReplaceString {
        #[serde(alias = "files")]
        file: PathList,
        #[serde(default)]
        mode: ReplaceMode,
        #[serde(default)]
        search: Option<String>,
        #[serde(default)]
        replace: Option<String>,
    },
    ConnectDatabase {
        database: String,
        #[serde(default)]
        data_dir: Option<String>,
    },
    QueryDatabase {
        #[serde(default)]
        file: Option<String>,
        #[serde(default)]
        query: Option<String>,
    },
    LoadVars {
        file: String,
    },
    WasteTime {
        seconds: f64,
    },
}

/// Action tags accepted in recipe documents.
pub const ACTION_NAMES: &[&str] = &[
    "download_file",
    "download_source_archive",
    "unzip",
    "move",
    "copy",
    "remove",
    "ensure_directory",
    "write_file",
    "replace_string",
    "connect_database",
    "query_database",
    "load_vars",
    "waste_time",
];

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("'{}' must not be empty", field))
    } else {
        Ok(())
    }
}

impl TaskAction {
    /// The document tag for this action.
    pub fn name(&self) -> &'static str {
        match self {
            TaskAction::DownloadFile { .. } => "download_file",
            TaskAction::DownloadSourceArchive { .. } => "download_source_archive",
            TaskAction::Unzip { .. } => "unzip",
            TaskAction::Move { .. } => "move",
            TaskAction::Copy { .. } => "copy",
            TaskAction::Remove { .. } => "remove",
            TaskAction::EnsureDirectory { .. } => "ensure_directory",
            TaskAction::WriteFile { .. } => "write_file",
            TaskAction::ReplaceString { .. } => "replace_string",
            TaskAction::ConnectDatabase { .. } => "connect_database",
            TaskAction::QueryDatabase { .. } => "query_database",
            TaskAction::LoadVars { .. } => "load_vars",
            TaskAction::WasteTime { .. } => "waste_time",
        }
    }

    /// Check fields that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            TaskAction::DownloadFile {
                url,
                destination,
                sha256,
            } => {
                require("url", url)?;
                require("destination", destination)?;
                if let Some(hash) = sha256
                    && (hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()))
                {
                    return Err(format!("'sha256' is not a hex SHA-256 digest: {}", hash));
                }
                Ok(())
            }
            TaskAction::DownloadSourceArchive {
                repository,
                destination,
                ..
            } => {
                require("destination", destination)?;
                match repository.split_once('/') {
                    Some((owner, repo))
                        if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
                    {
                        Ok(())
                    }
                    _ => Err(format!(
                        "'repository' must be in owner/repo form, got '{}'",
                        repository
                    )),
                }
            }
            TaskAction::Unzip {
                source,
                destination,
            }
            | TaskAction::Move {
                source,
                destination,
                ..
            }
            | TaskAction::Copy {
                source,
                destination,
                ..
            } => {
                require("source", source)?;
                require("destination", destination)
            }
            TaskAction::Remove { path } => {
                if path.is_empty() {
                    return Err("'path' must name at least one path".to_string());
                }
                Ok(())
            }
            TaskAction::EnsureDirectory { path } => require("path", path),
            TaskAction::WriteFile { file, .. } => require("file", file),
            TaskAction::ReplaceString {
                file,
                mode,
                search,
                replace,
            } => {
                if file.is_empty() {
                    return Err("'file' must name at least one file".to_string());
                }
                if *mode != ReplaceMode::AllVars {
                    match search.as_deref() {
                        Some(s) if !s.is_empty() => {}
                        _ => return Err("'search' is required for this mode".to_string()),
                    }
                    if replace.is_none() {
                        return Err("'replace' is required for this mode".to_string());
                    }
                }
                Ok(())
            }
            TaskAction::ConnectDatabase { database, .. } => require("database", database),
            TaskAction::QueryDatabase { file, query } => match (file, query) {
                (Some(_), Some(_)) => Err("give either 'file' or 'query', not both".to_string()),
                (None, None) => Err("one of 'file' or 'query' is required".to_string()),
                _ => Ok(()),
            },
            TaskAction::LoadVars { file } => require("file", file),
            TaskAction::WasteTime { seconds } => {
                if seconds.is_finite() && *seconds >= 0.0 {
                    Ok(())
                } else {
                    Err(format!("'seconds' must be a non-negative number, got {}", seconds))
                }
            }
        }
    }
}

/// One instruction in a recipe.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RecipeTask {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub action: TaskAction,
}

impl RecipeTask {
    pub fn new(action: TaskAction) -> Self {
        Self {
            description: None,
            action,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description for reports, falling back to the action tag.
    pub fn label(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(self.action.name())
    }
}

/// A validated recipe. Construct with [`Recipe::from_json_str`] or [`Recipe::new`].
#[derive(Debug, Clone)]
pub struct Recipe {
    name: String,
    version: String,
    author: String,
    description: String,
    variables: BTreeMap<String, String>,
    tasks: Vec<RecipeTask>,
}

fn optional_string(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl Recipe {
    /// Build a recipe from already-typed tasks, running the same checks as documents.
    pub fn new(name: impl Into<String>, tasks: Vec<RecipeTask>) -> Result<Self, RecipeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RecipeError::MissingName);
        }
        for (index, task) in tasks.iter().enumerate() {
            task.action
                .validate()
                .map_err(|message| RecipeError::InvalidTask {
                    index,
                    action: task.action.name().to_string(),
                    message,
                })?;
        }
        Ok(Self {
            name,
            version: String::new(),
            author: String::new(),
            description: String::new(),
            variables: BTreeMap::new(),
            tasks,
        })
    }

    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn from_json_str(source: &str) -> Result<Self, RecipeError> {
        let value: Value = serde_json::from_str(source)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, RecipeError> {
        let Value::Object(obj) = value else {
            return Err(RecipeError::NotAnObject);
        };

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .ok_or(RecipeError::MissingName)?
            .to_string();

        let raw_tasks = obj
            .get("tasks")
            .and_then(Value::as_array)
            .ok_or(RecipeError::MissingTasks)?;

        let variables = match obj.get("variables") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(map)) => {
                flatten_scalars(map.clone()).map_err(RecipeError::InvalidVariables)?
            }
            Some(_) => {
                return Err(RecipeError::InvalidVariables(
                    "expected an object".to_string(),
                ));
            }
        };

        let mut tasks = Vec::with_capacity(raw_tasks.len());
        for (index, raw) in raw_tasks.iter().enumerate() {
            let action = raw
                .get("action")
                .and_then(Value::as_str)
                .filter(|a| !a.is_empty())
                .ok_or(RecipeError::MissingAction { index })?;

            if !ACTION_NAMES.contains(&action) {
                return Err(RecipeError::UnknownAction {
                    index,
                    action: action.to_string(),
                });
            }

            let task: RecipeTask =
                serde_json::from_value(raw.clone()).map_err(|e| RecipeError::InvalidTask {
                    index,
                    action: action.to_string(),
                    message: e.to_string(),
                })?;
            tasks.push(task);
        }

        let recipe = Self::new(name, tasks)?;
        Ok(Self {
            version: optional_string(&obj, "version"),
            author: optional_string(&obj, "author"),
            description: optional_string(&obj, "description"),
            variables,
            ..recipe
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Default public variables declared by the recipe.
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn tasks(&self) -> &[RecipeTask] {
        &self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_recipe() {
        let recipe = Recipe::from_value(json!({
            "name": "srv",
            "version": "1.2.0",
            "author": "ops",
            "description": "test server",
            "variables": { "port": 27015, "public": true, "motd": "hi" },
            "tasks": [
                { "action": "ensure_directory", "path": "cfg", "description": "make cfg" },
                { "action": "copy", "source": "a", "destination": "b" },
                { "action": "replace_string", "files": ["a", "b"], "mode": "literal",
                  "search": "x", "replace": "y" },
                { "action": "waste_time", "seconds": 1 }
            ]
        }))
        .unwrap();

        assert_eq!(recipe.name(), "srv");
        assert_eq!(recipe.version(), "1.2.0");
        assert_eq!(recipe.variables().get("port").map(String::as_str), Some("27015"));
        assert_eq!(recipe.variables().get("public").map(String::as_str), Some("true"));
        assert_eq!(recipe.tasks().len(), 4);
        assert_eq!(recipe.tasks()[0].label(), "make cfg");
        assert_eq!(recipe.tasks()[1].label(), "copy");
        assert_eq!(
            recipe.tasks()[1].action,
            TaskAction::Copy {
                source: "a".into(),
                destination: "b".into(),
                overwrite: true,
                error_on_exist: true,
            }
        );
        match &recipe.tasks()[2].action {
            TaskAction::ReplaceString { file, mode, .. } => {
                assert_eq!(file.iter().collect::<Vec<_>>(), vec!["a", "b"]);
                assert_eq!(*mode, ReplaceMode::Literal);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_missing_name_rejected() {
        let err = Recipe::from_value(json!({ "tasks": [] })).unwrap_err();
        assert!(matches!(err, RecipeError::MissingName));
    }

    #[test]
    fn test_missing_tasks_rejected() {
        let err = Recipe::from_value(json!({ "name": "x" })).unwrap_err();
        assert!(matches!(err, RecipeError::MissingTasks));
    }

    #[test]
    fn test_missing_action_rejected() {
        let err = Recipe::from_value(json!({
            "name": "x",
            "tasks": [ { "action": "remove", "path": "a" }, { "path": "b" } ]
        }))
        .unwrap_err();
        assert!(matches!(err, RecipeError::MissingAction { index: 1 }));

        let err = Recipe::from_value(json!({ "name": "x", "tasks": [ { "action": "" } ] }))
            .unwrap_err();
        assert!(matches!(err, RecipeError::MissingAction { index: 0 }));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = Recipe::from_value(json!({
            "name": "x",
            "tasks": [ { "action": "run_shell", "cmd": "rm -rf /" } ]
        }))
        .unwrap_err();
        match err {
            RecipeError::UnknownAction { index, action } => {
                assert_eq!(index, 0);
                assert_eq!(action, "run_shell");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let err = Recipe::from_value(json!({
            "name": "x",
            "tasks": [ { "action": "copy", "source": "a" } ]
        }))
        .unwrap_err();
        assert!(matches!(err, RecipeError::InvalidTask { index: 0, .. }));
    }

    #[test]
    fn test_query_source_exactly_one() {
        let both = TaskAction::QueryDatabase {
            file: Some("a.sql".into()),
            query: Some("SELECT 1".into()),
        };
        let neither = TaskAction::QueryDatabase {
            file: None,
            query: None,
        };
        assert!(both.validate().is_err());
        assert!(neither.validate().is_err());
        assert!(
            TaskAction::QueryDatabase {
                file: None,
                query: Some("SELECT 1".into())
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn test_template_mode_requires_search() {
        let action = TaskAction::ReplaceString {
            file: PathList::One("a".into()),
            mode: ReplaceMode::Template,
            search: Some(String::new()),
            replace: Some("b".into()),
        };
        assert!(action.validate().is_err());
    }

    #[test]
    fn test_repository_form() {
        let action = |repo: &str| TaskAction::DownloadSourceArchive {
            repository: repo.into(),
            reference: None,
            subpath: None,
            destination: "dst".into(),
        };
        assert!(action("owner/repo").validate().is_ok());
        assert!(action("owner").validate().is_err());
        assert!(action("a/b/c").validate().is_err());
        assert!(action("/repo").validate().is_err());
    }

    #[test]
    fn test_negative_wait_rejected() {
        assert!(TaskAction::WasteTime { seconds: -1.0 }.validate().is_err());
        assert!(TaskAction::WasteTime { seconds: 0.5 }.validate().is_ok());
    }

    #[test]
    fn test_action_names_cover_all_variants() {
        let sample = [
            json!({ "action": "download_file", "url": "u", "destination": "d" }),
            json!({ "action": "download_source_archive", "repository": "o/r", "destination": "d" }),
            json!({ "action": "unzip", "source": "s", "destination": "d" }),
            json!({ "action": "move", "source": "s", "destination": "d" }),
            json!({ "action": "copy", "source": "s", "destination": "d" }),
            json!({ "action": "remove", "path": "p" }),
            json!({ "action": "ensure_directory", "path": "p" }),
            json!({ "action": "write_file", "file": "f", "content": "" }),
            json!({ "action": "replace_string", "file": "f" }),
            json!({ "action": "connect_database", "database": "db" }),
            json!({ "action": "query_database", "query": "SELECT 1" }),
            json!({ "action": "load_vars", "file": "v.json" }),
            json!({ "action": "waste_time", "seconds": 0 }),
        ];
        assert_eq!(sample.len(), ACTION_NAMES.len());
        for value in sample {
            let task: RecipeTask = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(Some(task.action.name()), value["action"].as_str());
        }
    }
}
