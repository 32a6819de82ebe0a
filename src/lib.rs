//! Recipe-driven provisioning engine
//!
//! A recipe is a JSON document holding an ordered list of tasks. The engine
//! runs them one at a time against a single target directory: every path a
//! task names is resolved inside that directory and rejected if it would
//! escape, and `{{name}}` placeholders are filled from the run's variables.
//!
//! # Example Recipe
//!
//! ```json
//! {
//!   "name": "example-server",
//!   "variables": { "port": "27015" },
//!   "tasks": [
//!     { "action": "download_source_archive", "repository": "owner/server-config",
//!       "subpath": "defaults", "destination": "cfg" },
//!     { "action": "replace_string", "file": "cfg/server.cfg" },
//!     { "action": "connect_database", "database": "stats" },
//!     { "action": "query_database", "file": "cfg/schema.sql" }
//!   ]
//! }
//! ```
//!
//! # Actions
//!
//! - `download_file` - Fetch a URL into the target, optionally checking sha256
//! - `download_source_archive` - Fetch a GitHub repository snapshot, optionally a subdirectory
//! - `unzip` - Extract a zip or tar archive
//! - `move`, `copy`, `remove`, `ensure_directory` - Structural file operations
//! - `write_file`, `replace_string` - Content and templating
//! - `connect_database`, `query_database` - SQLite setup scripts
//! - `load_vars` - Merge a JSON object into the public variables
//! - `waste_time` - Sleep
//!
//! # Variables
//!
//! Public variables come from the recipe's `variables`, the caller, and
//! `load_vars`; they are substituted by tasks. Sensitive variables are only
//! ever written into the configuration artifact, after every task has run.

pub mod core;
pub mod helpers;
pub mod recipe;

pub use crate::core::config::EngineConfig;
pub use crate::core::context::ExecutionContext;
pub use crate::core::error::{ErrorKind, TaskError};
pub use crate::core::executor::{ExecuteError, RunOutcome, RunReport, TaskExecutor, TaskState};
pub use crate::core::jail::PathJail;
pub use crate::core::output;
pub use crate::core::policy::{AlwaysAbort, AlwaysContinue, Decision, FailurePolicy, Scripted, TaskFailure};
pub use crate::core::vars::VariableStore;
pub use crate::recipe::{Recipe, RecipeError, RecipeTask, TaskAction};
