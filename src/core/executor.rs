//! Task executor - runs a recipe's tasks in order against one context.
//!
//! ```text
//! Idle -> Running(i) -> Succeeded(i) -> Running(i+1) | Completed
//!                    -> Failed(i)    -> Running(i+1) | Completed   (policy: continue)
//!                                    -> Aborted                    (policy: abort / no answer)
//! ```
//!
//! There is no retry and no rollback at this level. The database handle is
//! closed after the loop regardless of how it ended, and the configuration
//! artifact gets its privileged substitution pass only when the run
//! completed.

use super::config::EngineConfig;
use super::context::ExecutionContext;
use super::error::TaskError;
use super::jail::PathJail;
use super::output;
use super::policy::{Decision, FailurePolicy, TaskFailure};
use super::vars::VariableStore;
use crate::helpers;
use crate::recipe::Recipe;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Public variable holding the pre-provisioned server binary directory.
pub const SERVER_DIR_VAR: &str = "server_dir";

/// Errors that stop a run before or after the task loop.
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("cannot prepare target directory {path}: {source}")]
    TargetDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration artifact {artifact}: {source}")]
    ConfigArtifact {
        artifact: String,
        #[source]
        source: TaskError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running(usize),
    Succeeded(usize),
    Failed(usize),
    Aborted,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every task ran; some may have failed and been accepted.
    Completed,
    /// The run stopped after the task at this index failed.
    Aborted { task: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Tasks that failed but were continued past, in order.
    pub accepted_failures: Vec<usize>,
    /// Number of tasks that were started.
    pub executed: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// Runs recipes against a target directory.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    target: PathBuf,
    config: EngineConfig,
    public: BTreeMap<String, String>,
    sensitive: BTreeMap<String, String>,
    server_dir: Option<PathBuf>,
    config_artifact: Option<String>,
    skip_database: bool,
}

impl TaskExecutor {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            config: EngineConfig::default(),
            public: BTreeMap::new(),
            sensitive: BTreeMap::new(),
            server_dir: None,
            config_artifact: None,
            skip_database: false,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a public variable. Overrides the recipe's default of the same name.
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.public.insert(name.into(), value.into());
        self
    }

    /// Set a sensitive variable, only used for the configuration artifact.
    pub fn secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.sensitive.insert(name.into(), value.into());
        self
    }

    /// Directory holding pre-provisioned server binaries, exposed as `{{server_dir}}`.
    pub fn server_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.server_dir = Some(dir.into());
        self
    }

    /// Relative path of the file that receives the final privileged substitution.
    pub fn config_artifact(mut self, relative: impl Into<String>) -> Self {
        self.config_artifact = Some(relative.into());
        self
    }

    pub fn skip_database(mut self, skip: bool) -> Self {
        self.skip_database = skip;
        self
    }

    fn build_context(&self, recipe: &Recipe) -> Result<ExecutionContext, ExecuteError> {
        let target_err = |source| ExecuteError::TargetDir {
            path: self.target.clone(),
            source,
        };
        std::fs::create_dir_all(&self.target).map_err(target_err)?;
        let jail = PathJail::new(&self.target).map_err(target_err)?;

        let mut vars = VariableStore::new();
        vars.merge_public(recipe.variables().clone());
        vars.merge_public(self.public.clone());
        if let Some(dir) = &self.server_dir {
            vars.set_public(SERVER_DIR_VAR, dir.display().to_string());
        }
        for (name, value) in &self.sensitive {
            vars.set_sensitive(name.clone(), value.clone());
        }

        Ok(ExecutionContext::new(jail, vars, self.config.clone()).skip_database(self.skip_database))
    }

    /// Run every task of `recipe` in order, consulting `policy` on failure.
    pub async fn run<P>(&self, recipe: &Recipe, policy: &mut P) -> Result<RunReport, ExecuteError>
    where
        P: FailurePolicy + ?Sized,
    {
        let mut ctx = self.build_context(recipe)?;

        let title = format!("Provisioning {} {}", recipe.name(), recipe.version());
        output::action(title.trim_end());
        let report = run_tasks(recipe, &mut ctx, policy).await;
        ctx.close_database();

        if report.is_success()
            && let Some(artifact) = &self.config_artifact
        {
            finalize_config(&ctx, artifact)
                .await
                .map_err(|source| ExecuteError::ConfigArtifact {
                    artifact: artifact.clone(),
                    source,
                })?;
        }

        match report.outcome {
            RunOutcome::Completed if report.accepted_failures.is_empty() => {
                output::success(&format!("{} provisioned", recipe.name()));
            }
            RunOutcome::Completed => output::warning(&format!(
                "{} provisioned with {} failed task(s)",
                recipe.name(),
                report.accepted_failures.len()
            )),
            RunOutcome::Aborted { task } => {
                output::error(&format!("aborted at task {}", task + 1));
            }
        }
        Ok(report)
    }
}

fn advance(index: usize, total: usize) -> TaskState {
    if index + 1 < total {
        TaskState::Running(index + 1)
    } else {
        TaskState::Completed
    }
}

/// The task loop. Every path ends in Completed or Aborted.
async fn run_tasks<P>(recipe: &Recipe, ctx: &mut ExecutionContext, policy: &mut P) -> RunReport
where
    P: FailurePolicy + ?Sized,
{
    let tasks = recipe.tasks();
    let total = tasks.len();
    let mut state = TaskState::Idle;
    let mut last_error: Option<TaskError> = None;
    let mut accepted_failures = Vec::new();
    let mut executed = 0;
    let mut aborted_at = None;

    loop {
        tracing::debug!(?state, "executor state");
        state = match state {
            TaskState::Idle if total == 0 => TaskState::Completed,
            TaskState::Idle => TaskState::Running(0),
            TaskState::Running(i) => {
                let task = &tasks[i];
                output::action_numbered(i + 1, total, task.label());
                executed += 1;
                match helpers::run_task(task, ctx).await {
                    Ok(()) => TaskState::Succeeded(i),
                    Err(e) => {
                        output::error(&format!("{} failed ({}): {}", task.label(), e.kind(), e));
                        last_error = Some(e);
                        TaskState::Failed(i)
                    }
                }
            }
            TaskState::Succeeded(i) => advance(i, total),
            TaskState::Failed(i) => {
                let decision = match &last_error {
                    Some(error) => policy.decide(&TaskFailure {
                        index: i,
                        total,
                        task: &tasks[i],
                        error,
                    }),
                    None => None,
                };
                last_error = None;

                match decision.unwrap_or(Decision::Abort) {
                    Decision::Continue => {
                        output::warning(&format!("continuing past failed task {}", i + 1));
                        accepted_failures.push(i);
                        advance(i, total)
                    }
                    Decision::Abort => {
                        aborted_at = Some(i);
                        TaskState::Aborted
                    }
                }
            }
            TaskState::Completed | TaskState::Aborted => break,
        };
    }

    RunReport {
        outcome: match aborted_at {
            Some(task) => RunOutcome::Aborted { task },
            None => RunOutcome::Completed,
        },
        accepted_failures,
        executed,
    }
}

/// Substitute public and sensitive variables into the configuration artifact.
async fn finalize_config(ctx: &ExecutionContext, artifact: &str) -> Result<(), TaskError> {
    let path = ctx.jail().resolve_below(artifact)?;
    if !tokio::fs::try_exists(&path)
        .await
        .map_err(|e| TaskError::io_at("stat", &path, e))?
    {
        output::warning(&format!(
            "configuration artifact {} not found, skipping substitution",
            artifact
        ));
        return Ok(());
    }

    let content = read(&path).await?;
    let rendered = ctx.vars().render_privileged(&content);
    if rendered != content {
        tokio::fs::write(&path, rendered.as_bytes())
            .await
            .map_err(|e| TaskError::io_at("write", &path, e))?;
    }
    output::detail(&format!("configured {}", artifact));
    Ok(())
}

async fn read(path: &Path) -> Result<String, TaskError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TaskError::io_at("read", path, e))
}
