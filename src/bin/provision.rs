//! provision CLI - run a recipe against a server directory
//!
//! Usage:
//!   provision run <recipe.json> --target <dir>   Run every task of a recipe
//!   provision check <recipe.json>                Validate a recipe and list its tasks

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use recipe_provision::{
    Decision, EngineConfig, FailurePolicy, Recipe, RunOutcome, TaskExecutor, TaskFailure, output,
};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "provision")]
#[command(about = "Provision a server directory from a JSON recipe")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (defaults to $XDG_CONFIG_HOME/provision/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recipe
    Run {
        /// Path to the recipe JSON file
        recipe: PathBuf,

        /// Directory every task is confined to
        #[arg(short, long)]
        target: PathBuf,

        /// Directory with pre-provisioned server binaries, exposed as {{server_dir}}
        #[arg(long)]
        server_dir: Option<PathBuf>,

        /// Public variable, NAME=VALUE (repeatable)
        #[arg(long = "var", value_parser = parse_key_val)]
        vars: Vec<(String, String)>,

        /// Sensitive variable, NAME=VALUE (repeatable); only used for --config-artifact
        #[arg(long = "secret", value_parser = parse_key_val)]
        secrets: Vec<(String, String)>,

        /// File (relative to the target) that receives the final substitution pass
        #[arg(long)]
        config_artifact: Option<String>,

        /// Treat connect_database and query_database as no-ops
        #[arg(long)]
        skip_database: bool,

        /// Continue past failed tasks without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Validate a recipe without running it
    Check {
        /// Path to the recipe JSON file
        recipe: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

/// Asks on the terminal whether to keep going after a failed task.
struct TerminalPolicy {
    assume_yes: bool,
}

impl FailurePolicy for TerminalPolicy {
    fn decide(&mut self, failure: &TaskFailure<'_>) -> Option<Decision> {
        if self.assume_yes {
            return Some(Decision::Continue);
        }
        if !std::io::stdin().is_terminal() {
            tracing::debug!("stdin is not a terminal, cannot ask");
            return None;
        }

        let remaining = failure.total - failure.index - 1;
        let default = failure.recommended();
        let hint = match default {
            Decision::Continue => "[Y/n]",
            Decision::Abort => "[y/N]",
        };
        eprint!(
            "Task {} failed. Continue with the remaining {} task(s)? {} ",
            failure.index + 1,
            remaining,
            hint
        );
        std::io::stderr().flush().ok()?;

        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer).ok()?;
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Decision::Continue),
            "n" | "no" => Some(Decision::Abort),
            "" => Some(default),
            _ => None,
        }
    }
}

fn load_recipe(path: &Path) -> Result<Recipe> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read recipe: {}", path.display()))?;
    Recipe::from_json_str(&source).with_context(|| format!("Invalid recipe: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            recipe,
            target,
            server_dir,
            vars,
            secrets,
            config_artifact,
            skip_database,
            yes,
        } => {
            let config = EngineConfig::load(cli.config.as_deref())?;
            let recipe = load_recipe(&recipe)?;

            let mut executor = TaskExecutor::new(target)
                .config(config)
                .skip_database(skip_database);
            if let Some(dir) = server_dir {
                executor = executor.server_dir(dir);
            }
            if let Some(artifact) = config_artifact {
                executor = executor.config_artifact(artifact);
            }
            for (name, value) in vars {
                executor = executor.var(name, value);
            }
            for (name, value) in secrets {
                executor = executor.secret(name, value);
            }

            let mut policy = TerminalPolicy { assume_yes: yes };
            let report = executor.run(&recipe, &mut policy).await?;
            if let RunOutcome::Aborted { task } = report.outcome {
                bail!("{} aborted at task {} of {}", recipe.name(), task + 1, recipe.tasks().len());
            }
        }

        Commands::Check { recipe } => {
            let recipe = load_recipe(&recipe)?;
            output::info(&format!(
                "{} is valid ({} task(s))",
                recipe.name(),
                recipe.tasks().len()
            ));
            let total = recipe.tasks().len();
            for (i, task) in recipe.tasks().iter().enumerate() {
                output::action_numbered(i + 1, total, task.label());
            }
        }
    }

    Ok(())
}
