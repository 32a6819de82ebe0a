//! Database tasks: connect_database and query_database.
//!
//! The backend is embedded SQLite. A database named `game` lives in
//! `<data_dir>/game.sqlite3`, where `data_dir` is a jailed directory
//! (the target directory by default). Connecting creates the file when it
//! does not exist yet.

use crate::core::context::ExecutionContext;
use crate::core::error::TaskError;
use crate::core::output;
use regex::Regex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static DATABASE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("name pattern is valid"));

/// An open connection plus what it was opened as.
#[derive(Debug)]
pub struct DatabaseHandle {
    name: String,
    path: PathBuf,
    conn: Connection,
}

impl DatabaseHandle {
    /// Open (creating if needed) database `name` inside `dir`.
    pub fn open(dir: &Path, name: &str) -> Result<Self, TaskError> {
        validate_name(name)?;
        let path = dir.join(format!("{}.sqlite3", name));
        let conn = Connection::open(&path)?;
        Ok(Self {
            name: name.to_string(),
            path,
            conn,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one or more `;`-separated statements.
    pub fn execute_batch(&self, sql: &str) -> Result<(), TaskError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn close(self) -> Result<(), rusqlite::Error> {
        self.conn.close().map_err(|(_, e)| e)
    }
}

/// Database names become file names, so only plain identifiers are accepted.
pub fn validate_name(name: &str) -> Result<(), TaskError> {
    if DATABASE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(TaskError::validation(format!(
            "invalid database name '{}': expected letters, digits and underscores",
            name
        )))
    }
}

pub async fn connect_database(
    ctx: &mut ExecutionContext,
    database: &str,
    data_dir: Option<&str>,
) -> Result<(), TaskError> {
    if ctx.is_database_skipped() {
        output::skip("connect_database skipped (database disabled)");
        return Ok(());
    }
    if ctx.has_database() {
        return Err(TaskError::validation(
            "a database connection is already open for this run",
        ));
    }

    let name = ctx.vars().render(database).into_owned();
    validate_name(&name)?;

    let dir = ctx.jail().resolve(data_dir.unwrap_or("."))?;
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| TaskError::io_at("create directory", &dir, e))?;

    let handle = tokio::task::spawn_blocking(move || {
        let existed = dir.join(format!("{}.sqlite3", name)).exists();
        DatabaseHandle::open(&dir, &name).map(|h| (h, existed))
    })
    .await?;
    let (handle, existed) = handle?;

    if existed {
        output::detail(&format!("using database {}", handle.name()));
    } else {
        output::detail(&format!("created database {}", handle.name()));
    }
    ctx.set_database(handle);
    Ok(())
}

pub async fn query_database(
    ctx: &mut ExecutionContext,
    file: Option<&str>,
    query: Option<&str>,
) -> Result<(), TaskError> {
    if ctx.is_database_skipped() {
        output::skip("query_database skipped (database disabled)");
        return Ok(());
    }
    if !ctx.has_database() {
        return Err(TaskError::validation(
            "query_database requires an earlier successful connect_database task",
        ));
    }

    let sql = match (file, query) {
        (Some(file), None) => {
            let path = ctx.jail().resolve_below(file)?;
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| TaskError::io_at("read", &path, e))?
        }
        (None, Some(query)) => query.to_string(),
        _ => {
            return Err(TaskError::validation(
                "exactly one of 'file' or 'query' is required",
            ));
        }
    };
    let sql = ctx.vars().render(&sql).into_owned();

    let Some(handle) = ctx.take_database() else {
        return Err(TaskError::validation("database connection is not available"));
    };
    let (handle, result) = tokio::task::spawn_blocking(move || {
        let result = handle.execute_batch(&sql);
        (handle, result)
    })
    .await?;
    let name = handle.name().to_string();
    ctx.set_database(handle);

    result?;
    output::detail(&format!("query ran against {}", name));
    Ok(())
}
