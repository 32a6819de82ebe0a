//! Content tasks: write_file and replace_string.
//!
//! Both template with public variables only; see `core::vars`.

use crate::core::context::ExecutionContext;
use crate::core::error::TaskError;
use crate::core::output;
use crate::core::vars::Substitution;
use crate::recipe::{PathList, ReplaceMode, WriteMode};
use tokio::io::AsyncWriteExt;

pub async fn write_file(
    ctx: &ExecutionContext,
    file: &str,
    content: &str,
    mode: WriteMode,
    substitute: bool,
) -> Result<(), TaskError> {
    let path = ctx.jail().resolve_below(file)?;
    let content = if substitute {
        ctx.vars().render(content)
    } else {
        content.into()
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TaskError::io_at("create directory", parent, e))?;
    }

    let mut options = tokio::fs::OpenOptions::new();
    match mode {
        WriteMode::Truncate => options.write(true).create(true).truncate(true),
        WriteMode::Append => options.append(true).create(true),
    };
    let mut handle = options
        .open(&path)
        .await
        .map_err(|e| TaskError::io_at("open", &path, e))?;
    handle
        .write_all(content.as_bytes())
        .await
        .map_err(|e| TaskError::io_at("write", &path, e))?;
    handle
        .flush()
        .await
        .map_err(|e| TaskError::io_at("write", &path, e))?;

    let verb = match mode {
        WriteMode::Truncate => "wrote",
        WriteMode::Append => "appended to",
    };
    output::detail(&format!("{} {}", verb, ctx.jail().display(&path)));
    Ok(())
}

pub async fn replace_string(
    ctx: &ExecutionContext,
    files: &PathList,
    mode: ReplaceMode,
    search: Option<&str>,
    replace: Option<&str>,
) -> Result<(), TaskError> {
    let substitution = match (mode, search, replace) {
        (ReplaceMode::AllVars, _, _) => Substitution::AllVars,
        (ReplaceMode::Template, Some(search), Some(replace)) => {
            Substitution::Template { search, replace }
        }
        (ReplaceMode::Literal, Some(search), Some(replace)) => {
            Substitution::Literal { search, replace }
        }
        _ => {
            return Err(TaskError::validation(
                "'search' and 'replace' are required for this mode",
            ));
        }
    };

    let paths = files
        .iter()
        .map(|f| ctx.jail().resolve_below(f))
        .collect::<Result<Vec<_>, _>>()?;

    for path in paths {
        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| TaskError::io_at("read", &path, e))?;
        let updated = ctx.vars().apply(&original, &substitution);

        if updated == original {
            tracing::debug!(path = %path.display(), "no replacements");
            continue;
        }
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| TaskError::io_at("write", &path, e))?;
        output::detail(&format!("updated {}", ctx.jail().display(&path)));
    }
    Ok(())
}
