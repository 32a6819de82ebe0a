//! `load_vars` and `waste_time`.

use crate::core::context::ExecutionContext;
use crate::core::error::TaskError;
use crate::core::output;
use crate::core::vars::flatten_scalars;
use std::time::Duration;

/// Merge a flat JSON object from a jailed file into the public variables.
pub async fn load_vars(ctx: &mut ExecutionContext, file: &str) -> Result<(), TaskError> {
    let path = ctx.jail().resolve_below(file)?;
    let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| TaskError::io_at("read", &path, e))?;

    let value: serde_json::Value = serde_json::from_str(&source)
        .map_err(|e| TaskError::validation(format!("{} is not valid JSON: {}", file, e)))?;
    let serde_json::Value::Object(map) = value else {
        return Err(TaskError::validation(format!(
            "{} must contain a JSON object",
            file
        )));
    };
    let vars =
        flatten_scalars(map).map_err(|e| TaskError::validation(format!("{}: {}", file, e)))?;

    let count = vars.len();
    ctx.vars_mut().merge_public(vars);
    output::detail(&format!("loaded {} variables from {}", count, file));
    Ok(())
}

/// Sleep without blocking the runtime, e.g. to stay under remote rate limits.
pub async fn waste_time(seconds: f64) -> Result<(), TaskError> {
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|e| TaskError::validation(format!("invalid duration {}: {}", seconds, e)))?;
    output::detail(&format!("waiting {:.1}s", duration.as_secs_f64()));
    tokio::time::sleep(duration).await;
    Ok(())
}
