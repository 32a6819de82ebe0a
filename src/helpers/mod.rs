//! Task handlers
//!
//! One async function per action. [`run_task`] is the only entry point the
//! executor uses; it matches every [`TaskAction`] variant, so adding an
//! action without a handler does not compile.
//!
//! ## Categories
//!
//! - **download**: download_file
//! - **source_archive**: download_source_archive
//! - **filesystem**: unzip, move, copy, remove, ensure_directory
//! - **content**: write_file, replace_string
//! - **database**: connect_database, query_database
//! - **vars**: load_vars, waste_time

pub(crate) mod internal;

pub mod content;
pub mod database;
pub mod download;
pub mod filesystem;
pub mod source_archive;
pub mod vars;

use crate::core::context::ExecutionContext;
use crate::core::error::TaskError;
use crate::recipe::{RecipeTask, TaskAction};

/// Run one task to completion against the context.
pub async fn run_task(task: &RecipeTask, ctx: &mut ExecutionContext) -> Result<(), TaskError> {
    match &task.action {
        TaskAction::DownloadFile {
            url,
            destination,
            sha256,
        } => download::download_file(ctx, url, destination, sha256.as_deref()).await,
        TaskAction::DownloadSourceArchive {
            repository,
            reference,
            subpath,
            destination,
        } => {
            source_archive::download_source_archive(
                ctx,
                repository,
                reference.as_deref(),
                subpath.as_deref(),
                destination,
            )
            .await
        }
        TaskAction::Unzip {
            source,
            destination,
        } => filesystem::unzip(ctx, source, destination).await,
        TaskAction::Move {
            source,
            destination,
            overwrite,
        } => filesystem::move_path(ctx, source, destination, *overwrite).await,
        TaskAction::Copy {
            source,
            destination,
            overwrite,
            error_on_exist,
        } => filesystem::copy_path(ctx, source, destination, *overwrite, *error_on_exist).await,
        TaskAction::Remove { path } => filesystem::remove(ctx, path).await,
        TaskAction::EnsureDirectory { path } => filesystem::ensure_directory(ctx, path).await,
        TaskAction::WriteFile {
            file,
            content,
            mode,
            substitute,
        } => content::write_file(ctx, file, content, *mode, *substitute).await,
        TaskAction::ReplaceString {
            file,
            mode,
            search,
            replace,
        } => {
            content::replace_string(ctx, file, *mode, search.as_deref(), replace.as_deref()).await
        }
        TaskAction::ConnectDatabase { database, data_dir } => {
            database::connect_database(ctx, database, data_dir.as_deref()).await
        }
        TaskAction::QueryDatabase { file, query } => {
            database::query_database(ctx, file.as_deref(), query.as_deref()).await
        }
        TaskAction::LoadVars { file } => vars::load_vars(ctx, file).await,
        TaskAction::WasteTime { seconds } => vars::waste_time(*seconds).await,
    }
}
