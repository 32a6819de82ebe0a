//! Per-run mutable state shared by task handlers.

use super::config::EngineConfig;
use super::jail::PathJail;
use super::output;
use super::vars::VariableStore;
use crate::helpers::database::DatabaseHandle;
use crate::helpers::source_archive::BranchCache;

/// State for one run of one recipe.
///
/// Handlers receive `&mut ExecutionContext` one at a time, in task order.
/// The database handle is closed by [`ExecutionContext::close_database`],
/// which the executor calls on every exit path; dropping the context closes
/// it as well.
#[derive(Debug)]
pub struct ExecutionContext {
    jail: PathJail,
    vars: VariableStore,
    config: EngineConfig,
    database: Option<DatabaseHandle>,
    skip_database: bool,
    branches: BranchCache,
}

impl ExecutionContext {
    pub fn new(jail: PathJail, vars: VariableStore, config: EngineConfig) -> Self {
        Self {
            jail,
            vars,
            config,
            database: None,
            skip_database: false,
            branches: BranchCache::default(),
        }
    }

    /// Make database tasks no-ops for this run.
    pub fn skip_database(mut self, skip: bool) -> Self {
        self.skip_database = skip;
        self
    }

    pub fn jail(&self) -> &PathJail {
        &self.jail
    }

    pub fn vars(&self) -> &VariableStore {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VariableStore {
        &mut self.vars
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_database_skipped(&self) -> bool {
        self.skip_database
    }

    pub fn has_database(&self) -> bool {
        self.database.is_some()
    }

    pub(crate) fn set_database(&mut self, handle: DatabaseHandle) {
        self.database = Some(handle);
    }

    /// Borrow the handle out for a blocking call; put it back with `set_database`.
    pub(crate) fn take_database(&mut self) -> Option<DatabaseHandle> {
        self.database.take()
    }

    pub fn branches(&self) -> &BranchCache {
        &self.branches
    }

    pub(crate) fn branches_mut(&mut self) -> &mut BranchCache {
        &mut self.branches
    }

    /// Close the database connection if one is open.
    pub fn close_database(&mut self) {
        if let Some(handle) = self.database.take() {
            let name = handle.name().to_string();
            match handle.close() {
                Ok(()) => output::detail(&format!("closed database {}", name)),
                Err(e) => output::warning(&format!("closing database {}: {}", name, e)),
            }
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if let Some(handle) = self.database.take() {
            tracing::debug!(database = handle.name(), "closing database on drop");
            let _ = handle.close();
        }
    }
}
