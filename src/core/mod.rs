//! Core infrastructure for recipe execution
//!
//! The executor, its per-run context, and the primitives every handler
//! shares: the path jail, variable store, errors, and terminal output.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod jail;
pub mod output;
pub mod policy;
pub mod vars;
