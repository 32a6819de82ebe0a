//! Shared fixtures for integration tests.

#![allow(dead_code)]

use recipe_provision::{
    Decision, EngineConfig, ErrorKind, ExecutionContext, FailurePolicy, PathJail, Recipe,
    TaskFailure, VariableStore,
};
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;
use zip::write::SimpleFileOptions;

pub fn recipe(json: &str) -> Recipe {
    Recipe::from_json_str(json).expect("test recipe should parse")
}

/// A context jailed to `root` with default config.
pub fn context(root: &Path) -> ExecutionContext {
    context_with(root, EngineConfig::default())
}

pub fn context_with(root: &Path, config: EngineConfig) -> ExecutionContext {
    let jail = PathJail::new(root).unwrap();
    ExecutionContext::new(jail, VariableStore::new(), config)
}

/// Config pointing every remote base at a mock server, with no retry wait.
pub fn mock_config(base: &str) -> EngineConfig {
    EngineConfig {
        github_api_base: base.to_string(),
        archive_base: base.to_string(),
        archive_retry_backoff: Duration::ZERO,
        http_timeout: Duration::from_secs(5),
        metadata_timeout: Duration::from_secs(5),
        archive_timeout: Duration::from_secs(5),
        github_token: None,
    }
}

/// Build an in-memory zip. Names ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative)).unwrap()
}

/// Answers every failure the same way and records what it saw.
#[derive(Debug)]
pub struct Recording {
    answer: Option<Decision>,
    pub failed: Vec<usize>,
    pub kinds: Vec<ErrorKind>,
}

impl Recording {
    pub fn answering(answer: Option<Decision>) -> Self {
        Self {
            answer,
            failed: Vec::new(),
            kinds: Vec::new(),
        }
    }
}

impl FailurePolicy for Recording {
    fn decide(&mut self, failure: &TaskFailure<'_>) -> Option<Decision> {
        self.failed.push(failure.index);
        self.kinds.push(failure.error.kind());
        self.answer
    }
}
