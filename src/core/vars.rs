//! Variables and `{{name}}` templating
//!
//! Two maps are kept apart:
//! - **public** variables come from recipe defaults, caller input and
//!   `load_vars`. Recipe tasks may substitute them into any file.
//! - **sensitive** variables (credentials, license keys) are only ever
//!   substituted by the engine itself, into one configuration artifact, at
//!   the end of a run.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_.\-]+)\}\}").expect("placeholder pattern is valid")
});

/// Replace every `{{name}}` whose name is known. Unknown placeholders are
/// left exactly as written.
pub fn substitute<'a>(content: &'a str, vars: &BTreeMap<String, String>) -> Cow<'a, str> {
    PLACEHOLDER.replace_all(content, |caps: &Captures| match vars.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
}

/// Like [`substitute`] but looks names up in `primary` first.
fn substitute_layered<'a>(
    content: &'a str,
    primary: &BTreeMap<String, String>,
    fallback: &BTreeMap<String, String>,
) -> Cow<'a, str> {
    PLACEHOLDER.replace_all(content, |caps: &Captures| {
        let name = &caps[1];
        match primary.get(name).or_else(|| fallback.get(name)) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        }
    })
}

/// Turn a flat JSON object into string variables.
///
/// Strings are taken as-is, numbers and booleans are stringified. Nested
/// values and nulls are rejected.
pub fn flatten_scalars(
    map: serde_json::Map<String, serde_json::Value>,
) -> Result<BTreeMap<String, String>, String> {
    use serde_json::Value;

    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Number(n) => Ok((key, n.to_string())),
            Value::Bool(b) => Ok((key, b.to_string())),
            Value::Null => Err(format!("'{}' is null", key)),
            Value::Array(_) | Value::Object(_) => {
                Err(format!("'{}' is not a flat value", key))
            }
        })
        .collect()
}

/// How a content-mutation task rewrites a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution<'a> {
    /// Substitute every known public variable across the whole content.
    AllVars,
    /// Replace `search` with `replace`, after templating `replace` only.
    Template { search: &'a str, replace: &'a str },
    /// Replace `search` with `replace` verbatim.
    Literal { search: &'a str, replace: &'a str },
}

#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    public: BTreeMap<String, String>,
    sensitive: BTreeMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public(&self) -> &BTreeMap<String, String> {
        &self.public
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.public.get(name).map(String::as_str)
    }

    pub fn set_public(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.public.insert(name.into(), value.into());
    }

    pub fn set_sensitive(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.sensitive.insert(name.into(), value.into());
    }

    /// Merge variables into the public map. Incoming values win.
    pub fn merge_public(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        self.public.extend(vars);
    }

    pub fn has_sensitive(&self, name: &str) -> bool {
        self.sensitive.contains_key(name)
    }

    /// Template a string using public variables only.
    pub fn render<'a>(&self, content: &'a str) -> Cow<'a, str> {
        substitute(content, &self.public)
    }

    /// Apply a recipe-selected substitution mode to file content.
    pub fn apply(&self, content: &str, mode: &Substitution<'_>) -> String {
        match mode {
            Substitution::AllVars => self.render(content).into_owned(),
            Substitution::Template { search, replace } => {
                content.replace(search, &self.render(replace))
            }
            Substitution::Literal { search, replace } => content.replace(search, replace),
        }
    }

    /// The engine's final pass: both maps, sensitive values taking precedence.
    pub(crate) fn render_privileged<'a>(&self, content: &'a str) -> Cow<'a, str> {
        substitute_layered(content, &self.sensitive, &self.public)
    }
}
