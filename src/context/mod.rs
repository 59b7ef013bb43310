//! Execution context: the variable store of one recipe run.
//!
//! A `Context` maps top-level variable names to [`Value`] trees. It is used
//! for:
//!
//! - **Template rendering**: `{{path}}` substitution in step fields
//! - **Condition evaluation**: deciding whether a conditional step runs
//! - **Output chaining**: steps write their captured output back under a name
//!
//! `set` always writes a top-level key exactly as given; a key containing
//! dots is stored literally and is not expanded into nested maps. `get`
//! walks dot-separated paths.

mod condition;
mod template;
mod value;

pub use condition::ConditionError;
pub use template::referenced_paths;
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static NULL: Value = Value::Null;

/// Variable store for template rendering and condition evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    variables: BTreeMap<String, Value>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from a set of variables.
    pub fn from_variables(variables: BTreeMap<String, Value>) -> Self {
        Self { variables }
    }

    /// Create a context from recipe defaults with caller overrides applied.
    ///
    /// Overrides replace defaults key by key at the top level.
    pub fn merged(defaults: &BTreeMap<String, Value>, overrides: &BTreeMap<String, Value>) -> Self {
        let mut variables = defaults.clone();
        for (key, value) in overrides {
            variables.insert(key.clone(), value.clone());
        }
        Self { variables }
    }

    /// Store a value under a literal top-level key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Remove a top-level key, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.variables.remove(key)
    }

    /// Look up a dot-separated path.
    ///
    /// Returns [`Value::Null`] if any segment is missing.
    pub fn get(&self, path: &str) -> &Value {
        self.lookup(path).unwrap_or(&NULL)
    }

    /// Whether a dot-separated path resolves to a value.
    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.trim().split('.');
        let first = segments.next().filter(|s| !s.is_empty())?;
        let mut current = self.variables.get(first)?;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Render a template string. Never fails; missing paths render empty.
    pub fn render(&self, template: &str) -> String {
        template::render(template, self)
    }

    /// Evaluate a condition expression.
    pub fn evaluate(&self, expression: &str) -> Result<bool, ConditionError> {
        condition::evaluate(expression, self)
    }

    /// All top-level variables.
    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    /// Consume the context, returning its variables.
    pub fn into_variables(self) -> BTreeMap<String, Value> {
        self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
