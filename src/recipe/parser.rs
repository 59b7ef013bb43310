//! Recipe document parser.
//!
//! Recipes are YAML documents. The parser deserializes into a loose raw
//! shape first, then validates and converts it into [`Recipe`], so that
//! every structural problem is reported as a specific [`ParseError`] naming
//! the offending step.
//!
//! Documents whose anchors and aliases would expand recursively or
//! exponentially are rejected as [`ParseError::UnsafeDocument`] instead of
//! being expanded.

use super::model::{Recipe, Step, StepKind};
use crate::context::Value;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Default step timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Error raised when a recipe document is invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The document is not valid YAML or does not have the recipe shape.
    #[error("failed to parse recipe document: {0}")]
    Syntax(String),

    /// The document uses self-referential or exponentially expanding aliases.
    #[error("unsafe recipe document rejected: {0}")]
    UnsafeDocument(String),

    /// The recipe file could not be read.
    #[error("failed to read recipe file '{path}': {message}")]
    Io { path: String, message: String },

    /// The recipe declares no steps.
    #[error("recipe has no steps")]
    NoSteps,

    /// The `context` field is present but not a mapping.
    #[error("recipe context must be a mapping")]
    InvalidContext,

    /// A step has no id, or an empty one.
    #[error("step at position {0} has no id")]
    MissingStepId(usize),

    /// Two steps share an id.
    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    /// A step is missing a field required by its type.
    #[error("step '{step}' is missing required field '{field}'")]
    MissingField { step: String, field: &'static str },

    /// A step's `type` is not one of the supported types.
    #[error("step '{step}' has unknown type '{step_type}' (expected 'bash' or 'agent')")]
    UnknownStepType { step: String, step_type: String },

    /// A step's timeout is zero, negative, or not a number.
    #[error("step '{step}' has invalid timeout '{value}': must be a positive number of seconds")]
    InvalidTimeout { step: String, value: String },

    /// A step field has an invalid value.
    #[error("step '{step}': {message}")]
    InvalidField { step: String, message: String },
}

#[derive(Debug, Deserialize)]
struct RawRecipe {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    context: Option<serde_yaml::Value>,
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    id: Option<serde_yaml::Value>,
    #[serde(default, rename = "type")]
    step_type: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    timeout: Option<serde_yaml::Value>,
    #[serde(default)]
    working_dir: Option<String>,
}

/// Recipe parser.
#[derive(Debug, Clone)]
pub struct Parser {
    default_timeout: u64,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different timeout for steps that do not declare one.
    ///
    /// A zero value is replaced by [`DEFAULT_TIMEOUT_SECONDS`].
    pub fn with_default_timeout(mut self, seconds: u64) -> Self {
        self.default_timeout = if seconds == 0 {
            DEFAULT_TIMEOUT_SECONDS
        } else {
            seconds
        };
        self
    }

    /// Read and parse a recipe file.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Recipe, ParseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ParseError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.parse(&content)
    }

    /// Parse a recipe document.
    pub fn parse(&self, raw: &str) -> Result<Recipe, ParseError> {
        let raw_recipe: RawRecipe = serde_yaml::from_str(raw).map_err(classify_yaml_error)?;

        let context = match raw_recipe.context {
            None | Some(serde_yaml::Value::Null) => BTreeMap::new(),
            Some(value @ serde_yaml::Value::Mapping(_)) => match Value::from(value) {
                Value::Map(map) => map,
                _ => return Err(ParseError::InvalidContext),
            },
            Some(_) => return Err(ParseError::InvalidContext),
        };

        let raw_steps = raw_recipe.steps.unwrap_or_default();
        if raw_steps.is_empty() {
            return Err(ParseError::NoSteps);
        }

        let mut seen = HashSet::with_capacity(raw_steps.len());
        let mut steps = Vec::with_capacity(raw_steps.len());
        for (index, raw_step) in raw_steps.into_iter().enumerate() {
            let step = self.convert_step(index, raw_step)?;
            if !seen.insert(step.id.clone()) {
                return Err(ParseError::DuplicateStepId(step.id));
            }
            steps.push(step);
        }

        debug!(
            recipe = %raw_recipe.name,
            steps = steps.len(),
            "parsed recipe"
        );

        Ok(Recipe {
            name: raw_recipe.name,
            description: raw_recipe.description,
            version: raw_recipe.version,
            author: raw_recipe.author,
            tags: raw_recipe
                .tags
                .unwrap_or_default()
                .into_iter()
                .collect::<BTreeSet<_>>(),
            context,
            steps,
        })
    }

    fn convert_step(&self, index: usize, raw: RawStep) -> Result<Step, ParseError> {
        let id = raw
            .id
            .as_ref()
            .and_then(scalar_to_string)
            .filter(|id| !id.is_empty())
            .ok_or(ParseError::MissingStepId(index))?;

        let step_type = raw.step_type.ok_or_else(|| ParseError::MissingField {
            step: id.clone(),
            field: "type",
        })?;

        let kind = match step_type.as_str() {
            "bash" => StepKind::Bash {
                command: raw.command.ok_or_else(|| ParseError::MissingField {
                    step: id.clone(),
                    field: "command",
                })?,
                working_dir: raw.working_dir,
            },
            "agent" => {
                if raw.working_dir.is_some() {
                    return Err(ParseError::InvalidField {
                        step: id,
                        message: "'working_dir' is only supported on bash steps".to_string(),
                    });
                }
                StepKind::Agent {
                    agent: raw.agent.ok_or_else(|| ParseError::MissingField {
                        step: id.clone(),
                        field: "agent",
                    })?,
                    prompt: raw.prompt.ok_or_else(|| ParseError::MissingField {
                        step: id.clone(),
                        field: "prompt",
                    })?,
                }
            }
            other => {
                return Err(ParseError::UnknownStepType {
                    step: id,
                    step_type: other.to_string(),
                });
            }
        };

        if let Some(output) = &raw.output {
            if output.trim().is_empty() {
                return Err(ParseError::InvalidField {
                    step: id,
                    message: "'output' must name a context variable".to_string(),
                });
            }
            // Lookups split on dots, so a dotted name could never be read back.
            if output.contains('.') {
                return Err(ParseError::InvalidField {
                    step: id,
                    message: format!("'output' name '{}' must not contain '.'", output),
                });
            }
        }

        if let Some(condition) = &raw.condition
            && condition.trim().is_empty()
        {
            return Err(ParseError::InvalidField {
                step: id,
                message: "'condition' must not be empty".to_string(),
            });
        }

        let timeout = match &raw.timeout {
            None | Some(serde_yaml::Value::Null) => self.default_timeout,
            Some(value) => parse_timeout(&id, value)?,
        };

        Ok(Step {
            id,
            kind,
            output: raw.output,
            condition: raw.condition,
            timeout,
        })
    }
}

/// Parse a recipe document with default settings.
pub fn parse(raw: &str) -> Result<Recipe, ParseError> {
    Parser::new().parse(raw)
}

/// Map serde_yaml errors, separating alias-expansion attacks from ordinary
/// syntax problems.
fn classify_yaml_error(err: serde_yaml::Error) -> ParseError {
    let message = err.to_string();
    if message.contains("recursion limit exceeded") || message.contains("repetition limit exceeded")
    {
        ParseError::UnsafeDocument(message)
    } else {
        ParseError::Syntax(message)
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a timeout in seconds. Fractions round up to whole seconds; values
/// beyond `u64::MAX` saturate.
fn parse_timeout(step: &str, value: &serde_yaml::Value) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidTimeout {
        step: step.to_string(),
        value: match value {
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::String(s) => s.clone(),
            other => format!("{:?}", other),
        },
    };

    let serde_yaml::Value::Number(n) = value else {
        return Err(invalid());
    };

    if let Some(secs) = n.as_u64() {
        return if secs == 0 { Err(invalid()) } else { Ok(secs) };
    }
    if n.as_i64().is_some() {
        // Fits in i64 but not u64: negative.
        return Err(invalid());
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f > 0.0 => {
            let secs = f.ceil();
            if secs >= u64::MAX as f64 {
                Ok(u64::MAX)
            } else {
                Ok(secs as u64)
            }
        }
        Some(f) if f == f64::INFINITY => Ok(u64::MAX),
        _ => Err(invalid()),
    }
}
