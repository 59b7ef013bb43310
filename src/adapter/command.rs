//! Agent command templates.
//!
//! An agent step is run by invoking an external agent CLI. The command line
//! is configured as a template, split into arguments with shell quoting rules
//! when the template is created, and rendered per step:
//!
//! - `{agent}` - the agent reference (`namespace:name`)
//! - `{instructions}` - the resolved agent definition text
//! - `{prompt}` - the rendered step prompt
//! - `{{` / `}}` - literal braces
//!
//! Values are substituted into already-split arguments, so a prompt containing
//! quotes, spaces or shell metacharacters is always passed as a single argument
//! and never interpreted by a shell.

use std::collections::HashMap;
use thiserror::Error;

/// Default agent CLI invocation.
pub const DEFAULT_AGENT_COMMAND: &str =
    "claude --print --append-system-prompt {instructions} {prompt}";

/// Variables an agent command template may reference.
pub const COMMAND_VARIABLES: &[&str] = &["agent", "instructions", "prompt"];

/// Error raised for an invalid agent command template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A variable was referenced that is not one of [`COMMAND_VARIABLES`].
    #[error("undefined variable '{name}' at position {position} in template")]
    UndefinedVariable { name: String, position: usize },

    /// A `{` was found without a matching `}`.
    #[error("unmatched '{{' at position {position} in template")]
    UnmatchedBrace { position: usize },

    /// An empty variable name was found (e.g., `{}`).
    #[error("empty variable name '{{}}' at position {position} in template")]
    EmptyVariableName { position: usize },

    /// The template could not be split into arguments.
    #[error("cannot split command template: {0}")]
    Split(String),

    /// The template has no program to run.
    #[error("command template is empty")]
    EmptyCommand,
}

/// A validated agent command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    template: String,
    args: Vec<String>,
}

impl Default for AgentCommand {
    fn default() -> Self {
        Self {
            template: DEFAULT_AGENT_COMMAND.to_string(),
            args: DEFAULT_AGENT_COMMAND
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl AgentCommand {
    /// Parse and validate a command template.
    ///
    /// Every argument is checked against [`COMMAND_VARIABLES`] here, so a
    /// typo in configuration fails at load time rather than mid-recipe.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let args = shell_words::split(template).map_err(|e| TemplateError::Split(e.to_string()))?;
        if args.is_empty() {
            return Err(TemplateError::EmptyCommand);
        }

        let probe = variables("", "", "");
        for arg in &args {
            render_template(arg, &probe)?;
        }

        Ok(Self {
            template: template.to_string(),
            args,
        })
    }

    /// The template as configured.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the program and its arguments for one invocation.
    pub fn render(
        &self,
        agent: &str,
        instructions: &str,
        prompt: &str,
    ) -> Result<(String, Vec<String>), TemplateError> {
        let vars = variables(agent, instructions, prompt);
        let mut rendered = self
            .args
            .iter()
            .map(|arg| render_template(arg, &vars))
            .collect::<Result<Vec<_>, _>>()?;
        let program = rendered.remove(0);
        Ok((program, rendered))
    }
}

fn variables<'a>(
    agent: &'a str,
    instructions: &'a str,
    prompt: &'a str,
) -> HashMap<&'static str, &'a str> {
    HashMap::from([
        ("agent", agent),
        ("instructions", instructions),
        ("prompt", prompt),
    ])
}

/// Substitute `{name}` placeholders in a single argument.
fn render_template(
    template: &str,
    variables: &HashMap<&str, &str>,
) -> Result<String, TemplateError> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if let Some((_, '{')) = chars.peek() {
                    chars.next();
                    result.push('{');
                    continue;
                }

                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => name.push(c),
                        None => return Err(TemplateError::UnmatchedBrace { position: pos }),
                    }
                }

                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyVariableName { position: pos });
                }
                match variables.get(name) {
                    Some(value) => result.push_str(value),
                    None => {
                        return Err(TemplateError::UndefinedVariable {
                            name: name.to_string(),
                            position: pos,
                        });
                    }
                }
            }
            '}' => {
                // `}}` collapses to one brace; a lone `}` is kept as-is.
                if let Some((_, '}')) = chars.peek() {
                    chars.next();
                }
                result.push('}');
            }
            _ => result.push(ch),
        }
    }

    Ok(result)
}
