//! Agent definition resolution.
//!
//! Agent steps name their agent as `namespace:agent-name`. The resolver maps
//! that reference to a definition file under one of several search roots:
//!
//! ```text
//! <root>/<namespace>/<category>/<agent-name>.<ext>
//! <root>/<namespace>/<agent-name>.<ext>
//! ```
//!
//! Roots are searched in order and the first match wins, so a project-local
//! root listed first shadows shared definitions.
//!
//! Both reference segments are checked against `[A-Za-z0-9_-]+` before any
//! filesystem access. A candidate whose real path (after following symlinks)
//! lies outside its search root is reported as not found.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};


/// Allowed characters for a namespace or agent name.
static SEGMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid agent segment regex"));

/// Definition file extensions, in preference order.
pub const DEFINITION_EXTENSIONS: &[&str] = &["md", "yaml", "yml", "txt"];

/// Error raised when an agent reference cannot be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The reference is malformed or contains disallowed characters.
    /// Raised before any filesystem access.
    #[error("invalid agent reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// No definition exists, or the only candidate escapes its search root.
    #[error("agent '{reference}' not found")]
    NotFound { reference: String },

    /// The definition file is not valid UTF-8.
    #[error("agent '{reference}' definition is not valid UTF-8")]
    Decode { reference: String },

    /// The definition file exists but could not be read.
    #[error("failed to read agent '{reference}': {message}")]
    Io { reference: String, message: String },
}

/// A validated `namespace:agent-name` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentReference {
    pub namespace: String,
    pub name: String,
}

impl AgentReference {
    /// Validate and split a reference. Performs no I/O.
    pub fn parse(reference: &str) -> Result<Self, ResolveError> {
        let invalid = |reason: &str| ResolveError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let (namespace, name) = reference
            .split_once(':')
            .ok_or_else(|| invalid("expected 'namespace:agent-name'"))?;

        if !SEGMENT_REGEX.is_match(namespace) {
            return Err(invalid(
                "namespace may only contain letters, digits, '-' and '_'",
            ));
        }
        if !SEGMENT_REGEX.is_match(name) {
            return Err(invalid(
                "agent name may only contain letters, digits, '-' and '_'",
            ));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for AgentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Resolves agent references against an ordered list of search roots.
#[derive(Debug, Clone, Default)]
pub struct AgentResolver {
    search_paths: Vec<PathBuf>,
}

impl AgentResolver {
    pub fn new<I, P>(search_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Resolve a reference to the agent definition text.
    pub fn resolve(&self, reference: &str) -> Result<String, ResolveError> {
        let path = self.locate(reference)?;

        let bytes = fs::read(&path).map_err(|e| ResolveError::Io {
            reference: reference.to_string(),
            message: e.kind().to_string(),
        })?;

        String::from_utf8(bytes).map_err(|_| ResolveError::Decode {
            reference: reference.to_string(),
        })
    }

    /// Find the real path of the definition file for a reference.
    pub fn locate(&self, reference: &str) -> Result<PathBuf, ResolveError> {
        let parsed = AgentReference::parse(reference)?;
        let not_found = || ResolveError::NotFound {
            reference: reference.to_string(),
        };

        for root in &self.search_paths {
            let Ok(root_real) = root.canonicalize() else {
                debug!(root = %root.display(), "skipping missing agent search root");
                continue;
            };

            let Some(candidate) = find_candidate(&root_real, &parsed) else {
                continue;
            };

            let Ok(real) = candidate.canonicalize() else {
                return Err(not_found());
            };
            if !real.starts_with(&root_real) || !real.is_file() {
                warn!(
                    reference = %parsed,
                    "agent definition resolves outside its search root"
                );
                return Err(not_found());
            }

            debug!(reference = %parsed, path = %real.display(), "resolved agent");
            return Ok(real);
        }

        Err(not_found())
    }
}

/// First existing candidate file under a root, checking the namespace
/// directory itself before its category subdirectories (sorted by name).
fn find_candidate(root: &Path, reference: &AgentReference) -> Option<PathBuf> {
    let namespace_dir = root.join(&reference.namespace);
    if !namespace_dir.is_dir() {
        return None;
    }

    if let Some(found) = candidate_in(&namespace_dir, &reference.name) {
        return Some(found);
    }

    let mut categories: Vec<PathBuf> = fs::read_dir(&namespace_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    categories.sort();

    categories
        .iter()
        .find_map(|category| candidate_in(category, &reference.name))
}

fn candidate_in(dir: &Path, name: &str) -> Option<PathBuf> {
    DEFINITION_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|path| path.is_file() || path.is_symlink())
}
