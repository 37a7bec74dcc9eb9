//! Field accessor resolution for path variables and body selectors.
//!
//! A variable such as `{book.author_id}` names a (possibly nested) field of the
//! request message. We turn the dotted expression into a language-neutral list
//! of field-name steps; naming conventions for the generated getter chain are
//! left to the emitter.
//!
//! Resource-name patterns (`{name=projects/*/books/*}`) are **not** supported
//! yet and are rejected explicitly rather than being dropped.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Ordered, non-empty traversal from the request root to a leaf field.
///
/// Deserialization re-validates every step, so a decoded path upholds the same
/// invariants as one produced by [`resolve_field_accessor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldAccessorPath(Vec<String>);

impl FieldAccessorPath {
    pub fn steps(&self) -> &[String] {
        &self.0
    }

    /// The top-level request field the traversal starts from.
    pub fn root(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_nested(&self) -> bool {
        self.0.len() > 1
    }
}

impl TryFrom<Vec<String>> for FieldAccessorPath {
    type Error = AccessorError;

    fn try_from(steps: Vec<String>) -> Result<Self, Self::Error> {
        let variable = steps.join(".");
        if steps.is_empty() {
            return Err(AccessorError::EmptyFieldName { variable });
        }
        validate_steps(&variable, steps.iter().map(String::as_str))?;
        Ok(FieldAccessorPath(steps))
    }
}

impl From<FieldAccessorPath> for Vec<String> {
    fn from(path: FieldAccessorPath) -> Self {
        path.0
    }
}

impl fmt::Display for FieldAccessorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessorError {
    #[error("in variable {variable:?}: multiple \"=\"")]
    MalformedVariable { variable: String },

    #[error(
        "in variable {variable:?}: resource name pattern checking not implemented yet: {pattern:?}"
    )]
    UnsupportedPattern { variable: String, pattern: String },

    #[error("in variable {variable:?}: no field name provided")]
    EmptyFieldName { variable: String },

    #[error("in variable {variable:?}: invalid field name segment {step:?}")]
    InvalidFieldStep { variable: String, step: String },
}

impl AccessorError {
    /// The full variable text the error was raised for.
    pub fn variable(&self) -> &str {
        match self {
            AccessorError::MalformedVariable { variable }
            | AccessorError::UnsupportedPattern { variable, .. }
            | AccessorError::EmptyFieldName { variable }
            | AccessorError::InvalidFieldStep { variable, .. } => variable,
        }
    }
}

fn field_step_regex() -> &'static Regex {
    static FIELD_STEP: OnceLock<Regex> = OnceLock::new();
    FIELD_STEP.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("field step regex is valid")
    })
}

fn validate_steps<'a>(
    variable: &str,
    steps: impl IntoIterator<Item = &'a str>,
) -> Result<(), AccessorError> {
    let re = field_step_regex();
    match steps.into_iter().find(|step| !re.is_match(step)) {
        Some(step) => Err(AccessorError::InvalidFieldStep {
            variable: variable.to_string(),
            step: step.to_string(),
        }),
        None => Ok(()),
    }
}

/// Resolve a variable expression (`field`, `a.b.c`, `field=pattern`) into an
/// accessor path.
pub fn resolve_field_accessor(expression: &str) -> Result<FieldAccessorPath, AccessorError> {
    let parts: Vec<&str> = expression.split('=').collect();
    if parts.len() > 2 {
        return Err(AccessorError::MalformedVariable {
            variable: expression.to_string(),
        });
    }

    let field_name = parts[0];
    let value_pattern = parts.get(1).copied().unwrap_or("");

    if !value_pattern.is_empty() {
        return Err(AccessorError::UnsupportedPattern {
            variable: expression.to_string(),
            pattern: value_pattern.to_string(),
        });
    }

    if field_name.is_empty() {
        return Err(AccessorError::EmptyFieldName {
            variable: expression.to_string(),
        });
    }

    validate_steps(expression, field_name.split('.'))?;
    let steps: Vec<String> = field_name.split('.').map(str::to_string).collect();

    tracing::trace!(variable = expression, steps = steps.len(), "resolved field accessor");
    Ok(FieldAccessorPath(steps))
}
