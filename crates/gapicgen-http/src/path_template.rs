//! URL path template compilation.
//!
//! `"/v1/{parent}/books/{book_id}"` compiles to
//!
//! ```text
//! Literal("/v1/"), FieldRef(parent), Literal("/books/"), FieldRef(book_id)
//! ```
//!
//! Variables are delimited by `{` and the next `}`. Braces must balance and may
//! not nest; malformed input is rejected with the byte offset of the offending
//! brace instead of being tokenized as literal text.

use crate::accessor::{resolve_field_accessor, AccessorError, FieldAccessorPath};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PathSegment {
    Literal(String),
    FieldRef(FieldAccessorPath),
}

/// A compiled path pattern. May be empty when the pattern itself is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathTemplate {
    segments: Vec<PathSegment>,
}

impl PathTemplate {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn field_refs(&self) -> impl Iterator<Item = &FieldAccessorPath> {
        self.segments.iter().filter_map(|s| match s {
            PathSegment::FieldRef(path) => Some(path),
            PathSegment::Literal(_) => None,
        })
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                PathSegment::Literal(text) => f.write_str(text)?,
                PathSegment::FieldRef(path) => write!(f, "{{{path}}}")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathTemplateError {
    #[error("in pattern {pattern:?}: unclosed '{{' at byte {offset}")]
    UnclosedBrace { pattern: String, offset: usize },

    #[error("in pattern {pattern:?}: unexpected '}}' at byte {offset}")]
    StrayBrace { pattern: String, offset: usize },

    #[error("in pattern {pattern:?}: nested '{{' at byte {offset}")]
    NestedBrace { pattern: String, offset: usize },

    #[error("in pattern {pattern:?}: {source}")]
    Variable {
        pattern: String,
        source: AccessorError,
    },
}

impl PathTemplateError {
    pub fn pattern(&self) -> &str {
        match self {
            PathTemplateError::UnclosedBrace { pattern, .. }
            | PathTemplateError::StrayBrace { pattern, .. }
            | PathTemplateError::NestedBrace { pattern, .. }
            | PathTemplateError::Variable { pattern, .. } => pattern,
        }
    }

    /// The accessor failure behind a variable error, if any.
    pub fn accessor_error(&self) -> Option<&AccessorError> {
        match self {
            PathTemplateError::Variable { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Variable(&'a str),
}

fn tokenize(pattern: &str) -> Result<Vec<Token<'_>>, PathTemplateError> {
    let mut tokens = Vec::new();
    let mut open: Option<usize> = None;
    let mut literal_start = 0;

    for (i, c) in pattern.char_indices() {
        match c {
            '{' => {
                if open.is_some() {
                    return Err(PathTemplateError::NestedBrace {
                        pattern: pattern.to_string(),
                        offset: i,
                    });
                }
                if literal_start < i {
                    tokens.push(Token::Literal(&pattern[literal_start..i]));
                }
                open = Some(i);
            }
            '}' => {
                let Some(start) = open.take() else {
                    return Err(PathTemplateError::StrayBrace {
                        pattern: pattern.to_string(),
                        offset: i,
                    });
                };
                tokens.push(Token::Variable(&pattern[start + 1..i]));
                literal_start = i + 1;
            }
            _ => {}
        }
    }

    if let Some(offset) = open {
        return Err(PathTemplateError::UnclosedBrace {
            pattern: pattern.to_string(),
            offset,
        });
    }
    if literal_start < pattern.len() {
        tokens.push(Token::Literal(&pattern[literal_start..]));
    }
    Ok(tokens)
}

/// Compile one path pattern into literal and field-reference segments.
pub fn compile_path_template(pattern: &str) -> Result<PathTemplate, PathTemplateError> {
    let mut segments = Vec::new();
    for token in tokenize(pattern)? {
        match token {
            Token::Literal(text) => segments.push(PathSegment::Literal(text.to_string())),
            Token::Variable(variable) => {
                let path = resolve_field_accessor(variable).map_err(|source| {
                    PathTemplateError::Variable {
                        pattern: pattern.to_string(),
                        source,
                    }
                })?;
                segments.push(PathSegment::FieldRef(path));
            }
        }
    }
    tracing::debug!(pattern, segments = segments.len(), "compiled path template");
    Ok(PathTemplate { segments })
}
