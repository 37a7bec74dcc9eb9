//! `google.api.http` rule extraction (AIP-127).
//!
//! A method carries one primary rule plus zero or more `additional_bindings`.
//! We flatten them into one ordered list and check the cross-binding rules:
//!
//! - every binding must name a supported verb,
//! - all bindings must agree on `body`,
//! - GET and DELETE must not declare a body.

use crate::descriptor::MethodDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Annotation (input)
// =============================================================================

/// The `google.api.http` annotation as rendered in descriptor-set JSON.
///
/// The verb is a protobuf oneof, so at most one of `get`/`put`/`post`/`delete`/
/// `patch`/`custom` is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomHttpPattern>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default, alias = "response_body", skip_serializing_if = "String::is_empty")]
    pub response_body: String,
    #[serde(
        default,
        alias = "additional_bindings",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub additional_bindings: Vec<HttpRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHttpPattern {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub path: String,
}

/// The verb oneof of a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpPattern<'a> {
    Get(&'a str),
    Put(&'a str),
    Post(&'a str),
    Delete(&'a str),
    Patch(&'a str),
    Custom(&'a CustomHttpPattern),
    Unset,
    /// More than one verb set on the same rule.
    Ambiguous(usize),
}

impl HttpRule {
    pub fn get(path: &str) -> Self {
        Self {
            get: Some(path.to_string()),
            ..Default::default()
        }
    }

    pub fn post(path: &str, body: &str) -> Self {
        Self {
            post: Some(path.to_string()),
            body: body.to_string(),
            ..Default::default()
        }
    }

    pub fn pattern(&self) -> HttpPattern<'_> {
        let mut set: Vec<HttpPattern<'_>> = Vec::new();
        if let Some(p) = &self.get {
            set.push(HttpPattern::Get(p));
        }
        if let Some(p) = &self.put {
            set.push(HttpPattern::Put(p));
        }
        if let Some(p) = &self.post {
            set.push(HttpPattern::Post(p));
        }
        if let Some(p) = &self.delete {
            set.push(HttpPattern::Delete(p));
        }
        if let Some(p) = &self.patch {
            set.push(HttpPattern::Patch(p));
        }
        if let Some(c) = &self.custom {
            set.push(HttpPattern::Custom(c));
        }
        match set.len() {
            0 => HttpPattern::Unset,
            1 => set[0],
            n => HttpPattern::Ambiguous(n),
        }
    }

    /// Compact JSON rendering of this rule alone (without its additional
    /// bindings), used in diagnostics.
    fn describe(&self) -> String {
        let shallow = HttpRule {
            additional_bindings: Vec::new(),
            ..self.clone()
        };
        serde_json::to_string(&shallow).unwrap_or_else(|_| format!("{shallow:?}"))
    }
}

// =============================================================================
// Bindings (output)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
        }
    }

    /// AIP-127: GET and DELETE carry no request body.
    pub fn allows_body(self) -> bool {
        !matches!(self, HttpVerb::Get | HttpVerb::Delete)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRuleBinding {
    pub verb: HttpVerb,
    pub path_pattern: String,
    /// Empty means "no body".
    pub body_selector: String,
}

/// All validated bindings of one method, in annotation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpBindings {
    pub bindings: Vec<HttpRuleBinding>,
    pub body: String,
}

impl HttpBindings {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The binding used for primary request construction.
    pub fn primary(&self) -> Option<&HttpRuleBinding> {
        self.bindings.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpRuleError {
    #[error("unhandled http method in binding #{index} ({reason}): {binding}")]
    UnhandledVerb {
        index: usize,
        reason: String,
        binding: String,
    },

    #[error("inconsistent body annotations {first:?} and {second:?}")]
    InconsistentBody { first: String, second: String },

    #[error("unexpected body definition for {verb} method: {body:?}")]
    UnexpectedBody { verb: HttpVerb, body: String },
}

/// Extract and validate every HTTP binding declared on `method`.
///
/// Methods without an annotation yield an empty [`HttpBindings`].
pub fn extract_http_bindings(method: &MethodDescriptor) -> Result<HttpBindings, HttpRuleError> {
    let Some(rule) = &method.http_rule else {
        return Ok(HttpBindings::default());
    };
    extract_from_rule(rule)
}

pub fn extract_from_rule(rule: &HttpRule) -> Result<HttpBindings, HttpRuleError> {
    let rules = std::iter::once(rule).chain(rule.additional_bindings.iter());

    let mut bindings = Vec::new();
    let mut body: Option<&str> = None;

    for (index, rule) in rules.enumerate() {
        let (verb, path) = match rule.pattern() {
            HttpPattern::Get(p) => (HttpVerb::Get, p),
            HttpPattern::Put(p) => (HttpVerb::Put, p),
            HttpPattern::Post(p) => (HttpVerb::Post, p),
            HttpPattern::Delete(p) => (HttpVerb::Delete, p),
            HttpPattern::Patch(p) => (HttpVerb::Patch, p),
            other => {
                let reason = match other {
                    HttpPattern::Custom(c) => format!("custom verb {:?}", c.kind),
                    HttpPattern::Ambiguous(n) => format!("{n} verbs set"),
                    _ => "no verb set".to_string(),
                };
                return Err(HttpRuleError::UnhandledVerb {
                    index,
                    reason,
                    binding: rule.describe(),
                });
            }
        };

        let candidate = rule.body.as_str();
        match body {
            Some(established) if established != candidate => {
                return Err(HttpRuleError::InconsistentBody {
                    first: established.to_string(),
                    second: candidate.to_string(),
                });
            }
            Some(_) => {}
            None => body = Some(candidate),
        }

        if !verb.allows_body() && !candidate.is_empty() {
            return Err(HttpRuleError::UnexpectedBody {
                verb,
                body: candidate.to_string(),
            });
        }

        tracing::debug!(index, verb = %verb, path, "http binding");
        bindings.push(HttpRuleBinding {
            verb,
            path_pattern: path.to_string(),
            body_selector: candidate.to_string(),
        });
    }

    Ok(HttpBindings {
        bindings,
        body: body.unwrap_or_default().to_string(),
    })
}
