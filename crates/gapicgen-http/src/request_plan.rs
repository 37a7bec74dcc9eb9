//! Per-method request binding plan.
//!
//! Ties the pieces together for one method: extract the validated bindings,
//! compile every binding's path pattern (the first one drives primary request
//! construction) and resolve the body selector.

use crate::accessor::{resolve_field_accessor, AccessorError, FieldAccessorPath};
use crate::descriptor::MethodDescriptor;
use crate::http_rule::{extract_http_bindings, HttpRuleError, HttpVerb};
use crate::path_template::{compile_path_template, PathTemplate, PathTemplateError};
use serde::Serialize;
use thiserror::Error;

/// What the request body carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum RequestBody {
    /// `body: ""`
    None,
    /// `body: "*"`: the whole request message.
    Whole,
    /// `body: "field.path"`
    Field(FieldAccessorPath),
}

impl RequestBody {
    pub fn is_present(&self) -> bool {
        !matches!(self, RequestBody::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledBinding {
    pub verb: HttpVerb,
    pub pattern: String,
    pub template: PathTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestBindingPlan {
    pub method: String,
    pub request_type: String,
    /// Annotation order; the first entry is the primary binding.
    pub bindings: Vec<CompiledBinding>,
    pub body_selector: String,
    pub body: RequestBody,
}

impl RequestBindingPlan {
    pub fn primary(&self) -> Option<&CompiledBinding> {
        self.bindings.first()
    }

    pub fn alternates(&self) -> &[CompiledBinding] {
        self.bindings.get(1..).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("http annotation: {0}")]
    Annotation(#[from] HttpRuleError),

    #[error(transparent)]
    Path(#[from] PathTemplateError),

    #[error("in body {selector:?}: {source}")]
    Body {
        selector: String,
        source: AccessorError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("generating REST request for {method}: {source}")]
pub struct MethodPlanError {
    pub method: String,
    pub source: PlanError,
}

/// Resolve the body selector of a method's bindings.
pub fn resolve_request_body(selector: &str) -> Result<RequestBody, AccessorError> {
    match selector {
        "" => Ok(RequestBody::None),
        "*" => Ok(RequestBody::Whole),
        field => resolve_field_accessor(field).map(RequestBody::Field),
    }
}

/// Build the request binding plan for `method`.
///
/// Returns `Ok(None)` when the method has no HTTP annotation.
pub fn plan_method(method: &MethodDescriptor) -> Result<Option<RequestBindingPlan>, MethodPlanError> {
    plan_method_inner(method).map_err(|source| MethodPlanError {
        method: method.fqn(),
        source,
    })
}

fn plan_method_inner(method: &MethodDescriptor) -> Result<Option<RequestBindingPlan>, PlanError> {
    let extracted = extract_http_bindings(method)?;
    if extracted.is_empty() {
        tracing::debug!(method = %method.fqn(), "no http annotation");
        return Ok(None);
    }

    let mut bindings = Vec::with_capacity(extracted.bindings.len());
    for binding in &extracted.bindings {
        tracing::debug!(
            method = %method.name,
            verb = %binding.verb,
            pattern = %binding.path_pattern,
            "compiling binding"
        );
        bindings.push(CompiledBinding {
            verb: binding.verb,
            pattern: binding.path_pattern.clone(),
            template: compile_path_template(&binding.path_pattern)?,
        });
    }

    let body = resolve_request_body(&extracted.body).map_err(|source| PlanError::Body {
        selector: extracted.body.clone(),
        source,
    })?;

    Ok(Some(RequestBindingPlan {
        method: method.fqn(),
        request_type: method.input_type.clone(),
        bindings,
        body_selector: extracted.body,
        body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_rule::HttpRule;
    use crate::path_template::PathSegment;

    fn method(name: &str, rule: Option<HttpRule>) -> MethodDescriptor {
        MethodDescriptor {
            name: name.to_string(),
            service_fqn: "library.v1.Library".to_string(),
            input_type: format!("library.v1.{name}Request"),
            output_type: "library.v1.Book".to_string(),
            http_rule: rule,
        }
    }

    #[test]
    fn unannotated_method_has_no_plan() {
        assert_eq!(plan_method(&method("StreamBooks", None)), Ok(None));
    }

    #[test]
    fn plans_primary_and_alternate_bindings() {
        let mut rule = HttpRule::post("/v1/{parent}/books", "book");
        rule.additional_bindings.push(HttpRule {
            post: Some("/v1/shelves/{shelf_id}/books".to_string()),
            body: "book".to_string(),
            ..Default::default()
        });

        let plan = plan_method(&method("CreateBook", Some(rule)))
            .expect("plan")
            .expect("annotated");

        assert_eq!(plan.method, "library.v1.Library.CreateBook");
        assert_eq!(plan.request_type, "library.v1.CreateBookRequest");
        assert_eq!(plan.primary().map(|b| b.verb), Some(HttpVerb::Post));
        assert_eq!(plan.alternates().len(), 1);
        assert_eq!(plan.alternates()[0].template.field_refs().count(), 1);
        assert_eq!(plan.body_selector, "book");
        assert_eq!(
            plan.body,
            RequestBody::Field(resolve_field_accessor("book").expect("accessor"))
        );
    }

    #[test]
    fn resolves_body_kinds() {
        assert_eq!(resolve_request_body(""), Ok(RequestBody::None));
        assert_eq!(resolve_request_body("*"), Ok(RequestBody::Whole));
        assert!(resolve_request_body("book.shelf").expect("body").is_present());
        assert!(matches!(
            resolve_request_body("book=shelves/*"),
            Err(AccessorError::UnsupportedPattern { .. })
        ));
    }

    #[test]
    fn errors_carry_method_name() {
        let rule = HttpRule::get("/v1/{name=shelves/*/books/*}");
        let err = plan_method(&method("GetBook", Some(rule))).expect_err("should error");
        assert_eq!(err.method, "library.v1.Library.GetBook");
        assert!(matches!(err.source, PlanError::Path(_)));
        let msg = err.to_string();
        assert!(msg.contains("GetBook"), "msg={msg}");
        assert!(msg.contains("/v1/{name=shelves/*/books/*}"), "msg={msg}");
    }

    #[test]
    fn annotation_errors_are_wrapped() {
        let rule = HttpRule {
            delete: Some("/v1/{name}".to_string()),
            body: "*".to_string(),
            ..Default::default()
        };
        let err = plan_method(&method("DeleteBook", Some(rule))).expect_err("should error");
        assert!(matches!(
            err.source,
            PlanError::Annotation(HttpRuleError::UnexpectedBody { .. })
        ));
    }

    #[test]
    fn bad_body_selector_is_reported() {
        let rule = HttpRule::post("/v1/books", "book..title");
        let err = plan_method(&method("CreateBook", Some(rule))).expect_err("should error");
        match err.source {
            PlanError::Body { selector, .. } => assert_eq!(selector, "book..title"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn primary_template_matches_pattern() {
        let plan = plan_method(&method("GetBook", Some(HttpRule::get("/v1/{name}"))))
            .expect("plan")
            .expect("annotated");
        assert_eq!(
            plan.primary().expect("primary").template.segments(),
            &[
                PathSegment::Literal("/v1/".to_string()),
                PathSegment::FieldRef(resolve_field_accessor("name").expect("accessor")),
            ]
        );
        assert_eq!(plan.body, RequestBody::None);
    }

    #[test]
    fn hand_built_plan_without_bindings_has_no_primary() {
        let plan = RequestBindingPlan {
            method: "library.v1.Library.GetBook".to_string(),
            request_type: "library.v1.GetBookRequest".to_string(),
            bindings: Vec::new(),
            body_selector: String::new(),
            body: RequestBody::None,
        };
        assert!(plan.primary().is_none());
        assert!(plan.alternates().is_empty());
    }
}
