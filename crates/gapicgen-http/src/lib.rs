//! HTTP rule analysis for GAPIC generation (descriptor set → request plans).
//!
//! This crate is the semantic layer between an API descriptor and the text
//! emitter. It never emits code; it produces validated, structured data:
//!
//! - [`http_rule`]: reads `(google.api.http)` (primary rule + additional
//!   bindings) and checks the AIP-127 cross-binding rules
//! - [`path_template`]: compiles `"/v1/{parent}/books"` into literal and
//!   field-reference segments
//! - [`accessor`]: turns `{book.shelf_id}` into a list of field steps
//! - [`request_plan`]: per-method orchestration of the above
//!
//! Input is the descriptor set rendered as JSON (see [`descriptor`]).
//!
//! Not supported yet: resource-name patterns (`{name=shelves/*}`) and query
//! parameter extraction. Patterns using them fail loudly.

pub mod accessor;
pub mod descriptor;
pub mod http_rule;
pub mod path_template;
pub mod request_plan;

pub use accessor::{resolve_field_accessor, AccessorError, FieldAccessorPath};
pub use descriptor::{
    parse_descriptor_set_json, DescriptorError, FileDescriptorSetJson, MethodDescriptor,
    ServiceDescriptor,
};
pub use http_rule::{
    extract_http_bindings, HttpBindings, HttpRule, HttpRuleBinding, HttpRuleError, HttpVerb,
};
pub use path_template::{compile_path_template, PathSegment, PathTemplate, PathTemplateError};
pub use request_plan::{
    plan_method, resolve_request_body, CompiledBinding, MethodPlanError, PlanError,
    RequestBindingPlan, RequestBody,
};
