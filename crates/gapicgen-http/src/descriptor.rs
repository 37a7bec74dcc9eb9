//! Descriptor set JSON (subset) and the method view used by the analysis.
//!
//! We read the JSON rendering of a `google.protobuf.FileDescriptorSet` (as
//! produced by `buf build --as-file-descriptor-set`). Extension options are
//! rendered with bracketed keys:
//!
//! ```json
//! { "[google.api.http]": { "get": "/v1/{name}" } }
//! ```
//!
//! so the HTTP rule can be read without an extension-aware protobuf runtime.

use crate::http_rule::HttpRule;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Option key carrying the transport-binding annotation.
pub const HTTP_RULE_OPTION: &str = "[google.api.http]";

pub type OptionsJson = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to parse descriptor set JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("method {method}: malformed [google.api.http] option: {source}")]
    HttpAnnotation {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("service in file {file:?} has no name")]
    UnnamedService { file: String },

    #[error("service {service}: method has no name")]
    UnnamedMethod { service: String },
}

// =============================================================================
// Descriptor JSON (subset)
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileDescriptorSetJson {
    #[serde(default)]
    pub file: Vec<FileDescriptorProtoJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileDescriptorProtoJson {
    pub name: Option<String>,
    pub package: Option<String>,
    #[serde(default)]
    pub service: Vec<ServiceDescriptorProtoJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDescriptorProtoJson {
    pub name: Option<String>,
    #[serde(default)]
    pub method: Vec<MethodDescriptorProtoJson>,
    #[serde(default)]
    pub options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodDescriptorProtoJson {
    pub name: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "outputType")]
    pub output_type: Option<String>,
    #[serde(default)]
    pub options: Option<OptionsJson>,
}

pub fn parse_descriptor_set_json(text: &str) -> Result<FileDescriptorSetJson, DescriptorError> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// Analysis view
// =============================================================================

/// A method as seen by the analysis layer. Read-only input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    /// Fully-qualified owning service (`package.Service`).
    pub service_fqn: String,
    pub input_type: String,
    pub output_type: String,
    pub http_rule: Option<HttpRule>,
}

impl MethodDescriptor {
    /// `package.Service.Method`
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.service_fqn, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub fqn: String,
    pub methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn method_names(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.name.clone()).collect()
    }
}

impl FileDescriptorSetJson {
    /// All services across all files, in declaration order.
    pub fn services(&self) -> Result<Vec<ServiceDescriptor>, DescriptorError> {
        let mut out = Vec::new();
        for file in &self.file {
            let package = file.package.clone().unwrap_or_default();
            for svc in &file.service {
                let Some(name) = svc.name.clone() else {
                    return Err(DescriptorError::UnnamedService {
                        file: file.name.clone().unwrap_or_else(|| "<unknown>".to_string()),
                    });
                };
                let fqn = qualify_name(&package, &name);

                let mut methods = Vec::with_capacity(svc.method.len());
                for m in &svc.method {
                    methods.push(method_descriptor(&fqn, m)?);
                }

                out.push(ServiceDescriptor { name, fqn, methods });
            }
        }
        Ok(out)
    }
}

fn method_descriptor(
    service_fqn: &str,
    m: &MethodDescriptorProtoJson,
) -> Result<MethodDescriptor, DescriptorError> {
    let Some(name) = m.name.clone() else {
        return Err(DescriptorError::UnnamedMethod {
            service: service_fqn.to_string(),
        });
    };

    let http_rule = match m.options.as_ref().and_then(|o| o.get(HTTP_RULE_OPTION)) {
        Some(v) => Some(serde_json::from_value::<HttpRule>(v.clone()).map_err(|source| {
            DescriptorError::HttpAnnotation {
                method: format!("{service_fqn}.{name}"),
                source,
            }
        })?),
        None => None,
    };

    Ok(MethodDescriptor {
        name,
        service_fqn: service_fqn.to_string(),
        input_type: trim_type_name(m.input_type.as_deref()),
        output_type: trim_type_name(m.output_type.as_deref()),
        http_rule,
    })
}

fn trim_type_name(name: Option<&str>) -> String {
    name.unwrap_or_default().trim_start_matches('.').to_string()
}

fn qualify_name(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}
