//! Service analysis: descriptor set + service config → emitter directives.
//!
//! For every selected service we plan each method's HTTP request and resolve
//! the service's retry table. The first failure aborts the whole run; there is
//! no partial output.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use gapicgen_http::{
    plan_method, FileDescriptorSetJson, PathSegment, RequestBindingPlan, RequestBody,
    ServiceDescriptor,
};
use gapicgen_retry::{RetryPolicyTable, ServiceConfig};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceDirectives {
    pub service: String,
    pub methods: Vec<String>,
    /// Only methods carrying an HTTP annotation have a plan.
    pub plans: Vec<RequestBindingPlan>,
    pub retry: RetryPolicyTable,
    pub retry_fingerprint: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub services: Vec<ServiceDirectives>,
}

pub fn analyze_service(
    service: &ServiceDescriptor,
    config: &ServiceConfig,
) -> Result<ServiceDirectives> {
    let mut plans = Vec::new();
    for method in &service.methods {
        if let Some(plan) = plan_method(method)? {
            plans.push(plan);
        }
    }

    let methods = service.method_names();
    let retry = config.resolve_for(&service.fqn, &methods);
    let retry_fingerprint = retry.fingerprint();

    tracing::info!(
        service = %service.fqn,
        methods = methods.len(),
        plans = plans.len(),
        policies = retry.len(),
        "analyzed service"
    );

    Ok(ServiceDirectives {
        service: service.fqn.clone(),
        methods,
        plans,
        retry,
        retry_fingerprint,
    })
}

/// Analyze the services of `set`, restricted to `only` when non-empty.
pub fn analyze_descriptor_set(
    set: &FileDescriptorSetJson,
    config: &ServiceConfig,
    only: &[String],
) -> Result<AnalysisReport> {
    let services = set.services()?;

    for wanted in only {
        if !services.iter().any(|s| &s.fqn == wanted) {
            return Err(anyhow!("service {wanted:?} not found in descriptor set"));
        }
    }

    let mut report = AnalysisReport::default();
    for service in services
        .iter()
        .filter(|s| only.is_empty() || only.contains(&s.fqn))
    {
        let directives = analyze_service(service, config)
            .with_context(|| format!("analyzing service {}", service.fqn))?;
        report.services.push(directives);
    }
    Ok(report)
}

pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();
    for svc in &report.services {
        let _ = writeln!(
            out,
            "{} {} ({} methods, {} http, {} policies) {}",
            "service".green().bold(),
            svc.service,
            svc.methods.len(),
            svc.plans.len(),
            svc.retry.len(),
            svc.retry_fingerprint.dimmed()
        );

        for plan in &svc.plans {
            let _ = writeln!(out, "  {} {}", "→".cyan(), plan.method);
            for (i, binding) in plan.bindings.iter().enumerate() {
                let role = if i == 0 { "primary" } else { "alternate" };
                let _ = writeln!(
                    out,
                    "      {:<9} {:<6} {}  [{}]",
                    role,
                    binding.verb.to_string(),
                    binding.pattern,
                    describe_segments(binding.template.segments())
                );
            }
            let body = match &plan.body {
                RequestBody::None => "none".to_string(),
                RequestBody::Whole => "whole request".to_string(),
                RequestBody::Field(path) => format!("field {path}"),
            };
            let _ = writeln!(out, "      body      {body}");
        }

        for (fqn, policy) in &svc.retry.methods {
            let mut parts = Vec::new();
            if let Some(rp) = &policy.retry {
                let codes: Vec<&str> = rp.retryable_codes.iter().map(|c| c.as_str()).collect();
                parts.push(format!(
                    "retry on [{}] backoff {}ms..{}ms x{:.2}",
                    codes.join(", "),
                    rp.initial_backoff_ms,
                    rp.max_backoff_ms,
                    rp.backoff_multiplier
                ));
            }
            if let Some(n) = policy.max_request_bytes {
                parts.push(format!("max request {n}B"));
            }
            if let Some(n) = policy.max_response_bytes {
                parts.push(format!("max response {n}B"));
            }
            let _ = writeln!(out, "  {} {}: {}", "⟳".yellow(), fqn, parts.join("; "));
        }
    }
    out
}

fn describe_segments(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(|s| match s {
            PathSegment::Literal(text) => format!("{text:?}"),
            PathSegment::FieldRef(path) => format!("req.{path}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapicgen_http::parse_descriptor_set_json;

    const DESCRIPTOR: &str = r#"{
      "file": [{
        "package": "library.v1",
        "service": [
          {
            "name": "Library",
            "method": [
              {"name": "GetBook", "inputType": ".library.v1.GetBookRequest",
               "options": {"[google.api.http]": {"get": "/v1/{name}"}}},
              {"name": "Watch", "inputType": ".library.v1.WatchRequest"}
            ]
          },
          {
            "name": "Admin",
            "method": [
              {"name": "Purge", "inputType": ".library.v1.PurgeRequest",
               "options": {"[google.api.http]": {"delete": "/v1/{name=shelves/*}"}}}
            ]
          }
        ]
      }]
    }"#;

    #[test]
    fn analyzes_selected_service() {
        let set = parse_descriptor_set_json(DESCRIPTOR).expect("parse");
        let config = ServiceConfig::from_json(
            r#"{"methodConfig": [{"name": [{"service": "library.v1.Library"}],
                "maxResponseMessageBytes": 1024}]}"#,
        )
        .expect("config");

        let report = analyze_descriptor_set(&set, &config, &["library.v1.Library".to_string()])
            .expect("analyze");
        assert_eq!(report.services.len(), 1);

        let svc = &report.services[0];
        assert_eq!(svc.methods, vec!["GetBook", "Watch"]);
        assert_eq!(svc.plans.len(), 1);
        assert_eq!(svc.retry.len(), 2);
        assert_eq!(svc.retry_fingerprint, svc.retry.fingerprint());

        let summary = render_summary(&report);
        assert!(summary.contains("library.v1.Library.GetBook"), "{summary}");
        assert!(summary.contains("max response 1024B"), "{summary}");
    }

    #[test]
    fn one_bad_service_fails_the_run() {
        let set = parse_descriptor_set_json(DESCRIPTOR).expect("parse");
        let err = analyze_descriptor_set(&set, &ServiceConfig::default(), &[])
            .expect_err("should error");
        let msg = format!("{err:#}");
        assert!(msg.contains("library.v1.Admin"), "{msg}");
        assert!(msg.contains("resource name pattern"), "{msg}");
    }

    #[test]
    fn unknown_service_filter_is_an_error() {
        let set = parse_descriptor_set_json(DESCRIPTOR).expect("parse");
        let err = analyze_descriptor_set(&set, &ServiceConfig::default(), &["nope.Svc".to_string()])
            .expect_err("should error");
        assert!(err.to_string().contains("nope.Svc"));
    }
}
