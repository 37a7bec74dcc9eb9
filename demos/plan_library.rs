//! Library Service Planning Demo
//!
//! Walks one service through the analysis layer:
//! 1. HTTP request plans from `(google.api.http)` annotations
//! 2. Retry / size-limit tables from a gRPC service config
//! 3. What a rejected annotation looks like
//!
//! Run with: cargo run --example plan_library

use gapicgen_http::{parse_descriptor_set_json, plan_method, PathSegment, RequestBody};
use gapicgen_retry::ServiceConfig;

const DESCRIPTOR: &str = r#"{
  "file": [{
    "package": "google.example.library.v1",
    "service": [{
      "name": "LibraryService",
      "method": [
        {"name": "GetShelf", "inputType": ".google.example.library.v1.GetShelfRequest",
         "options": {"[google.api.http]": {"get": "/v1/{name}"}}},
        {"name": "UpdateBook", "inputType": ".google.example.library.v1.UpdateBookRequest",
         "options": {"[google.api.http]": {"patch": "/v1/{book.name}", "body": "book"}}},
        {"name": "MoveBook", "inputType": ".google.example.library.v1.MoveBookRequest",
         "options": {"[google.api.http]": {
           "post": "/v1/{name}:move", "body": "*",
           "additionalBindings": [{"post": "/v1/shelves/{shelf_id}/books/{book_id}:move", "body": "*"}]
         }}}
      ]
    }]
  }]
}"#;

const SERVICE_CONFIG: &str = r#"{
  "methodConfig": [
    {
      "name": [{"service": "google.example.library.v1.LibraryService"}],
      "retryPolicy": {"initialBackoff": "0.100s", "maxBackoff": "60s",
                      "backoffMultiplier": 1.3, "retryableStatusCodes": ["UNAVAILABLE"]}
    },
    {
      "name": [{"service": "google.example.library.v1.LibraryService", "method": "MoveBook"}],
      "retryPolicy": {"initialBackoff": "0.250s", "maxBackoff": "30s",
                      "backoffMultiplier": 2, "retryableStatusCodes": ["ABORTED"]},
      "maxRequestMessageBytes": 1048576
    }
  ]
}"#;

fn main() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           GAPICGEN LIBRARY PLANNING DEMO                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let set = match parse_descriptor_set_json(DESCRIPTOR) {
        Ok(set) => set,
        Err(err) => {
            eprintln!("descriptor: {err}");
            return;
        }
    };
    let services = match set.services() {
        Ok(services) => services,
        Err(err) => {
            eprintln!("descriptor: {err}");
            return;
        }
    };

    // ========================================================================
    // Step 1: HTTP request plans
    // ========================================================================

    println!("━━━ Step 1: Planning HTTP requests ━━━");
    println!();

    for service in &services {
        for method in &service.methods {
            match plan_method(method) {
                Ok(Some(plan)) => {
                    println!("  {}", plan.method);
                    for binding in &plan.bindings {
                        let fields: Vec<String> = binding
                            .template
                            .segments()
                            .iter()
                            .filter_map(|s| match s {
                                PathSegment::FieldRef(path) => Some(format!("req.{path}")),
                                PathSegment::Literal(_) => None,
                            })
                            .collect();
                        println!(
                            "    • {} {}  fields: [{}]",
                            binding.verb,
                            binding.pattern,
                            fields.join(", ")
                        );
                    }
                    let body = match &plan.body {
                        RequestBody::None => "none".to_string(),
                        RequestBody::Whole => "whole request".to_string(),
                        RequestBody::Field(path) => format!("req.{path}"),
                    };
                    println!("    body: {body}");
                }
                Ok(None) => println!("  {} (no http annotation)", method.fqn()),
                Err(err) => println!("  ✗ {err}"),
            }
        }
    }
    println!();

    // ========================================================================
    // Step 2: Retry tables
    // ========================================================================

    println!("━━━ Step 2: Resolving retry policies ━━━");
    println!();

    let config = match ServiceConfig::from_json(SERVICE_CONFIG) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("service config: {err}");
            return;
        }
    };

    for service in &services {
        let table = config.resolve_for(&service.fqn, &service.method_names());
        println!("  {} {}", service.fqn, table.fingerprint());
        for (fqn, policy) in &table.methods {
            if let Some(retry) = &policy.retry {
                println!(
                    "    • {fqn}: {}ms..{}ms x{} on {:?}",
                    retry.initial_backoff_ms,
                    retry.max_backoff_ms,
                    retry.backoff_multiplier,
                    retry.retryable_codes
                );
            }
            if let Some(limit) = policy.max_request_bytes {
                println!("      max request {limit} bytes");
            }
        }
    }
    println!();

    // ========================================================================
    // Step 3: Rejected annotations
    // ========================================================================

    println!("━━━ Step 3: Rejected annotations ━━━");
    println!();

    for pattern in ["/v1/{name=shelves/*}", "/v1/{parent/books", "/v1/{}"] {
        match gapicgen_http::compile_path_template(pattern) {
            Ok(template) => println!("  ✓ {template}"),
            Err(err) => println!("  ✗ {err}"),
        }
    }
    println!();
}
