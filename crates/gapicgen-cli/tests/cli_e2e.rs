use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;

const SERVICE: &str = "google.example.library.v1.LibraryService";

fn gapicgen_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gapicgen"))
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn run_json(args: &[&str]) -> Value {
    let output = Command::new(gapicgen_bin())
        .args(args)
        .output()
        .expect("run gapicgen");
    assert!(
        output.status.success(),
        "gapicgen {:?} failed:\n{}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn analyze_emits_plans_and_retry_table() {
    let descriptor = fixture("library_descriptor.json");
    let config = fixture("library_grpc_service_config.json");
    let report = run_json(&[
        "analyze",
        descriptor.to_str().expect("utf-8 path"),
        "--service-config",
        config.to_str().expect("utf-8 path"),
    ]);

    let services = report["services"].as_array().expect("services");
    assert_eq!(services.len(), 1);
    let svc = &services[0];
    assert_eq!(svc["service"], SERVICE);

    // Five annotated methods; StreamShelves has no binding.
    let plans = svc["plans"].as_array().expect("plans");
    assert_eq!(plans.len(), 5);

    let move_book = plans
        .iter()
        .find(|p| p["method"] == format!("{SERVICE}.MoveBook"))
        .expect("MoveBook plan");
    assert_eq!(move_book["bindings"].as_array().expect("bindings").len(), 2);
    assert_eq!(move_book["body"]["kind"], "whole");
    assert_eq!(
        move_book["bindings"][0]["template"],
        serde_json::json!([
            {"kind": "literal", "value": "/v1/"},
            {"kind": "field_ref", "value": ["name"]},
            {"kind": "literal", "value": ":move"}
        ])
    );

    let update = plans
        .iter()
        .find(|p| p["method"] == format!("{SERVICE}.UpdateBook"))
        .expect("UpdateBook plan");
    assert_eq!(update["bindings"][0]["verb"], "PATCH");
    assert_eq!(update["body"]["field"], serde_json::json!(["book"]));

    let retry = &svc["retry"]["methods"];
    // Override beats default for retry; limits resolve independently.
    let mv = &retry[format!("{SERVICE}.MoveBook")];
    assert_eq!(mv["retry"]["initial_backoff_ms"], 250);
    assert_eq!(mv["max_request_bytes"], 1_048_576);
    assert_eq!(mv["max_response_bytes"], 4_194_304);

    let get = &retry[format!("{SERVICE}.GetShelf")];
    assert_eq!(get["retry"]["initial_backoff_ms"], 100);
    assert_eq!(get["retry"]["retryable_codes"], serde_json::json!(["UNAVAILABLE"]));
    assert!(get.get("max_request_bytes").is_none());

    // Defaults reach every declared method, streaming ones included.
    assert!(retry.get(format!("{SERVICE}.StreamShelves")).is_some());

    let fingerprint = svc["retry_fingerprint"].as_str().expect("fingerprint");
    assert!(fingerprint.starts_with("sha256:"), "{fingerprint}");
}

#[test]
fn analyze_is_deterministic() {
    let descriptor = fixture("library_descriptor.json");
    let config = fixture("library_grpc_service_config.json");
    let args = [
        "analyze",
        descriptor.to_str().expect("utf-8 path"),
        "--service-config",
        config.to_str().expect("utf-8 path"),
    ];
    assert_eq!(run_json(&args), run_json(&args));
}

#[test]
fn http_filters_by_method() {
    let descriptor = fixture("library_descriptor.json");
    let method = format!("{SERVICE}.DeleteBook");
    let plans = run_json(&[
        "http",
        descriptor.to_str().expect("utf-8 path"),
        "--method",
        &method,
    ]);
    let plans = plans.as_array().expect("plans");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0]["bindings"][0]["verb"], "DELETE");
    assert_eq!(plans[0]["body"]["kind"], "none");
}

#[test]
fn retry_resolves_a_single_service() {
    let config = fixture("library_grpc_service_config.json");
    let table = run_json(&[
        "retry",
        config.to_str().expect("utf-8 path"),
        "--service",
        SERVICE,
        "--method",
        "GetShelf",
        "--method",
        "MoveBook",
    ]);
    assert_eq!(table["service"], SERVICE);
    let methods = table["methods"].as_object().expect("methods");
    assert!(methods.contains_key(&format!("{SERVICE}.GetShelf")));
    assert!(methods.contains_key(&format!("{SERVICE}.MoveBook")));
    // Overrides naming methods outside --method are still honored.
    assert!(methods.contains_key(&format!("{SERVICE}.UpdateBook")));
    assert!(!methods.contains_key(&format!("{SERVICE}.DeleteBook")));
}

#[test]
fn unsupported_resource_pattern_fails_the_run() {
    let descriptor = fixture("bad_binding_descriptor.json");
    let output = Command::new(gapicgen_bin())
        .args(["analyze", descriptor.to_str().expect("utf-8 path")])
        .output()
        .expect("run gapicgen");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "no partial output expected");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("name=shelves/*/books/*"), "stderr={stderr}");
    assert!(stderr.contains("GetBook"), "stderr={stderr}");
}

#[test]
fn summary_format_lists_bindings_and_policies() {
    let descriptor = fixture("library_descriptor.json");
    let config = fixture("library_grpc_service_config.json");
    let output = Command::new(gapicgen_bin())
        .env("NO_COLOR", "1")
        .args([
            "analyze",
            descriptor.to_str().expect("utf-8 path"),
            "--service-config",
            config.to_str().expect("utf-8 path"),
            "--format",
            "summary",
        ])
        .output()
        .expect("run gapicgen");
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("/v1/shelves/{shelf_id}/books/{book_id}:move"), "{text}");
    assert!(text.contains("field book"), "{text}");
    assert!(text.contains("max request 1048576B"), "{text}");
}

#[test]
fn retry_without_methods_warns() {
    let config = fixture("library_grpc_service_config.json");
    let output = Command::new(gapicgen_bin())
        .env("NO_COLOR", "1")
        .args([
            "retry",
            config.to_str().expect("utf-8 path"),
            "--service",
            SERVICE,
        ])
        .output()
        .expect("run gapicgen");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no --method given"), "stderr={stderr}");

    // Only the method-level entries survive; defaults had nothing to target.
    let table: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    let methods = table["methods"].as_object().expect("methods");
    assert!(!methods.contains_key(&format!("{SERVICE}.GetShelf")));
    assert!(methods.contains_key(&format!("{SERVICE}.MoveBook")));
}
