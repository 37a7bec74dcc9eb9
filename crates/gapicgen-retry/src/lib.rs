//! gRPC service config → per-method retry and size-limit policies.
//!
//! Pipeline:
//! 1. Load the `methodConfig` table ([`ServiceConfig::from_json`])
//! 2. Resolve one service's table ([`resolve_retry_policies`])
//!
//! `maxAttempts` is parsed but ignored; backoff durations are carried in
//! milliseconds.

pub mod retry;
pub mod service_config;
pub mod status;

pub use retry::{
    resolve_retry_policies, ConfigEntry, MethodName, MethodPolicy, RetryPolicy, RetryPolicyTable,
    Slot, Tier,
};
pub use service_config::{parse_duration_millis, ServiceConfig, ServiceConfigError};
pub use status::StatusCode;

