//! gRPC service config (`grpc.service_config.ServiceConfig`) loading.
//!
//! Only the `methodConfig` entries matter here. The JSON document is parsed
//! into a raw model first and then converted into typed [`ConfigEntry`] values;
//! malformed shapes (bad durations, unknown status codes, negative limits) are
//! hard errors rather than being treated as absent.

use crate::retry::{resolve_retry_policies, ConfigEntry, MethodName, RetryPolicy, RetryPolicyTable};
use crate::status::StatusCode;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceConfigError {
    #[error("failed to parse service config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("methodConfig[{entry}]: invalid {field} {value:?}: {reason}")]
    InvalidDuration {
        entry: usize,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("methodConfig[{entry}]: backoffMultiplier {value} must be finite and non-negative")]
    InvalidMultiplier { entry: usize, value: f64 },
}

// =============================================================================
// Raw JSON model
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfigJson {
    #[serde(default, alias = "method_config")]
    pub method_config: Vec<MethodConfigJson>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodConfigJson {
    #[serde(default)]
    pub name: Vec<MethodNameJson>,
    #[serde(default, alias = "retry_policy")]
    pub retry_policy: Option<RetryPolicyJson>,
    #[serde(
        default,
        alias = "max_request_message_bytes",
        deserialize_with = "deserialize_limit"
    )]
    pub max_request_message_bytes: Option<u64>,
    #[serde(
        default,
        alias = "max_response_message_bytes",
        deserialize_with = "deserialize_limit"
    )]
    pub max_response_message_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodNameJson {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub method: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicyJson {
    /// Accepted in any JSON shape and never consulted.
    #[serde(default, alias = "max_attempts")]
    pub max_attempts: Option<serde::de::IgnoredAny>,
    #[serde(default, alias = "initial_backoff")]
    pub initial_backoff: Option<String>,
    #[serde(default, alias = "max_backoff")]
    pub max_backoff: Option<String>,
    #[serde(default, alias = "backoff_multiplier")]
    pub backoff_multiplier: Option<f64>,
    #[serde(default, alias = "retryable_status_codes")]
    pub retryable_status_codes: Vec<StatusCode>,
}

/// Wrapper types render as a bare number, or as a decimal string for 64-bit values.
#[derive(Deserialize)]
#[serde(untagged)]
enum LimitRepr {
    Number(u64),
    Text(String),
}

fn deserialize_limit<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LimitRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(LimitRepr::Number(n)) => Ok(Some(n)),
        Some(LimitRepr::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid size limit {s:?}: {e}"))),
    }
}

// =============================================================================
// Typed config
// =============================================================================

/// The ordered `methodConfig` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceConfig {
    pub entries: Vec<ConfigEntry>,
}

impl ServiceConfig {
    pub fn from_json(text: &str) -> Result<Self, ServiceConfigError> {
        let raw: ServiceConfigJson = serde_json::from_str(text)?;
        Self::from_raw(&raw)
    }

    pub fn from_raw(raw: &ServiceConfigJson) -> Result<Self, ServiceConfigError> {
        let mut entries = Vec::with_capacity(raw.method_config.len());
        for (idx, mc) in raw.method_config.iter().enumerate() {
            entries.push(config_entry(idx, mc)?);
        }
        tracing::debug!(entries = entries.len(), "loaded service config");
        Ok(Self { entries })
    }

    /// Resolve the table for one service of this config.
    pub fn resolve_for(&self, service_fqn: &str, methods: &[String]) -> RetryPolicyTable {
        resolve_retry_policies(service_fqn, methods, &self.entries)
    }
}

fn config_entry(idx: usize, mc: &MethodConfigJson) -> Result<ConfigEntry, ServiceConfigError> {
    let names = mc
        .name
        .iter()
        .map(|n| MethodName {
            service: n.service.clone(),
            method: n.method.clone(),
        })
        .collect();

    let retry_policy = match &mc.retry_policy {
        Some(rp) => Some(retry_policy(idx, rp)?),
        None => None,
    };

    Ok(ConfigEntry {
        names,
        retry_policy,
        max_request_bytes: mc.max_request_message_bytes,
        max_response_bytes: mc.max_response_message_bytes,
    })
}

fn retry_policy(idx: usize, rp: &RetryPolicyJson) -> Result<RetryPolicy, ServiceConfigError> {
    let duration = |field: &'static str, value: &Option<String>| -> Result<u64, ServiceConfigError> {
        match value {
            None => Ok(0),
            Some(v) => parse_duration_millis(v).map_err(|reason| ServiceConfigError::InvalidDuration {
                entry: idx,
                field,
                value: v.clone(),
                reason,
            }),
        }
    };

    let backoff_multiplier = rp.backoff_multiplier.unwrap_or(0.0);
    if !backoff_multiplier.is_finite() || backoff_multiplier < 0.0 {
        return Err(ServiceConfigError::InvalidMultiplier {
            entry: idx,
            value: backoff_multiplier,
        });
    }

    Ok(RetryPolicy {
        retryable_codes: rp.retryable_status_codes.iter().copied().collect::<BTreeSet<_>>(),
        initial_backoff_ms: duration("initialBackoff", &rp.initial_backoff)?,
        max_backoff_ms: duration("maxBackoff", &rp.max_backoff)?,
        backoff_multiplier,
    })
}

/// Parse a protobuf JSON duration (`"1.5s"`, `"0.100s"`, `"60s"`) into whole
/// milliseconds. Sub-millisecond remainders are truncated.
pub fn parse_duration_millis(text: &str) -> Result<u64, String> {
    let Some(number) = text.trim().strip_suffix('s') else {
        return Err("expected a seconds value ending in 's'".to_string());
    };
    if number.starts_with('-') {
        return Err("negative durations are not allowed".to_string());
    }

    let (secs, frac) = match number.split_once('.') {
        Some((s, f)) => (s, f),
        None => (number, ""),
    };
    if secs.is_empty() && frac.is_empty() {
        return Err("missing seconds".to_string());
    }
    if !secs.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err("not a decimal number".to_string());
    }
    if frac.len() > 9 {
        return Err("more than nanosecond precision".to_string());
    }

    let secs: u64 = if secs.is_empty() {
        0
    } else {
        secs.parse().map_err(|e| format!("{e}"))?
    };
    let millis_frac: u64 = {
        let mut digits: String = frac.chars().take(3).collect();
        while digits.len() < 3 {
            digits.push('0');
        }
        digits.parse().map_err(|e| format!("{e}"))?
    };

    secs.checked_mul(1000)
        .and_then(|ms| ms.checked_add(millis_frac))
        .ok_or_else(|| "duration overflows".to_string())
}
