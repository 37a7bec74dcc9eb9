//! Retry / size-limit policy resolution.
//!
//! A service config lists entries that apply either to one method
//! (`{service, method}`) or to every method of a service (`{service}` only).
//! Each of the three policy fields resolves independently:
//!
//! 1. the **last** method-level entry that sets the field, else
//! 2. the **first** service-level entry that sets the field, else
//! 3. absent.
//!
//! The scan is a left fold over the entries in declaration order. Order within
//! one tier matters; order between tiers does not.

use crate::status::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodName {
    pub service: String,
    /// Empty for a service-level default.
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub retryable_codes: BTreeSet<StatusCode>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

/// One `methodConfig` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigEntry {
    pub names: Vec<MethodName>,
    pub retry_policy: Option<RetryPolicy>,
    pub max_request_bytes: Option<u64>,
    pub max_response_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_request_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_bytes: Option<u64>,
}

impl MethodPolicy {
    pub fn is_empty(&self) -> bool {
        self.retry.is_none() && self.max_request_bytes.is_none() && self.max_response_bytes.is_none()
    }
}

// =============================================================================
// Per-field precedence
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    ServiceDefault,
    MethodOverride,
}

/// Resolution state of one field of one method.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<T> {
    default: Option<T>,
    overridden: Option<T>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            default: None,
            overridden: None,
        }
    }
}

impl<T> Slot<T> {
    /// Offer a value from an entry of `tier`. `None` leaves the slot untouched.
    pub fn merge(self, tier: Tier, value: Option<T>) -> Self {
        let Slot {
            default,
            overridden,
        } = self;
        let Some(value) = value else {
            return Slot {
                default,
                overridden,
            };
        };
        match tier {
            Tier::ServiceDefault => Slot {
                default: default.or(Some(value)),
                overridden,
            },
            Tier::MethodOverride => Slot {
                default,
                overridden: Some(value),
            },
        }
    }

    pub fn resolve(self) -> Option<T> {
        self.overridden.or(self.default)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct MethodSlots {
    retry: Slot<RetryPolicy>,
    max_request_bytes: Slot<u64>,
    max_response_bytes: Slot<u64>,
}

impl MethodSlots {
    fn merge(self, tier: Tier, entry: &ConfigEntry) -> Self {
        Self {
            retry: self.retry.merge(tier, entry.retry_policy.clone()),
            max_request_bytes: self.max_request_bytes.merge(tier, entry.max_request_bytes),
            max_response_bytes: self.max_response_bytes.merge(tier, entry.max_response_bytes),
        }
    }

    fn resolve(self) -> MethodPolicy {
        MethodPolicy {
            retry: self.retry.resolve(),
            max_request_bytes: self.max_request_bytes.resolve(),
            max_response_bytes: self.max_response_bytes.resolve(),
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// Resolved policies of one service, keyed by `service.Method`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicyTable {
    pub service: String,
    pub methods: BTreeMap<String, MethodPolicy>,
}

impl RetryPolicyTable {
    pub fn get(&self, method_fqn: &str) -> Option<&MethodPolicy> {
        self.methods.get(method_fqn)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Stable digest of the table contents (`sha256:<16 hex>`).
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        let mut out = String::from("sha256:");
        for b in digest[..8].iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

/// Resolve the policies of `service_fqn` from the ordered config entries.
///
/// `methods` are the method names declared on the service; service-level
/// defaults apply to exactly these. Method-level entries naming an undeclared
/// method are still honored.
pub fn resolve_retry_policies(
    service_fqn: &str,
    methods: &[String],
    entries: &[ConfigEntry],
) -> RetryPolicyTable {
    let slots = entries
        .iter()
        .enumerate()
        .fold(BTreeMap::new(), |acc, (idx, entry)| {
            entry
                .names
                .iter()
                .filter(|name| name.service == service_fqn)
                .fold(acc, |acc, name| apply_name(acc, idx, entry, name, methods))
        });

    let methods = slots
        .into_iter()
        .map(|(fqn, slots)| (fqn, slots.resolve()))
        .filter(|(_, policy)| !policy.is_empty())
        .collect();

    RetryPolicyTable {
        service: service_fqn.to_string(),
        methods,
    }
}

fn apply_name(
    mut acc: BTreeMap<String, MethodSlots>,
    idx: usize,
    entry: &ConfigEntry,
    name: &MethodName,
    methods: &[String],
) -> BTreeMap<String, MethodSlots> {
    let (tier, targets): (Tier, Vec<&str>) = if name.method.is_empty() {
        (Tier::ServiceDefault, methods.iter().map(String::as_str).collect())
    } else {
        if !methods.iter().any(|m| m == &name.method) {
            tracing::warn!(
                entry = idx,
                service = %name.service,
                method = %name.method,
                "method config names a method not declared on the service"
            );
        }
        (Tier::MethodOverride, vec![name.method.as_str()])
    };

    tracing::debug!(entry = idx, ?tier, targets = targets.len(), "applying method config");
    for method in targets {
        let fqn = format!("{}.{}", name.service, method);
        let slots = acc.remove(&fqn).unwrap_or_default();
        acc.insert(fqn, slots.merge(tier, entry));
    }
    acc
}
