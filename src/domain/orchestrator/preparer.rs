//! Request preparation - identity, config merging, endpoint policy,
//! candidate ordering

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::chat::{ChatRequest, PreparedRequest, ProviderConfig, ProviderOverrides};
use crate::domain::tenant::{ProviderDefaults, TenantConfig};
use crate::domain::GatewayError;

/// Maximum length for caller-supplied request identifiers
const MAX_REQUEST_ID_LENGTH: usize = 128;

/// Caller-supplied request ids: URL-safe, no whitespace, bounded length.
static REQUEST_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._:-]*$").unwrap());

/// Base URL shape: http(s) scheme, a host, optional port and path.
static BASE_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://([^/:?#\s]+|\[[0-9A-Fa-f:]+\])(:\d{1,5})?(/[^\s]*)?$").unwrap());

/// Hostnames that resolve to the local machine or a cloud metadata service.
const BLOCKED_HOSTS: &[&str] = &["localhost", "metadata", "metadata.google.internal"];

/// Validates and normalizes inbound requests into [`PreparedRequest`]s.
///
/// Preparation never mutates tenant configuration: every merge copies the
/// tenant's defaults field by field into a fresh map before overrides are
/// applied, so concurrent requests for the same tenant are isolated from
/// each other.
#[derive(Debug, Clone)]
pub struct RequestPreparer {
    default_timeout: Duration,
}

impl RequestPreparer {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Validate `request` against `tenant` and produce a prepared request.
    ///
    /// The effective request identifier is written back onto `request` so
    /// every downstream stage (logging, persistence, failover retries) shares
    /// one identity.
    pub fn prepare(
        &self,
        tenant: &TenantConfig,
        request: &mut ChatRequest,
    ) -> Result<PreparedRequest, GatewayError> {
        if request.input.trim().is_empty() {
            return Err(GatewayError::invalid_argument("input cannot be empty"));
        }

        let request_id = ensure_request_id(request)?;

        let candidates = select_candidates(tenant, request)?;

        let mut configs = HashMap::with_capacity(candidates.len());

        for name in &candidates {
            let defaults = tenant.defaults_for(name).ok_or_else(|| {
                GatewayError::internal(format!("tenant allows '{}' without defaults", name))
            })?;

            let config = merge_config(
                defaults,
                request.overrides.get(name),
                tenant.permissions().allow_base_url_override,
            )?;

            configs.insert(name.clone(), config);
        }

        let client_key = format!(
            "{}/{}",
            tenant.id(),
            request.client_id.as_deref().unwrap_or("default")
        );

        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        Ok(PreparedRequest {
            request_id,
            client_key,
            candidates,
            configs,
            context: Vec::new(),
            deadline: Instant::now() + timeout,
        })
    }
}

/// Validate the caller's request id, or generate one, and write the
/// effective value back onto the request.
fn ensure_request_id(request: &mut ChatRequest) -> Result<String, GatewayError> {
    let request_id = match request.request_id.as_deref() {
        Some(id) if !id.is_empty() => {
            if id.len() > MAX_REQUEST_ID_LENGTH || !REQUEST_ID_PATTERN.is_match(id) {
                return Err(GatewayError::invalid_argument(format!(
                    "invalid request id '{}'",
                    id
                )));
            }
            id.to_string()
        }
        _ => Uuid::new_v4().to_string(),
    };

    request.request_id = Some(request_id.clone());
    Ok(request_id)
}

/// Candidate providers: the tenant's allowed list filtered to the caller's
/// selection, in the tenant's priority order.
fn select_candidates(
    tenant: &TenantConfig,
    request: &ChatRequest,
) -> Result<Vec<String>, GatewayError> {
    let candidates: Vec<String> = tenant
        .allowed_providers()
        .iter()
        .filter(|name| match &request.providers {
            Some(selected) => selected.iter().any(|s| s == *name),
            None => true,
        })
        .cloned()
        .collect();

    if candidates.is_empty() {
        return Err(GatewayError::invalid_argument(
            "no candidate providers for this request",
        ));
    }

    Ok(candidates)
}

/// Copy tenant defaults into a fresh config, then apply caller overrides.
fn merge_config(
    defaults: &ProviderDefaults,
    overrides: Option<&ProviderOverrides>,
    allow_base_url_override: bool,
) -> Result<ProviderConfig, GatewayError> {
    let mut config = ProviderConfig {
        model: defaults.model.clone(),
        base_url: defaults.base_url.clone(),
        options: defaults.options.clone(),
    };

    let Some(overrides) = overrides else {
        return Ok(config);
    };

    if let Some(model) = &overrides.model {
        config.model = model.clone();
    }

    for (name, value) in &overrides.options {
        config.options.insert(name.clone(), value.clone());
    }

    if let Some(base_url) = &overrides.base_url {
        if !allow_base_url_override {
            return Err(GatewayError::permission_denied(
                "tenant does not allow base URL overrides",
            ));
        }

        validate_base_url(base_url)?;
        config.base_url = Some(base_url.clone());
    }

    Ok(config)
}

/// Reject URLs that would turn the gateway into a relay against internal
/// infrastructure: non-http(s) schemes, loopback, link-local, and metadata
/// service addresses.
fn validate_base_url(url: &str) -> Result<(), GatewayError> {
    let host = BASE_URL_PATTERN
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| GatewayError::invalid_argument(format!("malformed base URL '{}'", url)))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host_lower = host.to_ascii_lowercase();

    if BLOCKED_HOSTS.contains(&host_lower.as_str()) {
        return Err(GatewayError::invalid_argument(format!(
            "base URL host '{}' is not allowed",
            host
        )));
    }

    if let Ok(address) = host.parse::<IpAddr>() {
        let blocked = match address {
            IpAddr::V4(v4) => {
                v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
            }
            IpAddr::V6(v6) => {
                v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xffc0) == 0xfe80
            }
        };

        if blocked {
            return Err(GatewayError::invalid_argument(format!(
                "base URL address '{}' is not allowed",
                host
            )));
        }
    }

    Ok(())
}
