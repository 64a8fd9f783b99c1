use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::domain::retrieval::ScoredPassage;

/// Resolved per-request parameters for one provider call.
///
/// Invariant: `options` is always a fresh copy produced by the merge in
/// preparation, never the same map instance as any tenant's stored defaults,
/// so concurrent requests for one tenant cannot observe each other's
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: None,
            options: HashMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }
}

/// A validated, normalized request ready for execution.
///
/// Owned exclusively by the orchestrating call; discarded once the result is
/// delivered.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Effective request identifier, also written back onto the inbound
    /// request so every later stage shares one identity.
    pub request_id: String,
    /// Normalized admission-control key (`tenant/client`).
    pub client_key: String,
    /// Candidate providers in the tenant's priority order.
    pub candidates: Vec<String>,
    /// Per-candidate resolved configuration.
    pub configs: HashMap<String, ProviderConfig>,
    /// Context passages injected by retrieval; may be empty.
    pub context: Vec<ScoredPassage>,
    pub deadline: Instant,
}

impl PreparedRequest {
    pub fn config_for(&self, provider: &str) -> Option<&ProviderConfig> {
        self.configs.get(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_builder() {
        let config = ProviderConfig::new("gpt-4")
            .with_base_url("https://eu.gateway.example.com/v1")
            .with_option("temperature", serde_json::json!(0.7));

        assert_eq!(config.model, "gpt-4");
        assert_eq!(
            config.base_url.as_deref(),
            Some("https://eu.gateway.example.com/v1")
        );
        assert_eq!(config.options.len(), 1);
    }
}
