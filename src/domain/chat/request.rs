use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Message;

/// Caller-supplied overrides for one candidate provider.
///
/// Applied on top of a fresh copy of the tenant's defaults during
/// preparation; never written back into tenant configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Only honored when the tenant's permission flag allows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

impl ProviderOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
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

/// Inbound "generate a reply" request, as handed over by the RPC layer.
///
/// Tenant identity is authenticated upstream and passed alongside, never
/// inside, this payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Optional caller-supplied identifier. After preparation this always
    /// holds the effective request id, generated if it was absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Caller identity within the tenant, used for admission control.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub input: String,
    #[serde(default)]
    pub history: Vec<Message>,
    /// Explicit provider selection; `None` means all allowed providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
    /// Per-provider overrides, keyed by provider name.
    #[serde(default)]
    pub overrides: HashMap<String, ProviderOverrides>,
    /// Overall request deadline; the engine default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ChatRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            request_id: None,
            client_id: None,
            input: input.into(),
            history: Vec::new(),
            providers: None,
            overrides: HashMap::new(),
            timeout_ms: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_providers(mut self, providers: Vec<String>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn with_override(
        mut self,
        provider: impl Into<String>,
        overrides: ProviderOverrides,
    ) -> Self {
        self.overrides.insert(provider.into(), overrides);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}
