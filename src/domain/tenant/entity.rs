//! Tenant configuration entities

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_identifier, TenantValidationError};
use crate::domain::rate_limit::RateLimitConfig;

/// Tenant identifier - alphanumeric + hyphens, max 50 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a new TenantId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, TenantValidationError> {
        let id = id.into();
        validate_identifier(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default call parameters for one provider within a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDefaults {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

impl ProviderDefaults {
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

/// Permission flags controlling what callers of a tenant may override.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TenantPermissions {
    /// Whether callers may point a provider at a non-default network
    /// endpoint. Gated because an open override turns the gateway into a
    /// relay against arbitrary hosts.
    #[serde(default)]
    pub allow_base_url_override: bool,
}

impl TenantPermissions {
    pub fn allow_base_url_override() -> Self {
        Self {
            allow_base_url_override: true,
        }
    }
}

/// Immutable snapshot of one tenant's configuration.
///
/// Loaded at registration time and replaced wholesale on change; readers hold
/// `Arc` snapshots and never observe field-level mutation. The stored
/// defaults are copied, never aliased, during request preparation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    id: TenantId,
    /// Allowed providers in failover priority order.
    allowed_providers: Vec<String>,
    provider_defaults: HashMap<String, ProviderDefaults>,
    permissions: TenantPermissions,
    rate_limit: RateLimitConfig,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantConfig {
    pub fn new(id: TenantId) -> Self {
        let now = Utc::now();
        Self {
            id,
            allowed_providers: Vec::new(),
            provider_defaults: HashMap::new(),
            permissions: TenantPermissions::default(),
            rate_limit: RateLimitConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an allowed provider with its defaults; priority follows call
    /// order.
    pub fn with_provider(mut self, name: impl Into<String>, defaults: ProviderDefaults) -> Self {
        let name = name.into();
        self.allowed_providers.push(name.clone());
        self.provider_defaults.insert(name, defaults);
        self
    }

    pub fn with_permissions(mut self, permissions: TenantPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Check structural invariants: at least one allowed provider, valid
    /// provider names, defaults present for every allowed provider.
    pub fn validate(&self) -> Result<(), TenantValidationError> {
        if self.allowed_providers.is_empty() {
            return Err(TenantValidationError::NoAllowedProviders);
        }

        for provider in &self.allowed_providers {
            validate_identifier(provider)?;

            if !self.provider_defaults.contains_key(provider) {
                return Err(TenantValidationError::MissingProviderDefaults {
                    provider: provider.clone(),
                });
            }
        }

        Ok(())
    }

    // Getters

    pub fn id(&self) -> &TenantId {
        &self.id
    }

    pub fn allowed_providers(&self) -> &[String] {
        &self.allowed_providers
    }

    pub fn defaults_for(&self, provider: &str) -> Option<&ProviderDefaults> {
        self.provider_defaults.get(provider)
    }

    pub fn permissions(&self) -> &TenantPermissions {
        &self.permissions
    }

    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.rate_limit
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_valid() {
        let id = TenantId::new("acme-corp").unwrap();
        assert_eq!(id.as_str(), "acme-corp");
    }

    #[test]
    fn test_tenant_id_invalid() {
        assert!(TenantId::new("acme corp!").is_err());
    }

    #[test]
    fn test_tenant_config_builder() {
        let config = TenantConfig::new(TenantId::new("acme").unwrap())
            .with_provider("openai", ProviderDefaults::new("gpt-4"))
            .with_provider("anthropic", ProviderDefaults::new("claude-3-opus"))
            .with_permissions(TenantPermissions::allow_base_url_override());

        assert_eq!(config.allowed_providers(), &["openai", "anthropic"]);
        assert_eq!(config.defaults_for("openai").unwrap().model, "gpt-4");
        assert!(config.permissions().allow_base_url_override);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_providers() {
        let config = TenantConfig::new(TenantId::new("acme").unwrap());
        assert_eq!(
            config.validate(),
            Err(TenantValidationError::NoAllowedProviders)
        );
    }

    #[test]
    fn test_validate_requires_defaults() {
        let mut config = TenantConfig::new(TenantId::new("acme").unwrap())
            .with_provider("openai", ProviderDefaults::new("gpt-4"));
        config.allowed_providers.push("anthropic".to_string());

        assert!(matches!(
            config.validate(),
            Err(TenantValidationError::MissingProviderDefaults { .. })
        ));
    }
}
