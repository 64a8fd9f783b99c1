//! In-memory tenant configuration registry

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::tenant::{TenantConfig, TenantConfigResolver, TenantId};
use crate::domain::GatewayError;

/// Registry of tenant configuration snapshots.
///
/// `publish` validates and replaces the whole `Arc<TenantConfig>`; there is
/// no field-level mutation, so concurrent readers either see the old snapshot
/// or the new one, never a half-updated config.
#[derive(Debug, Default)]
pub struct InMemoryTenantRegistry {
    tenants: RwLock<HashMap<TenantId, Arc<TenantConfig>>>,
}

impl InMemoryTenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and install (or wholesale-replace) a tenant configuration.
    pub async fn publish(&self, config: TenantConfig) -> Result<(), GatewayError> {
        config
            .validate()
            .map_err(|error| GatewayError::invalid_argument(error.to_string()))?;

        self.tenants
            .write()
            .await
            .insert(config.id().clone(), Arc::new(config));

        Ok(())
    }

    /// Remove a tenant. Returns whether it existed.
    pub async fn remove(&self, tenant_id: &TenantId) -> bool {
        self.tenants.write().await.remove(tenant_id).is_some()
    }
}

#[async_trait]
impl TenantConfigResolver for InMemoryTenantRegistry {
    async fn resolve(&self, tenant_id: &TenantId) -> Result<Arc<TenantConfig>, GatewayError> {
        self.tenants
            .read()
            .await
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| {
                GatewayError::invalid_argument(format!("unknown tenant '{}'", tenant_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tenant::ProviderDefaults;

    fn config(model: &str) -> TenantConfig {
        TenantConfig::new(TenantId::new("acme").unwrap())
            .with_provider("openai", ProviderDefaults::new(model))
    }

    #[tokio::test]
    async fn test_publish_and_resolve() {
        let registry = InMemoryTenantRegistry::new();
        registry.publish(config("gpt-4")).await.unwrap();

        let tenant_id = TenantId::new("acme").unwrap();
        let resolved = registry.resolve(&tenant_id).await.unwrap();
        assert_eq!(resolved.defaults_for("openai").unwrap().model, "gpt-4");
    }

    #[tokio::test]
    async fn test_publish_replaces_whole_snapshot() {
        let registry = InMemoryTenantRegistry::new();
        let tenant_id = TenantId::new("acme").unwrap();

        registry.publish(config("gpt-4")).await.unwrap();
        let old = registry.resolve(&tenant_id).await.unwrap();

        registry.publish(config("gpt-4-turbo")).await.unwrap();
        let new = registry.resolve(&tenant_id).await.unwrap();

        // The old snapshot is untouched; readers holding it are unaffected.
        assert_eq!(old.defaults_for("openai").unwrap().model, "gpt-4");
        assert_eq!(new.defaults_for("openai").unwrap().model, "gpt-4-turbo");
        assert!(!Arc::ptr_eq(&old, &new));
    }

    #[tokio::test]
    async fn test_unknown_tenant_rejected() {
        let registry = InMemoryTenantRegistry::new();
        let result = registry.resolve(&TenantId::new("ghost").unwrap()).await;
        assert!(matches!(result, Err(GatewayError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let registry = InMemoryTenantRegistry::new();
        let empty = TenantConfig::new(TenantId::new("acme").unwrap());
        assert!(registry.publish(empty).await.is_err());
    }
}
