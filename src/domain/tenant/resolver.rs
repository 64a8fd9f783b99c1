//! Tenant configuration resolver trait

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use super::{TenantConfig, TenantId};
use crate::domain::GatewayError;

/// Resolve a tenant identifier to an immutable configuration snapshot.
///
/// Returned snapshots are shared `Arc`s: safe to read from any number of
/// concurrent requests, replaced wholesale when a tenant is reconfigured.
#[async_trait]
pub trait TenantConfigResolver: Send + Sync + Debug {
    async fn resolve(&self, tenant_id: &TenantId) -> Result<Arc<TenantConfig>, GatewayError>;
}
