//! Chat Orchestrator
//!
//! A multi-tenant chat request orchestration engine:
//! - Non-mutating configuration merging across tenant defaults and caller
//!   overrides
//! - Ordered failover across interchangeable text-generation providers
//! - Cancellable streaming aggregation with a persistable final result
//! - Atomic admission control and endpoint-override gating
//! - Best-effort retrieval context injection
//!
//! The wire adapters per vendor, the retrieval pipeline, and durable storage
//! live behind the contracts in [`domain`]; reference in-memory
//! implementations are provided in [`infrastructure`].

pub mod config;
pub mod domain;
pub mod infrastructure;

use std::sync::Arc;

pub use config::AppConfig;
pub use domain::{ChatOrchestrator, GatewayError};

use domain::orchestrator::OrchestratorConfig;
use domain::{ProviderRegistry, RagRetriever, RateLimiter, TenantConfigResolver, ThreadStore};
use infrastructure::{InMemoryTenantRegistry, InMemoryThreadStore, SlidingWindowRateLimiter};

/// Collaborators for [`build_orchestrator`]; defaults are the in-memory
/// reference implementations.
pub struct OrchestratorBuilder {
    config: AppConfig,
    tenants: Option<Arc<dyn TenantConfigResolver>>,
    registry: ProviderRegistry,
    limiter: Option<Arc<dyn RateLimiter>>,
    store: Option<Arc<dyn ThreadStore>>,
    retriever: Option<Arc<dyn RagRetriever>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            tenants: None,
            registry: ProviderRegistry::new(),
            limiter: None,
            store: None,
            retriever: None,
        }
    }

    pub fn tenants(mut self, tenants: Arc<dyn TenantConfigResolver>) -> Self {
        self.tenants = Some(tenants);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn domain::Provider>) -> Self {
        self.registry.register(provider);
        self
    }

    pub fn limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn store(mut self, store: Arc<dyn ThreadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn RagRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn build(self) -> ChatOrchestrator {
        let tenants = self
            .tenants
            .unwrap_or_else(|| Arc::new(InMemoryTenantRegistry::new()));
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(SlidingWindowRateLimiter::new()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryThreadStore::new()));

        let orchestrator = ChatOrchestrator::new(
            tenants,
            Arc::new(self.registry),
            limiter,
            store,
            OrchestratorConfig::from(&self.config.engine),
        );

        match self.retriever {
            Some(retriever) => orchestrator.with_retriever(retriever),
            None => orchestrator,
        }
    }
}
