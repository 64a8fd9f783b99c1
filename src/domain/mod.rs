//! Domain layer - Core contracts and orchestration logic

pub mod chat;
pub mod error;
pub mod orchestrator;
pub mod persistence;
pub mod rate_limit;
pub mod retrieval;
pub mod tenant;

pub use chat::{
    ChatRequest, GeneratedFile, GenerationResult, Message, MessageRole, PreparedRequest, Provider,
    ProviderConfig, ProviderOverrides, ProviderRegistry, ReplyStream, StreamChunk, ToolInvocation,
    Usage,
};
pub use error::{ErrorClass, GatewayError};
pub use orchestrator::{
    AggregatedFailure, ChatOrchestrator, ChatStream, FailoverExecutor, FailoverOutcome,
    FailureRecord, OrchestratorConfig, RequestPreparer, RetryPacing, StreamAggregator,
};
pub use persistence::ThreadStore;
pub use rate_limit::{Admission, RateLimitConfig, RateLimiter};
pub use retrieval::{RagRetriever, ScoredPassage};
pub use tenant::{
    ProviderDefaults, TenantConfig, TenantConfigResolver, TenantId, TenantPermissions,
    TenantValidationError,
};
