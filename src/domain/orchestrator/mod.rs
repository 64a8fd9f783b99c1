//! Request orchestration - preparation, failover, streaming, composition

mod failover;
mod preparer;
mod service;
mod stream;

pub use failover::{
    AggregatedFailure, FailoverExecutor, FailoverOutcome, FailureRecord, OpenedStream, RetryPacing,
};
pub use preparer::RequestPreparer;
pub use service::{ChatOrchestrator, ChatStream, OrchestratorConfig};
pub use stream::{StreamAggregator, StreamOutcome};
