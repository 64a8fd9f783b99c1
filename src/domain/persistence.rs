//! Thread persistence contract

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::chat::GenerationResult;
use crate::domain::GatewayError;

/// Store for completed generations, keyed by request identifier.
///
/// `upsert_thread` is idempotent on the request id: an internally retried
/// persistence call must not create a duplicate thread entry. Persistence
/// failures never convert an already-produced reply into a caller-visible
/// error; the orchestrator logs them and returns the reply anyway.
#[async_trait]
pub trait ThreadStore: Send + Sync + Debug {
    async fn upsert_thread(
        &self,
        request_id: &str,
        result: &GenerationResult,
    ) -> Result<(), GatewayError>;
}
