//! Context retrieval contract
//!
//! Retrieval is a best-effort collaborator: the orchestrator injects whatever
//! it returns and proceeds without context on error or empty results.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;
use crate::domain::GatewayError;

/// A ranked context passage returned by retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ScoredPassage {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Retrieval over a tenant-scoped corpus.
#[async_trait]
pub trait RagRetriever: Send + Sync + Debug {
    /// Return up to `limit` passages ranked by relevance; may be empty.
    /// Implementations must respect the caller's deadline.
    async fn retrieve(
        &self,
        tenant: &TenantId,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ScoredPassage>, GatewayError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passage_builder() {
        let passage = ScoredPassage::new("Rust ships editions", 0.92).with_source("handbook.md");
        assert_eq!(passage.score, 0.92);
        assert_eq!(passage.source.as_deref(), Some("handbook.md"));
    }
}
