//! In-memory thread store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::chat::GenerationResult;
use crate::domain::persistence::ThreadStore;
use crate::domain::GatewayError;

/// Reference [`ThreadStore`] backed by a map keyed on request id.
#[derive(Debug, Default)]
pub struct InMemoryThreadStore {
    threads: RwLock<HashMap<String, GenerationResult>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, request_id: &str) -> Option<GenerationResult> {
        self.threads.read().await.get(request_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn upsert_thread(
        &self,
        request_id: &str,
        result: &GenerationResult,
    ) -> Result<(), GatewayError> {
        self.threads
            .write()
            .await
            .insert(request_id.to_string(), result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_request_id() {
        let store = InMemoryThreadStore::new();

        let first = GenerationResult::new("draft").with_request_id("req-1");
        store.upsert_thread("req-1", &first).await.unwrap();

        // An internally retried persistence call replaces, never duplicates.
        let second = GenerationResult::new("final").with_request_id("req-1");
        store.upsert_thread("req-1", &second).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("req-1").await.unwrap().text, "final");
    }

    #[tokio::test]
    async fn test_missing_request_id_is_none() {
        let store = InMemoryThreadStore::new();
        assert!(store.get("missing").await.is_none());
        assert!(store.is_empty().await);
    }
}
