//! Chat orchestration façade
//!
//! Composes preparation, admission control, best-effort context injection,
//! failover execution, streaming aggregation, and persistence for both call
//! shapes. One logical task per request; the only shared mutable state is
//! behind the rate limiter.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::failover::{FailoverExecutor, FailureRecord, RetryPacing};
use super::preparer::RequestPreparer;
use super::stream::StreamAggregator;
use crate::domain::chat::{
    ChatRequest, GenerationResult, Message, PreparedRequest, ProviderRegistry, StreamChunk,
};
use crate::domain::persistence::ThreadStore;
use crate::domain::rate_limit::{Admission, RateLimiter};
use crate::domain::retrieval::{RagRetriever, ScoredPassage};
use crate::domain::tenant::{TenantConfig, TenantConfigResolver, TenantId};
use crate::domain::GatewayError;

/// Engine tuning knobs, shared by both call shapes.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-candidate attempt timeout.
    pub attempt_timeout: Duration,
    /// Overall request deadline when the caller does not supply one.
    pub request_timeout: Duration,
    /// Bound of the consumer-facing chunk channel (backpressure).
    pub stream_buffer: usize,
    /// Maximum passages requested from retrieval.
    pub retrieval_limit: u32,
    /// Budget for the best-effort retrieval call.
    pub retrieval_timeout: Duration,
    /// Delay curve between failover attempts.
    pub pacing: RetryPacing,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            stream_buffer: 32,
            retrieval_limit: 5,
            retrieval_timeout: Duration::from_secs(2),
            pacing: RetryPacing::default(),
        }
    }
}

/// Consumer side of a streaming generation.
///
/// Yields chunks in arrival order, closed by exactly one `Done` marker.
/// `final_result` resolves once the stream has been finalized and persisted.
pub struct ChatStream {
    chunks: ReceiverStream<StreamChunk>,
    result: oneshot::Receiver<GenerationResult>,
}

impl ChatStream {
    fn new(
        chunks: mpsc::Receiver<StreamChunk>,
        result: oneshot::Receiver<GenerationResult>,
    ) -> Self {
        Self {
            chunks: ReceiverStream::new(chunks),
            result,
        }
    }

    /// Wait for the finalized (possibly partial) result. Dropping the chunk
    /// stream here keeps the aggregator from blocking on an unread channel.
    pub async fn final_result(self) -> Result<GenerationResult, GatewayError> {
        let Self { chunks, result } = self;
        drop(chunks);

        result
            .await
            .map_err(|_| GatewayError::internal("stream task ended without finalizing"))
    }
}

impl Stream for ChatStream {
    type Item = StreamChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().chunks).poll_next(cx)
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream").finish_non_exhaustive()
    }
}

/// The request orchestration engine.
#[derive(Debug)]
pub struct ChatOrchestrator {
    tenants: Arc<dyn TenantConfigResolver>,
    registry: Arc<ProviderRegistry>,
    limiter: Arc<dyn RateLimiter>,
    store: Arc<dyn ThreadStore>,
    retriever: Option<Arc<dyn RagRetriever>>,
    preparer: RequestPreparer,
    executor: FailoverExecutor,
    aggregator: StreamAggregator,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    pub fn new(
        tenants: Arc<dyn TenantConfigResolver>,
        registry: Arc<ProviderRegistry>,
        limiter: Arc<dyn RateLimiter>,
        store: Arc<dyn ThreadStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let preparer = RequestPreparer::new(config.request_timeout);
        let executor = FailoverExecutor::new(
            registry.clone(),
            config.attempt_timeout,
            config.pacing.clone(),
        );

        Self {
            tenants,
            registry,
            limiter,
            store,
            retriever: None,
            preparer,
            executor,
            aggregator: StreamAggregator::new(),
            config,
        }
    }

    /// Attach a retrieval collaborator for context injection.
    pub fn with_retriever(mut self, retriever: Arc<dyn RagRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Unary call shape: prepare, admit, inject context, fail over, persist.
    pub async fn generate_reply(
        &self,
        tenant_id: &TenantId,
        request: &mut ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GatewayError> {
        let (tenant, mut prepared) = self.admit(tenant_id, request).await?;
        self.inject_context(&tenant, request, &mut prepared).await;

        let history = effective_history(&prepared, &request.history);

        match self
            .executor
            .execute(&prepared, &request.input, &history, cancel)
            .await
        {
            Ok(outcome) => {
                log_failures(&prepared.request_id, &outcome.failures);

                let result = outcome.result;
                self.persist(&result).await;

                info!(
                    request_id = %result.request_id,
                    provider = %result.provider,
                    "chat reply served"
                );
                Ok(result)
            }
            Err(aggregated) => {
                log_failures(&prepared.request_id, &aggregated.records);
                Err(aggregated.client_error())
            }
        }
    }

    /// Streaming call shape. Failover applies only until the serving
    /// provider emits its first item; after that, mid-stream failures
    /// surface to the caller as a partial result plus an error chunk.
    pub async fn generate_reply_stream(
        &self,
        tenant_id: &TenantId,
        request: &mut ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatStream, GatewayError> {
        let (tenant, mut prepared) = self.admit(tenant_id, request).await?;
        self.inject_context(&tenant, request, &mut prepared).await;

        let history = effective_history(&prepared, &request.history);

        let opened = match self
            .executor
            .open_stream(&prepared, &request.input, &history, cancel)
            .await
        {
            Ok(opened) => opened,
            Err(aggregated) => {
                log_failures(&prepared.request_id, &aggregated.records);

                if aggregated.records.is_empty() {
                    return Err(GatewayError::invalid_argument(
                        "no candidate provider supports streaming",
                    ));
                }

                return Err(aggregated.client_error());
            }
        };

        log_failures(&prepared.request_id, &opened.failures);

        let (tx, rx) = mpsc::channel(self.config.stream_buffer);
        let (result_tx, result_rx) = oneshot::channel();

        let aggregator = self.aggregator.clone();
        let store = self.store.clone();
        let cancel = cancel.clone();
        let request_id = prepared.request_id.clone();
        let deadline = prepared.deadline;

        tokio::spawn(async move {
            let outcome = aggregator
                .run(
                    &request_id,
                    &opened.provider,
                    opened.first,
                    opened.stream,
                    tx,
                    cancel,
                    deadline,
                )
                .await;

            if let Some(error) = &outcome.error {
                warn!(
                    request_id = %request_id,
                    provider = %outcome.result.provider,
                    error = %error,
                    "stream ended on upstream failure"
                );
            }

            let result = outcome.result;
            if let Err(error) = store.upsert_thread(&result.request_id, &result).await {
                warn!(
                    request_id = %result.request_id,
                    error = %error,
                    "failed to persist thread; stream result kept in memory only"
                );
            }

            let _ = result_tx.send(result);
        });

        Ok(ChatStream::new(rx, result_rx))
    }

    /// Resolve the tenant, prepare the request, and pass admission control.
    /// A limiter denial short-circuits before any provider cost is incurred.
    async fn admit(
        &self,
        tenant_id: &TenantId,
        request: &mut ChatRequest,
    ) -> Result<(Arc<TenantConfig>, PreparedRequest), GatewayError> {
        let tenant = self.tenants.resolve(tenant_id).await?;
        let prepared = self.preparer.prepare(&tenant, request)?;

        match self
            .limiter
            .check_and_increment(&prepared.client_key, tenant.rate_limit())
            .await
        {
            Admission::Allowed { remaining } => {
                debug!(
                    request_id = %prepared.request_id,
                    client_key = %prepared.client_key,
                    remaining,
                    "request admitted"
                );
            }
            Admission::Denied { retry_after } => {
                warn!(
                    request_id = %prepared.request_id,
                    client_key = %prepared.client_key,
                    retry_after_seconds = retry_after.as_secs(),
                    "request rate limited"
                );
                return Err(GatewayError::rate_limited(retry_after.as_secs()));
            }
        }

        Ok((tenant, prepared))
    }

    /// Best-effort context retrieval: failures and empty results are logged
    /// and the request proceeds with the original prompt only.
    async fn inject_context(
        &self,
        tenant: &TenantConfig,
        request: &ChatRequest,
        prepared: &mut PreparedRequest,
    ) {
        let Some(retriever) = &self.retriever else {
            return;
        };

        let retrieval = retriever.retrieve(
            tenant.id(),
            &request.input,
            self.config.retrieval_limit,
        );

        match timeout(self.config.retrieval_timeout, retrieval).await {
            Ok(Ok(passages)) if !passages.is_empty() => {
                debug!(
                    request_id = %prepared.request_id,
                    passages = passages.len(),
                    "injected retrieval context"
                );
                prepared.context = passages;
            }
            Ok(Ok(_)) => {
                debug!(
                    request_id = %prepared.request_id,
                    "retrieval returned no passages; continuing without context"
                );
            }
            Ok(Err(error)) => {
                warn!(
                    request_id = %prepared.request_id,
                    error = %error,
                    "retrieval failed; continuing without context"
                );
            }
            Err(_) => {
                warn!(
                    request_id = %prepared.request_id,
                    "retrieval timed out; continuing without context"
                );
            }
        }
    }

    /// Idempotent upsert keyed by the shared request id. A persistence
    /// failure never turns an already-produced reply into a client error.
    async fn persist(&self, result: &GenerationResult) {
        if let Err(error) = self.store.upsert_thread(&result.request_id, result).await {
            warn!(
                request_id = %result.request_id,
                error = %error,
                "failed to persist thread; returning reply anyway"
            );
        }
    }
}

/// History with retrieved context folded in as a leading system message.
fn effective_history(prepared: &PreparedRequest, history: &[Message]) -> Vec<Message> {
    if prepared.context.is_empty() {
        return history.to_vec();
    }

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(context_message(&prepared.context));
    messages.extend_from_slice(history);
    messages
}

fn context_message(passages: &[ScoredPassage]) -> Message {
    let mut body =
        String::from("Use the following context to answer. If it is not relevant, say so.\n");

    for (index, passage) in passages.iter().enumerate() {
        body.push_str(&format!("\n[{}] {}", index + 1, passage.text));
    }

    Message::system(body)
}

fn log_failures(request_id: &str, failures: &[FailureRecord]) {
    for record in failures {
        warn!(
            request_id = %request_id,
            provider = %record.provider,
            class = %record.class,
            detail = %record.detail,
            "provider attempt failed"
        );
    }
}
