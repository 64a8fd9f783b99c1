//! Streaming aggregation - relay chunks while accumulating the final result
//!
//! The aggregator is the only producer of `Error` and `Done` chunks on the
//! consumer-facing stream: exactly one `Done` closes every stream, on every
//! exit path, so the consumer side never blocks indefinitely.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::chat::{GenerationResult, ReplyStream, StreamChunk, Usage};
use crate::domain::GatewayError;

/// Result of a finished stream plus the upstream error that ended it, if any.
#[derive(Debug)]
pub struct StreamOutcome {
    pub result: GenerationResult,
    pub error: Option<GatewayError>,
}

/// Accumulates chunks into a persistable [`GenerationResult`].
#[derive(Debug, Default)]
struct Accumulator {
    text: String,
    usage: Usage,
    files: Vec<crate::domain::chat::GeneratedFile>,
    tool_calls: Vec<crate::domain::chat::ToolInvocation>,
    partial: bool,
}

impl Accumulator {
    fn absorb(&mut self, chunk: &StreamChunk) {
        match chunk {
            StreamChunk::Delta { text } => self.text.push_str(text),
            StreamChunk::ToolCall { call } => self.tool_calls.push(call.clone()),
            StreamChunk::File { file } => self.files.push(file.clone()),
            // Latest usage update wins.
            StreamChunk::Usage { usage } => self.usage = *usage,
            StreamChunk::Error { .. } | StreamChunk::Done { .. } => {}
        }
    }

    fn finalize(self, request_id: &str, provider: &str) -> GenerationResult {
        let mut result = GenerationResult::new(self.text)
            .with_request_id(request_id)
            .with_provider(provider)
            .with_usage(self.usage)
            .with_partial(self.partial);
        result.files = self.files;
        result.tool_calls = self.tool_calls;
        result
    }
}

/// Relays provider chunks to the consumer in arrival order while building the
/// final result.
#[derive(Debug, Clone, Default)]
pub struct StreamAggregator;

impl StreamAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Drive `upstream` to completion, cancellation, or the deadline.
    ///
    /// `first` is the chunk consumed while the stream was opened during
    /// failover. Chunks are forwarded through `tx` with backpressure from the
    /// channel bound; a dropped consumer counts as cancellation. On return
    /// the upstream stream has been dropped, so the provider connection never
    /// outlives the cancellation point.
    pub async fn run(
        &self,
        request_id: &str,
        provider: &str,
        first: Option<StreamChunk>,
        mut upstream: ReplyStream,
        tx: mpsc::Sender<StreamChunk>,
        cancel: CancellationToken,
        deadline: Instant,
    ) -> StreamOutcome {
        let mut acc = Accumulator::default();
        let mut upstream_error: Option<GatewayError> = None;
        let mut relaying = true;

        if let Some(chunk) = first {
            if chunk.is_terminal() {
                relaying = false;
            } else {
                acc.absorb(&chunk);
                if tx.send(chunk).await.is_err() {
                    debug!(request_id = %request_id, "stream consumer went away");
                    acc.partial = true;
                    relaying = false;
                }
            }
        }

        let deadline_sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(deadline_sleep);

        while relaying {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(request_id = %request_id, "stream cancelled by caller");
                    acc.partial = true;
                    break;
                }
                _ = &mut deadline_sleep => {
                    debug!(request_id = %request_id, "stream deadline elapsed");
                    acc.partial = true;
                    break;
                }
                item = upstream.next() => match item {
                    None => break,
                    Some(Ok(chunk)) => {
                        if chunk.is_terminal() {
                            break;
                        }

                        acc.absorb(&chunk);

                        if tx.send(chunk).await.is_err() {
                            debug!(request_id = %request_id, "stream consumer went away");
                            acc.partial = true;
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        // Mid-stream failures are terminal: a retry against
                        // another provider could duplicate already-delivered
                        // output. The caller gets a sanitized error chunk.
                        acc.partial = true;
                        let _ = tx
                            .send(StreamChunk::Error {
                                message: "generation interrupted by an upstream failure"
                                    .to_string(),
                            })
                            .await;
                        upstream_error = Some(error);
                        break;
                    }
                }
            }
        }

        drop(upstream);

        let _ = tx
            .send(StreamChunk::Done {
                partial: acc.partial,
            })
            .await;

        StreamOutcome {
            result: acc.finalize(request_id, provider),
            error: upstream_error,
        }
    }
}
