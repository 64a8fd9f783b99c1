//! Sequential failover across candidate providers
//!
//! Candidates are attempted strictly in order, one in flight at a time; no
//! hedged/parallel racing. A retryable failure advances to the next
//! candidate, a caller-input rejection aborts the whole request.

use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::chat::{
    GenerationResult, Message, PreparedRequest, ProviderRegistry, ReplyStream, StreamChunk,
};
use crate::domain::{ErrorClass, GatewayError};

/// One failed provider attempt.
///
/// The raw detail is for server-side logs only; callers see a sanitized
/// error built from the classification.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub provider: String,
    pub class: ErrorClass,
    pub detail: String,
}

impl FailureRecord {
    pub fn new(provider: impl Into<String>, class: ErrorClass, detail: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            class,
            detail: detail.into(),
        }
    }
}

/// Delay curve applied between failover attempts.
#[derive(Debug, Clone)]
pub struct RetryPacing {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPacing {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPacing {
    /// No delay between attempts.
    pub fn none() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Calculate delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;

        Duration::from_millis(delay_ms)
    }
}

/// All candidates failed (or one failed fatally).
///
/// Carries every attempt's record in order for server-side logging; the
/// orchestrator maps it to a single sanitized client-facing error.
#[derive(Debug, Error)]
#[error("generation failed after {} provider attempts", .records.len())]
pub struct AggregatedFailure {
    pub records: Vec<FailureRecord>,
    /// Whether failover aborted on a non-retryable (caller input) failure.
    pub fatal: bool,
}

impl AggregatedFailure {
    /// Sanitized error for the caller; raw details stay in the records.
    pub fn client_error(&self) -> GatewayError {
        if self.fatal {
            let provider = self
                .records
                .last()
                .map(|r| r.provider.as_str())
                .unwrap_or("unknown");
            GatewayError::invalid_argument(format!(
                "request was rejected by provider '{}'",
                provider
            ))
        } else {
            GatewayError::unavailable(format!(
                "all candidate providers failed ({} attempts)",
                self.records.len()
            ))
        }
    }
}

/// Successful execution plus the failures that preceded it.
#[derive(Debug)]
pub struct FailoverOutcome {
    pub result: GenerationResult,
    pub failures: Vec<FailureRecord>,
}

/// A provider stream that has been opened and peeked.
///
/// The first item is consumed during failover so a provider that dies before
/// emitting anything can still be skipped; once a chunk exists the stream is
/// committed and mid-stream failures are terminal.
pub struct OpenedStream {
    pub provider: String,
    pub first: Option<StreamChunk>,
    pub stream: ReplyStream,
    pub failures: Vec<FailureRecord>,
}

impl std::fmt::Debug for OpenedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedStream")
            .field("provider", &self.provider)
            .field("first", &self.first)
            .field("failures", &self.failures)
            .finish()
    }
}

/// Executes candidates in order under per-attempt deadlines.
#[derive(Debug)]
pub struct FailoverExecutor {
    registry: std::sync::Arc<ProviderRegistry>,
    attempt_timeout: Duration,
    pacing: RetryPacing,
}

impl FailoverExecutor {
    pub fn new(
        registry: std::sync::Arc<ProviderRegistry>,
        attempt_timeout: Duration,
        pacing: RetryPacing,
    ) -> Self {
        Self {
            registry,
            attempt_timeout,
            pacing,
        }
    }

    /// Unary path: first successful candidate wins.
    pub async fn execute(
        &self,
        prepared: &PreparedRequest,
        prompt: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<FailoverOutcome, AggregatedFailure> {
        let mut records = Vec::new();

        for (attempt, name) in prepared.candidates.iter().enumerate() {
            if let Err(record) = self.pace(attempt, name, cancel).await {
                records.push(record);
                break;
            }

            let Some(provider) = self.registry.get(name) else {
                records.push(FailureRecord::new(
                    name,
                    ErrorClass::Connection,
                    "provider not registered",
                ));
                continue;
            };

            let Some(config) = prepared.config_for(name) else {
                records.push(FailureRecord::new(
                    name,
                    ErrorClass::Upstream,
                    "no resolved configuration for candidate",
                ));
                continue;
            };

            let Some(attempt_deadline) = self.attempt_deadline(prepared.deadline) else {
                records.push(FailureRecord::new(
                    name,
                    ErrorClass::Timeout,
                    "request deadline exhausted before attempt",
                ));
                break;
            };

            let call = provider.generate_reply(config, prompt, history);

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    records.push(FailureRecord::new(name, ErrorClass::Timeout, "request cancelled"));
                    break;
                }
                outcome = timeout_at(attempt_deadline, call) => outcome,
            };

            match outcome {
                Err(_) => {
                    records.push(FailureRecord::new(
                        name,
                        ErrorClass::Timeout,
                        "attempt deadline exceeded",
                    ));
                }
                Ok(Ok(result)) => {
                    debug!(provider = %name, attempt, "candidate succeeded");
                    let result = result
                        .with_request_id(&prepared.request_id)
                        .with_provider(name);
                    return Ok(FailoverOutcome {
                        result,
                        failures: records,
                    });
                }
                Ok(Err(error)) => {
                    let class = error.classify();
                    records.push(FailureRecord::new(name, class, error.to_string()));

                    if !class.is_retryable() {
                        return Err(AggregatedFailure {
                            records,
                            fatal: true,
                        });
                    }
                }
            }
        }

        Err(AggregatedFailure {
            records,
            fatal: false,
        })
    }

    /// Streaming path: failover applies only until a candidate emits its
    /// first item. Candidates without streaming support are skipped.
    pub async fn open_stream(
        &self,
        prepared: &PreparedRequest,
        prompt: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<OpenedStream, AggregatedFailure> {
        let mut records = Vec::new();
        let mut attempt = 0u32;

        for name in &prepared.candidates {
            let Some(provider) = self.registry.get(name) else {
                records.push(FailureRecord::new(
                    name,
                    ErrorClass::Connection,
                    "provider not registered",
                ));
                continue;
            };

            if !provider.supports_streaming() {
                debug!(provider = %name, "candidate does not support streaming, skipping");
                continue;
            }

            if let Err(record) = self.pace(attempt as usize, name, cancel).await {
                records.push(record);
                break;
            }
            attempt += 1;

            let Some(config) = prepared.config_for(name) else {
                records.push(FailureRecord::new(
                    name,
                    ErrorClass::Upstream,
                    "no resolved configuration for candidate",
                ));
                continue;
            };

            let Some(attempt_deadline) = self.attempt_deadline(prepared.deadline) else {
                records.push(FailureRecord::new(
                    name,
                    ErrorClass::Timeout,
                    "request deadline exhausted before attempt",
                ));
                break;
            };

            let open_and_peek = async {
                let mut stream = provider.generate_reply_stream(config, prompt, history).await?;
                let first = stream.next().await;
                Ok::<_, GatewayError>((stream, first))
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    records.push(FailureRecord::new(name, ErrorClass::Timeout, "request cancelled"));
                    break;
                }
                outcome = timeout_at(attempt_deadline, open_and_peek) => outcome,
            };

            match outcome {
                Err(_) => {
                    records.push(FailureRecord::new(
                        name,
                        ErrorClass::Timeout,
                        "attempt deadline exceeded",
                    ));
                }
                Ok(Err(error)) | Ok(Ok((_, Some(Err(error))))) => {
                    // Failed before any chunk was emitted: still eligible
                    // for failover unless fatal.
                    let class = error.classify();
                    records.push(FailureRecord::new(name, class, error.to_string()));

                    if !class.is_retryable() {
                        return Err(AggregatedFailure {
                            records,
                            fatal: true,
                        });
                    }
                }
                Ok(Ok((stream, first))) => {
                    let first = match first {
                        Some(Ok(chunk)) => Some(chunk),
                        None => None,
                        Some(Err(_)) => unreachable!("handled above"),
                    };

                    return Ok(OpenedStream {
                        provider: name.clone(),
                        first,
                        stream,
                        failures: records,
                    });
                }
            }
        }

        Err(AggregatedFailure {
            records,
            fatal: false,
        })
    }

    /// Apply the inter-attempt delay, aborting early on cancellation.
    async fn pace(
        &self,
        attempt: usize,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), FailureRecord> {
        if cancel.is_cancelled() {
            return Err(FailureRecord::new(
                name,
                ErrorClass::Timeout,
                "request cancelled",
            ));
        }

        if attempt > 0 {
            let delay = self.pacing.delay_for_attempt(attempt as u32 - 1);
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(FailureRecord::new(
                            name,
                            ErrorClass::Timeout,
                            "request cancelled",
                        ));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Ok(())
    }

    /// Per-attempt deadline bounded by the overall request deadline. `None`
    /// when the request deadline has already passed.
    fn attempt_deadline(&self, request_deadline: Instant) -> Option<Instant> {
        let now = Instant::now();
        if request_deadline <= now {
            return None;
        }

        Some(request_deadline.min(now + self.attempt_timeout))
    }
}
