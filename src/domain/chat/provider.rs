use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use super::{GenerationResult, Message, ProviderConfig, ReplyStream};
use crate::domain::GatewayError;

/// Contract implemented once per backend text-generation vendor.
///
/// Implementations must honor cancellation (the engine drops the returned
/// future/stream at the cancellation point) and must classify their own
/// failures into [`ErrorClass`](crate::domain::ErrorClass) via
/// [`GatewayError::upstream`] before returning.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Stable provider name used in tenant configuration and results.
    fn name(&self) -> &str;

    fn supports_streaming(&self) -> bool;
    fn supports_file_search(&self) -> bool;
    fn supports_web_search(&self) -> bool;
    /// Whether the backend tracks thread continuity natively (vendor-side
    /// conversation state keyed by our request identifier).
    fn supports_native_continuity(&self) -> bool;

    /// Produce a complete reply in one call.
    async fn generate_reply(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        history: &[Message],
    ) -> Result<GenerationResult, GatewayError>;

    /// Produce a reply incrementally. The stream is finite and not
    /// restartable; end of generation is the end of the stream.
    async fn generate_reply_stream(
        &self,
        config: &ProviderConfig,
        prompt: &str,
        history: &[Message],
    ) -> Result<ReplyStream, GatewayError>;
}

/// Runtime lookup of providers by name.
///
/// Built once at startup and shared read-only across requests; a flat set of
/// interchangeable implementations behind one contract.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::{stream, StreamExt};

    use super::*;
    use crate::domain::chat::StreamChunk;
    use crate::domain::ErrorClass;

    /// Scripted behavior for one mock provider.
    #[derive(Debug, Clone)]
    pub enum Behavior {
        /// Reply immediately with the given text.
        Reply(String),
        /// Fail with the given classification.
        Fail(ErrorClass, String),
        /// Sleep, then reply. Combined with a short attempt timeout this
        /// simulates a slow upstream.
        Delay(Duration, String),
        /// Emit the given chunks, then end the stream.
        Stream(Vec<StreamChunk>),
        /// Emit the given chunks, then never produce another item. Used for
        /// cancellation tests.
        StreamThenPend(Vec<StreamChunk>),
        /// Emit the given chunks, then fail mid-stream.
        StreamThenFail(Vec<StreamChunk>, String),
        /// Fail before the stream is even opened.
        StreamOpenFail(ErrorClass, String),
    }

    #[derive(Debug)]
    pub struct MockProvider {
        name: String,
        behavior: Behavior,
        streaming: bool,
        calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn new(name: impl Into<String>, behavior: Behavior) -> Self {
            Self {
                name: name.into(),
                behavior,
                streaming: true,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn without_streaming(mut self) -> Self {
            self.streaming = false;
            self
        }

        /// Number of generate calls (unary or stream) received.
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn unary_outcome(&self) -> Result<GenerationResult, GatewayError> {
            match &self.behavior {
                Behavior::Reply(text) => Ok(GenerationResult::new(text.clone())
                    .with_usage(crate::domain::chat::Usage::new(10, 20))),
                Behavior::Fail(class, detail) => {
                    Err(GatewayError::upstream(&self.name, *class, detail.clone()))
                }
                other => Err(GatewayError::internal(format!(
                    "mock '{}' not scripted for unary calls: {:?}",
                    self.name, other
                ))),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn supports_streaming(&self) -> bool {
            self.streaming
        }

        fn supports_file_search(&self) -> bool {
            false
        }

        fn supports_web_search(&self) -> bool {
            false
        }

        fn supports_native_continuity(&self) -> bool {
            false
        }

        async fn generate_reply(
            &self,
            _config: &ProviderConfig,
            _prompt: &str,
            _history: &[Message],
        ) -> Result<GenerationResult, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Behavior::Delay(duration, text) = &self.behavior {
                tokio::time::sleep(*duration).await;
                return Ok(GenerationResult::new(text.clone()));
            }

            self.unary_outcome()
        }

        async fn generate_reply_stream(
            &self,
            _config: &ProviderConfig,
            _prompt: &str,
            _history: &[Message],
        ) -> Result<ReplyStream, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            match &self.behavior {
                Behavior::Stream(chunks) => {
                    let items: Vec<Result<StreamChunk, GatewayError>> =
                        chunks.iter().cloned().map(Ok).collect();
                    Ok(Box::pin(stream::iter(items)))
                }
                Behavior::StreamThenPend(chunks) => {
                    let items: Vec<Result<StreamChunk, GatewayError>> =
                        chunks.iter().cloned().map(Ok).collect();
                    Ok(Box::pin(stream::iter(items).chain(stream::pending())))
                }
                Behavior::StreamThenFail(chunks, detail) => {
                    let mut items: Vec<Result<StreamChunk, GatewayError>> =
                        chunks.iter().cloned().map(Ok).collect();
                    items.push(Err(GatewayError::upstream(
                        &self.name,
                        ErrorClass::Upstream,
                        detail.clone(),
                    )));
                    Ok(Box::pin(stream::iter(items)))
                }
                Behavior::StreamOpenFail(class, detail) => {
                    Err(GatewayError::upstream(&self.name, *class, detail.clone()))
                }
                Behavior::Fail(class, detail) => {
                    Err(GatewayError::upstream(&self.name, *class, detail.clone()))
                }
                other => Err(GatewayError::internal(format!(
                    "mock '{}' not scripted for streaming calls: {:?}",
                    self.name, other
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Behavior, MockProvider};
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(MockProvider::new(
                "openai",
                Behavior::Reply("hi".into()),
            )))
            .with_provider(Arc::new(MockProvider::new(
                "anthropic",
                Behavior::Reply("hello".into()),
            )));

        assert!(registry.get("openai").is_some());
        assert!(registry.get("anthropic").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.names().len(), 2);
    }

    #[test]
    fn test_mock_counts_calls() {
        let provider = MockProvider::new("openai", Behavior::Reply("hi".into()));
        let config = ProviderConfig::new("gpt-4");

        tokio_test::block_on(async {
            let result = provider.generate_reply(&config, "prompt", &[]).await;
            assert!(result.is_ok());
        });

        assert_eq!(provider.call_count(), 1);
    }
}
