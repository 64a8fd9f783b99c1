use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::domain::GatewayError;

/// Token usage counters for one provider call.
///
/// Exposed for an external pricer; the engine itself attaches no cost logic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A file produced by the provider during generation.
///
/// `content_ref` is an opaque reference (vendor file id, URL) resolved by the
/// persistence collaborator; the engine never loads file bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub name: String,
    pub media_type: String,
    pub content_ref: String,
}

impl GeneratedFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        content_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            content_ref: content_ref.into(),
        }
    }
}

/// A tool/function invocation requested by the provider.
///
/// Fragment assembly is the vendor adapter's concern; by the time an
/// invocation reaches the engine it is complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Final result of one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Request identifier, stable across internal retries.
    pub request_id: String,
    /// Name of the provider that ultimately served the request.
    pub provider: String,
    pub text: String,
    pub usage: Usage,
    pub files: Vec<GeneratedFile>,
    pub tool_calls: Vec<ToolInvocation>,
    /// Set when a stream terminated early (cancellation, deadline, upstream
    /// failure) and the text is incomplete.
    pub partial: bool,
}

impl GenerationResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            provider: String::new(),
            text: text.into(),
            usage: Usage::default(),
            files: Vec::new(),
            tool_calls: Vec::new(),
            partial: false,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_file(mut self, file: GeneratedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_tool_call(mut self, call: ToolInvocation) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }
}

/// One element of a reply stream.
///
/// Providers emit `Delta`/`ToolCall`/`File`/`Usage`; end of generation is the
/// end of the underlying stream. `Error` and `Done` are produced by the
/// aggregator: every consumer-facing stream carries exactly one `Done`, always
/// last, on every exit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    Delta { text: String },
    ToolCall { call: ToolInvocation },
    File { file: GeneratedFile },
    /// Usage update; the latest update wins.
    Usage { usage: Usage },
    /// Sanitized mid-stream failure notice. The raw detail stays server-side.
    Error { message: String },
    /// Terminal marker.
    Done { partial: bool },
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self::Delta { text: text.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Stream type for provider replies
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>;
