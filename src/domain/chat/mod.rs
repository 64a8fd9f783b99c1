//! Chat request/reply data model and the provider contract

mod message;
mod prepared;
mod provider;
mod request;
mod result;

pub use message::{Message, MessageRole};
pub use prepared::{PreparedRequest, ProviderConfig};
pub use provider::{Provider, ProviderRegistry};
pub use request::{ChatRequest, ProviderOverrides};
pub use result::{
    GeneratedFile, GenerationResult, ReplyStream, StreamChunk, ToolInvocation, Usage,
};

#[cfg(test)]
pub use provider::mock;
