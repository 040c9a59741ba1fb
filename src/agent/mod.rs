pub mod actions;
pub mod ollama;
pub mod tools;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;

use crate::errors::GenerationError;
use crate::models::Message;

pub use ollama::OllamaModel;

/// A JSON-schema-described operation offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A request for one value conforming to `schema`.
#[derive(Debug, Clone)]
pub struct ObjectRequest {
    /// Short identifier for the requested shape, used in logs and errors.
    pub name: String,
    pub prompt: String,
    pub schema: Value,
}

/// One model turn: system instruction, conversation so far, and offered tools.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    TextDelta(String),
    ToolCall { id: String, name: String, arguments: Value },
}

pub type TurnStream = BoxStream<'static, Result<TurnEvent, GenerationError>>;

/// The hosted model capability. Built once at start-up and shared read-only.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate_object(&self, request: ObjectRequest) -> Result<Value, GenerationError>;

    /// Starts a turn; text arrives incrementally, tool calls once complete.
    async fn stream_turn(&self, request: TurnRequest) -> Result<TurnStream, GenerationError>;
}
