use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use rig::client::Nothing;
use rig::completion::{CompletionModel, ToolDefinition};
use rig::message::{AssistantContent, Message as RigMessage, ToolResultContent, UserContent};
use rig::one_or_many::OneOrMany;
use rig::prelude::CompletionClient;
use rig::providers::ollama;
use rig::streaming::StreamedAssistantContent;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use super::{LanguageModel, ObjectRequest, TurnEvent, TurnRequest, TurnStream};
use crate::errors::GenerationError;
use crate::models::{ContentPart, Message, MessageContent, MessageRole};

const SUBMIT_TOOL: &str = "submit";
const STRUCTURED_PREAMBLE: &str = "You produce structured data. \
                                   Always answer by calling the `submit` tool exactly once \
                                   with arguments that match its parameter schema.";

/// Converts stored messages into rig's message model. Entries with nothing
/// the provider can represent are dropped.
fn to_rig_history(messages: &[Message]) -> Vec<RigMessage> {
    messages.iter().filter_map(to_rig_message).collect()
}

fn to_rig_message(message: &Message) -> Option<RigMessage> {
    match (message.role, &message.content) {
        (MessageRole::User, content) => {
            let text = content.text();
            (!text.trim().is_empty()).then(|| RigMessage::user(text))
        }
        (MessageRole::Assistant, MessageContent::Text(text)) => Some(RigMessage::assistant(text)),
        (MessageRole::Assistant, MessageContent::Parts(parts)) => {
            let content: Vec<AssistantContent> = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(AssistantContent::text(text)),
                    ContentPart::ToolCall { tool_call_id, tool_name, args } => Some(
                        AssistantContent::tool_call(tool_call_id, tool_name, args.clone()),
                    ),
                    ContentPart::ToolResult { .. } => None,
                })
                .collect();
            OneOrMany::many(content).ok().map(|content| RigMessage::Assistant { id: None, content })
        }
        (MessageRole::Tool, MessageContent::Parts(parts)) => {
            let results: Vec<UserContent> = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::ToolResult { tool_call_id, result, .. } => Some(UserContent::tool_result(
                        tool_call_id,
                        OneOrMany::one(ToolResultContent::text(result.to_string())),
                    )),
                    _ => None,
                })
                .collect();
            OneOrMany::many(results).ok().map(|content| RigMessage::User { content })
        }
        (MessageRole::Tool, MessageContent::Text(_)) => None,
    }
}

/// Pulls a JSON object out of free text, tolerating markdown fences.
fn parse_json_text(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    serde_json::from_str(trimmed.get(start..=end)?).ok()
}

/// Model capability backed by a rig [`ollama::Client`].
#[derive(Clone)]
pub struct OllamaModel {
    client: ollama::Client,
    base_url: String,
    chat_model: String,
    structured_model: String,
}

impl OllamaModel {
    pub fn new(
        base_url: &str,
        chat_model: &str,
        structured_model: &str,
    ) -> Result<Self, GenerationError> {
        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(base_url)
            .build()
            .map_err(|e| GenerationError::Inference {
                message: format!("Failed to build Ollama client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            chat_model: chat_model.to_string(),
            structured_model: structured_model.to_string(),
        })
    }

    fn classify(&self, model_name: &str, message: String) -> GenerationError {
        if message.contains("Connection refused") || message.contains("connect") {
            GenerationError::Unavailable { host: self.base_url.clone() }
        } else if message.contains("model") && message.contains("not found") {
            GenerationError::ModelNotFound { model_name: model_name.to_string() }
        } else {
            GenerationError::Inference { message }
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn generate_object(&self, request: ObjectRequest) -> Result<Value, GenerationError> {
        let model = self.client.completion_model(&self.structured_model);
        let response = model
            .completion_request(RigMessage::user(request.prompt))
            .preamble(STRUCTURED_PREAMBLE.to_string())
            .tool(ToolDefinition {
                name: SUBMIT_TOOL.to_string(),
                description: format!("Submit the {} result", request.name),
                parameters: request.schema,
            })
            .send()
            .await
            .map_err(|e| {
                error!("Structured generation '{}' failed: {e}", request.name);
                self.classify(&self.structured_model, e.to_string())
            })?;

        let mut from_text = None;
        for content in response.choice.iter() {
            match content {
                AssistantContent::ToolCall(call) if call.function.name == SUBMIT_TOOL => {
                    return Ok(call.function.arguments.clone());
                }
                AssistantContent::Text(text) if from_text.is_none() => {
                    from_text = parse_json_text(&text.text);
                }
                _ => {}
            }
        }

        debug!("Model answered '{}' without calling {SUBMIT_TOOL}", request.name);
        from_text.ok_or_else(|| GenerationError::SchemaMismatch {
            target: request.name,
            message: "model returned no structured output".to_string(),
        })
    }

    async fn stream_turn(&self, request: TurnRequest) -> Result<TurnStream, GenerationError> {
        let mut history = to_rig_history(&request.messages);
        let prompt = history.pop().ok_or_else(|| GenerationError::Inference {
            message: "conversation has no messages".to_string(),
        })?;

        let model = self.client.completion_model(&self.chat_model);
        let builder = model
            .completion_request(prompt)
            .preamble(request.system)
            .messages(history);
        let builder = request.tools.into_iter().fold(builder, |b, tool| {
            b.tool(ToolDefinition {
                name: tool.name,
                description: tool.description,
                parameters: tool.parameters,
            })
        });

        let response = builder
            .stream()
            .await
            .map_err(|e| self.classify(&self.chat_model, e.to_string()))?;
        let mut response = Box::pin(response);

        let stream: TurnStream = Box::pin(stream! {
            while let Some(item) = response.next().await {
                match item {
                    Ok(StreamedAssistantContent::Text(text)) if !text.text.is_empty() => {
                        yield Ok(TurnEvent::TextDelta(text.text));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(GenerationError::Inference { message: e.to_string() });
                        return;
                    }
                }
            }
            // Tool calls are taken from the aggregated message once the stream is drained.
            for content in response.choice.iter() {
                if let AssistantContent::ToolCall(call) = content {
                    let id = if call.id.is_empty() { Uuid::new_v4().to_string() } else { call.id.clone() };
                    yield Ok(TurnEvent::ToolCall {
                        id,
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    });
                }
            }
        });
        Ok(stream)
    }
}
