use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use super::ensure_owner;
use crate::agent::tools::ToolRegistry;
use crate::agent::{LanguageModel, TurnEvent, TurnRequest, TurnStream};
use crate::auth::Session;
use crate::db::ChatStore;
use crate::errors::{AppError, GenerationError};
use crate::models::{normalize_messages, Chat, ChatRequest, ContentPart, Message, MessageRole};

/// Upper bound on model turns per request; each tool round-trip costs one and
/// the last turn is offered no tools.
const MAX_STEPS: usize = 5;
const CHANNEL_CAPACITY: usize = 64;

/// Sent when a request finishes without a final assistant reply.
pub const FALLBACK_REPLY: &str = "Here is your parenting advice.";

pub const SYSTEM_PROMPT: &str = "\
- You are a parenting advice assistant.
- Keep your responses concise and supportive.
- Ask follow up questions to nudge the user into the optimal flow.
- If generating structured outputs like tips, integrate them into a conversational reply.
- Do not output raw JSON unless explicitly requested.";

/// Text chunks of an in-flight reply; an `Err` item ends the body abruptly.
pub type ReplyStream = ReceiverStream<Result<String, GenerationError>>;

/// A requested tool invocation collected from one model turn.
struct PendingCall {
    id: String,
    name: String,
    arguments: serde_json::Value,
}

#[derive(Clone)]
pub struct ChatService {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    chats: Arc<dyn ChatStore>,
}

impl ChatService {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        chats: Arc<dyn ChatStore>,
    ) -> Self {
        Self { model, tools, chats }
    }

    fn turn_request(&self, messages: Vec<Message>) -> TurnRequest {
        TurnRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages,
            tools: self.tools.specs(),
        }
    }

    /// A turn that must answer from what it already has.
    fn final_turn_request(&self, messages: Vec<Message>) -> TurnRequest {
        TurnRequest { system: SYSTEM_PROMPT.to_string(), messages, tools: Vec::new() }
    }

    /// Validates the request, opens the first model turn and hands the rest
    /// of the conversation to a background task. Failing to open the turn is
    /// reported to the caller; later failures terminate the returned stream.
    pub async fn send_message(
        &self,
        session: &Session,
        request: ChatRequest,
    ) -> Result<ReplyStream, AppError> {
        let chat_id = request.id.trim().to_string();
        if chat_id.is_empty() {
            return Err(AppError::invalid_payload("Missing chat id!"));
        }
        let messages = normalize_messages(request.messages);
        if messages.is_empty() {
            return Err(AppError::invalid_payload("No messages to send!"));
        }

        let first = self.model.stream_turn(self.turn_request(messages.clone())).await?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let svc = self.clone();
        let user_id = session.user_id().to_string();
        tokio::spawn(async move {
            svc.run_turns(chat_id, user_id, messages, first, tx).await;
        });
        Ok(ReceiverStream::new(rx))
    }

    async fn run_turns(
        self,
        chat_id: String,
        user_id: String,
        messages: Vec<Message>,
        first: TurnStream,
        tx: mpsc::Sender<Result<String, GenerationError>>,
    ) {
        let mut events = first;
        let mut response: Vec<Message> = Vec::new();

        for step in 1..=MAX_STEPS {
            let mut text = String::new();
            let mut calls = Vec::new();

            loop {
                let event = tokio::select! {
                    _ = tx.closed() => {
                        info!("Client left chat {chat_id}; abandoning generation");
                        return;
                    }
                    event = events.next() => event,
                };
                match event {
                    None => break,
                    Some(Ok(TurnEvent::TextDelta(delta))) => {
                        text.push_str(&delta);
                        if tx.send(Ok(delta)).await.is_err() {
                            info!("Client left chat {chat_id}; abandoning generation");
                            return;
                        }
                    }
                    Some(Ok(TurnEvent::ToolCall { id, name, arguments })) => {
                        calls.push(PendingCall { id, name, arguments });
                    }
                    Some(Err(e)) => {
                        error!("Generation failed for chat {chat_id}: {e}");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }

            if step == MAX_STEPS && !calls.is_empty() {
                warn!("Chat {chat_id} requested tools after {MAX_STEPS} steps; ignoring them");
                calls.clear();
            }
            if calls.is_empty() {
                if !text.is_empty() {
                    response.push(Message::assistant(text));
                }
                break;
            }

            let mut parts = Vec::with_capacity(calls.len() + 1);
            if !text.is_empty() {
                parts.push(ContentPart::Text { text });
            }
            parts.extend(calls.iter().map(|call| ContentPart::ToolCall {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                args: call.arguments.clone(),
            }));
            response.push(Message::assistant_parts(parts));

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                let outcome = tokio::select! {
                    _ = tx.closed() => {
                        info!("Client left chat {chat_id} during tool '{}'", call.name);
                        return;
                    }
                    outcome = self.tools.dispatch(self.model.as_ref(), &call.name, call.arguments) => outcome,
                };
                let result = match outcome {
                    Ok(value) => {
                        debug!("Tool '{}' completed for chat {chat_id}", call.name);
                        value
                    }
                    Err(e) => {
                        warn!("Tool call in chat {chat_id} failed: {e}");
                        json!({ "error": e.to_string() })
                    }
                };
                results.push(ContentPart::ToolResult {
                    tool_call_id: call.id,
                    tool_name: call.name,
                    result,
                });
            }
            response.push(Message::tool_results(results));

            let history = messages.iter().chain(response.iter()).cloned().collect();
            let request = if step + 1 == MAX_STEPS {
                debug!("Chat {chat_id} is on its last step; withholding tools");
                self.final_turn_request(history)
            } else {
                self.turn_request(history)
            };
            events = match self.model.stream_turn(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Generation failed for chat {chat_id}: {e}");
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
        }

        // The stored conversation always ends on an assistant reply.
        if !matches!(response.last(), Some(m) if m.role == MessageRole::Assistant) {
            if tx.send(Ok(FALLBACK_REPLY.to_string())).await.is_err() {
                return;
            }
            response.push(Message::assistant(FALLBACK_REPLY));
        }
        drop(tx);

        self.persist(chat_id, user_id, messages, response).await;
    }

    /// Best-effort save of the finished conversation; failures are only logged.
    async fn persist(
        &self,
        chat_id: String,
        user_id: String,
        mut messages: Vec<Message>,
        response: Vec<Message>,
    ) {
        messages.extend(response);
        let chat = Chat::new(chat_id, user_id, messages);
        match self.chats.save_chat(&chat).await {
            Ok(()) => debug!("Saved chat {} ({} messages)", chat.id, chat.messages.len()),
            Err(e) => error!("Failed to save chat {}: {e}", chat.id),
        }
    }

    pub async fn get_chat(&self, session: &Session, id: &str) -> Result<Chat, AppError> {
        let chat = self
            .chats
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Chat not found!"))?;
        ensure_owner(&chat.user_id, session)?;
        Ok(chat)
    }

    pub async fn delete_chat(&self, session: &Session, id: &str) -> Result<(), AppError> {
        let chat = self.get_chat(session, id).await?;
        if !self.chats.delete_by_id(&chat.id).await? {
            return Err(AppError::not_found("Chat not found!"));
        }
        info!("Deleted chat {id}");
        Ok(())
    }
}
