use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed piece of a structured message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        args: Value,
    },
    ToolResult {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        result: Value,
    },
}

/// Either a plain string or a list of typed parts (text, tool calls, tool results).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.trim().is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }

    /// Concatenated text parts, ignoring tool traffic.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default)]
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant_parts(parts: Vec<ContentPart>) -> Self {
        Self { role: MessageRole::Assistant, content: MessageContent::Parts(parts) }
    }

    pub fn tool_results(parts: Vec<ContentPart>) -> Self {
        Self { role: MessageRole::Tool, content: MessageContent::Parts(parts) }
    }
}

/// Drops entries whose content is empty, keeping conversation order.
pub fn normalize_messages(messages: Vec<Message>) -> Vec<Message> {
    messages.into_iter().filter(|m| !m.content.is_empty()).collect()
}

// ── Chats ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(id: String, user_id: String, messages: Vec<Message>) -> Self {
        Self { id, user_id, messages, created_at: Utc::now() }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

// ── Saved data ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Tip {
    /// Specific parenting tip
    pub tip: String,
}

/// A user-owned record with free-form fields, the `tips` list being the one
/// field with a known shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedData {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Keys owned by the record itself; never taken from client payloads.
pub const PROTECTED_FIELDS: [&str; 2] = ["id", "userId"];

impl SavedData {
    pub fn new(id: String, user_id: String, fields: Map<String, Value>) -> Self {
        Self { id, user_id, fields }
    }

    /// The stored tips, if the record has a well-formed `tips` list.
    pub fn tips(&self) -> Option<Vec<Tip>> {
        let value = self.fields.get("tips")?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Renders tips as the plain-text bullet list older clients expect.
    pub fn render_tips(&self) -> Option<String> {
        let tips = self.tips()?;
        let list = tips.iter().map(|t| format!("- {}", t.tip)).collect::<Vec<_>>().join("\n");
        Some(format!("Here are your saved tips:\n\n{list}"))
    }
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl IdQuery {
    pub fn wants_text(&self) -> bool {
        self.format.as_deref() == Some("text")
    }
}
