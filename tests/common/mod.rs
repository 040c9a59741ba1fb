// Shared fixtures: in-memory stores, a scripted model and a router harness.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures_util::stream::{self, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Map, Value};
use tower::ServiceExt;

use poppins_bot::agent::tools::ToolRegistry;
use poppins_bot::agent::{LanguageModel, ObjectRequest, TurnEvent, TurnRequest, TurnStream};
use poppins_bot::auth::JwtSessionVerifier;
use poppins_bot::db::{ChatStore, SavedDataStore};
use poppins_bot::errors::{AppError, GenerationError};
use poppins_bot::models::{Chat, SavedData};
use poppins_bot::routes::{router, AppState};
use poppins_bot::service::{ChatService, SavedDataService};

pub const SECRET: &str = "test-session-secret";

// ── Model ────────────────────────────────────────────────────────────────────

struct ScriptedTurn {
    events: Vec<TurnEvent>,
    /// Keep the stream open after the last event instead of ending it.
    hangs: bool,
}

/// Counts turn streams as they are dropped by the consumer.
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Replays queued turns and canned structured outputs, recording every request.
#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<Result<ScriptedTurn, GenerationError>>>,
    objects: Mutex<HashMap<String, Value>>,
    pub turn_requests: Mutex<Vec<TurnRequest>>,
    pub object_requests: Mutex<Vec<ObjectRequest>>,
    pub dropped_turns: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turn(self, events: Vec<TurnEvent>) -> Self {
        self.turns.lock().unwrap().push_back(Ok(ScriptedTurn { events, hangs: false }));
        self
    }

    /// A turn that emits `events` and then never finishes.
    pub fn with_hanging_turn(self, events: Vec<TurnEvent>) -> Self {
        self.turns.lock().unwrap().push_back(Ok(ScriptedTurn { events, hangs: true }));
        self
    }

    pub fn with_failed_turn(self, error: GenerationError) -> Self {
        self.turns.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_object(self, name: &str, value: Value) -> Self {
        self.objects.lock().unwrap().insert(name.to_string(), value);
        self
    }

    pub fn turn_count(&self) -> usize {
        self.turn_requests.lock().unwrap().len()
    }

    pub fn object_count(&self) -> usize {
        self.object_requests.lock().unwrap().len()
    }

    pub fn dropped_turn_count(&self) -> usize {
        self.dropped_turns.load(Ordering::SeqCst)
    }
}

pub fn text(delta: &str) -> TurnEvent {
    TurnEvent::TextDelta(delta.to_string())
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> TurnEvent {
    TurnEvent::ToolCall { id: id.to_string(), name: name.to_string(), arguments }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate_object(&self, request: ObjectRequest) -> Result<Value, GenerationError> {
        let value = self.objects.lock().unwrap().get(&request.name).cloned();
        let name = request.name.clone();
        self.object_requests.lock().unwrap().push(request);
        value.ok_or(GenerationError::Inference { message: format!("no scripted output for {name}") })
    }

    async fn stream_turn(&self, request: TurnRequest) -> Result<TurnStream, GenerationError> {
        self.turn_requests.lock().unwrap().push(request);
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ScriptedTurn { events: Vec::new(), hangs: false }))?;
        let tail: TurnStream =
            if turn.hangs { stream::pending().boxed() } else { stream::empty().boxed() };
        let guard = DropCounter(self.dropped_turns.clone());
        Ok(stream::iter(turn.events.into_iter().map(Ok))
            .chain(tail)
            .map(move |event| {
                let _held = &guard;
                event
            })
            .boxed())
    }
}

// ── Stores ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryChatStore {
    chats: Mutex<HashMap<String, Chat>>,
    pub fail_saves: AtomicBool,
}

impl MemoryChatStore {
    pub fn get(&self, id: &str) -> Option<Chat> {
        self.chats.lock().unwrap().get(id).cloned()
    }

    pub fn insert(&self, chat: Chat) {
        self.chats.lock().unwrap().insert(chat.id.clone(), chat);
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn save_chat(&self, chat: &Chat) -> Result<(), AppError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::Unexpected("store offline".to_string()));
        }
        let mut chats = self.chats.lock().unwrap();
        if let Some(existing) = chats.get_mut(&chat.id) {
            if existing.user_id != chat.user_id {
                return Err(AppError::Unauthorized);
            }
            existing.messages = chat.messages.clone();
        } else {
            chats.insert(chat.id.clone(), chat.clone());
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Chat>, AppError> {
        Ok(self.get(id))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.chats.lock().unwrap().remove(id).is_some())
    }
}

#[derive(Default)]
pub struct MemorySavedDataStore {
    records: Mutex<HashMap<String, SavedData>>,
}

impl MemorySavedDataStore {
    pub fn get(&self, id: &str) -> Option<SavedData> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn insert(&self, id: &str, user_id: &str, fields: Value) {
        let Value::Object(fields) = fields else { panic!("fields must be an object") };
        let record = SavedData::new(id.to_string(), user_id.to_string(), fields);
        self.records.lock().unwrap().insert(id.to_string(), record);
    }
}

#[async_trait]
impl SavedDataStore for MemorySavedDataStore {
    async fn create(&self, record: &SavedData) -> Result<SavedData, AppError> {
        self.records.lock().unwrap().insert(record.id.clone(), record.clone());
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SavedData>, AppError> {
        Ok(self.get(id))
    }

    async fn update(
        &self,
        id: &str,
        updates: Map<String, Value>,
    ) -> Result<Option<SavedData>, AppError> {
        let mut records = self.records.lock().unwrap();
        Ok(records.get_mut(id).map(|record| {
            record.fields.extend(updates);
            record.clone()
        }))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.records.lock().unwrap().remove(id).is_some())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct TestApp {
    pub router: Router,
    pub model: Arc<ScriptedModel>,
    pub chats: Arc<MemoryChatStore>,
    pub saved_data: Arc<MemorySavedDataStore>,
    verifier: Arc<JwtSessionVerifier>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

impl TestApp {
    pub fn new(model: ScriptedModel) -> Self {
        let model = Arc::new(model);
        let chats = Arc::new(MemoryChatStore::default());
        let saved_data = Arc::new(MemorySavedDataStore::default());
        let verifier = Arc::new(JwtSessionVerifier::new(SECRET));

        let state = AppState {
            chat: ChatService::new(
                model.clone(),
                Arc::new(ToolRegistry::parenting()),
                chats.clone(),
            ),
            saved_data: SavedDataService::new(saved_data.clone()),
            sessions: verifier.clone(),
        };

        Self { router: router(state), model, chats, saved_data, verifier }
    }

    pub fn token(&self, user_id: &str) -> String {
        self.verifier.issue(user_id, None, chrono::Duration::hours(1)).unwrap()
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.raw_request(method, uri, user, body.map(|b| b.to_string())).await
    }

    pub async fn raw_request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<String>,
    ) -> TestResponse {
        let response = self.open(method, uri, user, body).await;
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse { status, content_type, body: String::from_utf8(bytes.to_vec()).unwrap() }
    }

    /// Sends a request and hands back the response with its body unread.
    pub async fn open(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<String>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("authorization", format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Chat persistence runs after the body is closed, so poll for it.
    pub async fn wait_for_chat(&self, id: &str) -> Option<Chat> {
        self.wait_for_chat_where(id, |_| true).await
    }

    pub async fn wait_for_chat_where(&self, id: &str, ready: impl Fn(&Chat) -> bool) -> Option<Chat> {
        for _ in 0..100 {
            if let Some(chat) = self.chats.get(id).filter(|chat| ready(chat)) {
                return Some(chat);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    /// Polls until `done` holds, giving spawned work time to finish.
    pub async fn eventually(&self, done: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if done() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
