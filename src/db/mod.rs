pub mod chat_repository;
pub mod saved_data_repository;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{Chat, SavedData};

pub use chat_repository::ChatRepository;
pub use saved_data_repository::SavedDataRepository;

/// Chat transcripts keyed by chat id.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Inserts the chat or replaces its messages. A chat owned by another
    /// user is left untouched and the call fails with `Unauthorized`.
    async fn save_chat(&self, chat: &Chat) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Chat>, AppError>;

    /// Returns whether a row was removed.
    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError>;
}

/// User-owned saved records keyed by record id.
#[async_trait]
pub trait SavedDataStore: Send + Sync {
    async fn create(&self, record: &SavedData) -> Result<SavedData, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<SavedData>, AppError>;

    /// Shallow-merges `updates` into the record's fields.
    async fn update(
        &self,
        id: &str,
        updates: Map<String, Value>,
    ) -> Result<Option<SavedData>, AppError>;

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError>;
}
