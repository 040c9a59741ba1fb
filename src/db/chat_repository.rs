use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::error;

use super::ChatStore;
use crate::errors::AppError;
use crate::models::{Chat, Message};

#[derive(Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn chat_from_row(row: PgRow) -> Result<Chat, AppError> {
    let messages: Json<Vec<Message>> = row
        .try_get("messages")
        .map_err(|e| AppError::db_query("Failed to read messages", e))?;
    Ok(Chat {
        id: row.try_get("id").map_err(|e| AppError::db_query("Failed to read id", e))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| AppError::db_query("Failed to read user_id", e))?,
        messages: messages.0,
        created_at: row
            .try_get("created_at")
            .map_err(|e| AppError::db_query("Failed to read created_at", e))?,
    })
}

#[async_trait]
impl ChatStore for ChatRepository {
    async fn save_chat(&self, chat: &Chat) -> Result<(), AppError> {
        let result = sqlx::query(
            "INSERT INTO chats (id, user_id, messages, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET messages = EXCLUDED.messages
             WHERE chats.user_id = EXCLUDED.user_id",
        )
        .bind(&chat.id)
        .bind(&chat.user_id)
        .bind(Json(&chat.messages))
        .bind(chat.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save chat {}: {e}", chat.id);
            AppError::db_query("Failed to save chat", e)
        })?;

        if result.rows_affected() == 0 {
            error!("Refused to overwrite chat {} owned by another user", chat.id);
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query("SELECT id, user_id, messages, created_at FROM chats WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to find chat {id}: {e}");
                AppError::db_query(format!("Failed to find chat {id}"), e)
            })?;
        row.map(chat_from_row).transpose()
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to delete chat {id}: {e}");
                AppError::db_query("Failed to delete chat", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}
