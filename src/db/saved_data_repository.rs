use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::error;

use super::SavedDataStore;
use crate::errors::AppError;
use crate::models::{SavedData, PROTECTED_FIELDS};

#[derive(Clone)]
pub struct SavedDataRepository {
    pool: PgPool,
}

impl SavedDataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn saved_data_from_row(row: PgRow) -> Result<SavedData, AppError> {
    let id: String = row.try_get("id").map_err(|e| AppError::db_query("Failed to read id", e))?;
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| AppError::db_query("Failed to read user_id", e))?;
    let Json(data): Json<Value> = row
        .try_get("data")
        .map_err(|e| AppError::db_query("Failed to read data", e))?;
    let Value::Object(mut fields) = data else {
        return Err(AppError::CorruptRecord { id, message: "data is not a JSON object".to_string() });
    };
    for key in PROTECTED_FIELDS {
        fields.remove(key);
    }
    Ok(SavedData::new(id, user_id, fields))
}

#[async_trait]
impl SavedDataStore for SavedDataRepository {
    async fn create(&self, record: &SavedData) -> Result<SavedData, AppError> {
        sqlx::query("INSERT INTO saved_data (id, user_id, data) VALUES ($1, $2, $3)")
            .bind(&record.id)
            .bind(&record.user_id)
            .bind(Json(&record.fields))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to create saved data {}: {e}", record.id);
                AppError::db_query("Failed to create saved data", e)
            })?;
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SavedData>, AppError> {
        let row = sqlx::query("SELECT id, user_id, data FROM saved_data WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to find saved data {id}: {e}");
                AppError::db_query(format!("Failed to find saved data {id}"), e)
            })?;
        row.map(saved_data_from_row).transpose()
    }

    async fn update(
        &self,
        id: &str,
        updates: Map<String, Value>,
    ) -> Result<Option<SavedData>, AppError> {
        let row = sqlx::query(
            "UPDATE saved_data SET data = data || $2, updated_at = now()
             WHERE id = $1
             RETURNING id, user_id, data",
        )
        .bind(id)
        .bind(Json(&updates))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update saved data {id}: {e}");
            AppError::db_query("Failed to update saved data", e)
        })?;
        row.map(saved_data_from_row).transpose()
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM saved_data WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to delete saved data {id}: {e}");
                AppError::db_query("Failed to delete saved data", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}
