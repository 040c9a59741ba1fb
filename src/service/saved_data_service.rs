use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::ensure_owner;
use crate::auth::Session;
use crate::db::SavedDataStore;
use crate::errors::AppError;
use crate::models::{SavedData, PROTECTED_FIELDS};

const INVALID_UPDATE: &str = "Invalid update payload!";

/// Accepts `["a", "b"]` or `[{"tip": "a"}]` and always yields the latter.
/// `null` is kept so a client can clear the list.
fn normalize_tips(value: Value) -> Result<Value, AppError> {
    let items = match value {
        Value::Null => return Ok(Value::Null),
        Value::Array(items) => items,
        _ => return Err(AppError::invalid_payload(INVALID_UPDATE)),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(tip) => Ok(json!({ "tip": tip })),
            Value::Object(ref fields) if fields.get("tip").is_some_and(Value::is_string) => Ok(item),
            _ => Err(AppError::invalid_payload(INVALID_UPDATE)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Drops record-owned keys and normalizes `tips`.
fn sanitize_fields(mut fields: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    for key in PROTECTED_FIELDS {
        if fields.remove(key).is_some() {
            warn!("Ignoring attempt to set protected field '{key}'");
        }
    }
    if let Some(tips) = fields.remove("tips") {
        fields.insert("tips".to_string(), normalize_tips(tips)?);
    }
    Ok(fields)
}

/// Pulls the `updates` object out of a PATCH body.
pub fn parse_updates(body: Value) -> Result<Map<String, Value>, AppError> {
    match body {
        Value::Object(mut body) => match body.remove("updates") {
            Some(Value::Object(updates)) => sanitize_fields(updates),
            _ => Err(AppError::invalid_payload(INVALID_UPDATE)),
        },
        _ => Err(AppError::invalid_payload(INVALID_UPDATE)),
    }
}

#[derive(Clone)]
pub struct SavedDataService {
    records: Arc<dyn SavedDataStore>,
}

impl SavedDataService {
    pub fn new(records: Arc<dyn SavedDataStore>) -> Self {
        Self { records }
    }

    pub async fn create(&self, session: &Session, body: Value) -> Result<SavedData, AppError> {
        let Value::Object(fields) = body else {
            return Err(AppError::invalid_payload("Invalid payload!"));
        };
        let record = SavedData::new(
            Uuid::new_v4().to_string(),
            session.user_id().to_string(),
            sanitize_fields(fields)?,
        );
        let created = self.records.create(&record).await?;
        info!("Created saved data {} for user {}", created.id, created.user_id);
        Ok(created)
    }

    /// Loads the record and checks it belongs to the session user.
    pub async fn get(&self, session: &Session, id: &str) -> Result<SavedData, AppError> {
        let record = self
            .records
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Data not found!"))?;
        ensure_owner(&record.user_id, session)?;
        Ok(record)
    }

    /// Ownership is checked before the payload is looked at.
    pub async fn update(
        &self,
        session: &Session,
        id: &str,
        body: Result<Value, AppError>,
    ) -> Result<SavedData, AppError> {
        self.get(session, id).await?;
        let updates = parse_updates(body?)?;
        self.records
            .update(id, updates)
            .await?
            .ok_or_else(|| AppError::not_found("Data not found!"))
    }

    pub async fn delete(&self, session: &Session, id: &str) -> Result<(), AppError> {
        self.get(session, id).await?;
        if !self.records.delete_by_id(id).await? {
            return Err(AppError::not_found("Data not found!"));
        }
        info!("Deleted saved data {id}");
        Ok(())
    }
}
