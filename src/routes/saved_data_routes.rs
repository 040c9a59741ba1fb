use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{IdQuery, SavedData};
use crate::service::{require_id, SavedDataService};

fn invalid_body(_: JsonRejection) -> AppError {
    AppError::invalid_payload("Invalid update payload!")
}

/// GET `/api/saved-data?id=` — JSON record, or the tips as text with `format=text`.
pub async fn get_saved_data_handler(
    session: Session,
    State(svc): State<SavedDataService>,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    let id = require_id(query.id.as_deref())?;
    let record = svc.get(&session, id).await?;

    if query.wants_text() {
        if let Some(text) = record.render_tips() {
            return Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response());
        }
    }
    Ok(Json(record).into_response())
}

/// PATCH `/api/saved-data?id=` with `{ "updates": { ... } }`.
pub async fn patch_saved_data_handler(
    session: Session,
    State(svc): State<SavedDataService>,
    Query(query): Query<IdQuery>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SavedData>, AppError> {
    let id = require_id(query.id.as_deref())?;
    let body = payload.map(|Json(body)| body).map_err(invalid_body);
    Ok(Json(svc.update(&session, id, body).await?))
}

/// DELETE `/api/saved-data?id=`
pub async fn delete_saved_data_handler(
    session: Session,
    State(svc): State<SavedDataService>,
    Query(query): Query<IdQuery>,
) -> Result<&'static str, AppError> {
    let id = require_id(query.id.as_deref())?;
    svc.delete(&session, id).await?;
    Ok("Data deleted")
}

/// POST `/api/saved-data` — creates a record owned by the session user.
pub async fn create_saved_data_handler(
    session: Session,
    State(svc): State<SavedDataService>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedData>), AppError> {
    let Json(body) = payload.map_err(|_| AppError::invalid_payload("Invalid payload!"))?;
    let record = svc.create(&session, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
