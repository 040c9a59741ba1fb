use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{Chat, ChatRequest, IdQuery};
use crate::service::{require_id, ChatService};

/// POST `/api/chat` — streams the assistant reply as plain text.
pub async fn send_message_handler(
    session: Session,
    State(svc): State<ChatService>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected chat body: {e}");
        AppError::invalid_payload("Invalid request body!")
    })?;

    let reply = svc.send_message(&session, request).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(reply),
    )
        .into_response())
}

/// GET `/api/chat?id=` — the owner's stored transcript.
pub async fn get_chat_handler(
    session: Session,
    State(svc): State<ChatService>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Chat>, AppError> {
    let id = require_id(query.id.as_deref())?;
    Ok(Json(svc.get_chat(&session, id).await?))
}

/// DELETE `/api/chat?id=`
pub async fn delete_chat_handler(
    session: Session,
    State(svc): State<ChatService>,
    Query(query): Query<IdQuery>,
) -> Result<&'static str, AppError> {
    let id = require_id(query.id.as_deref())?;
    svc.delete_chat(&session, id).await?;
    Ok("Chat deleted")
}
