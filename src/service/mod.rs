pub mod chat_service;
pub mod saved_data_service;

use tracing::warn;

use crate::auth::Session;
use crate::errors::AppError;

pub use chat_service::ChatService;
pub use saved_data_service::SavedDataService;

/// Fails with `Unauthorized` unless the record's owner is the session user.
pub fn ensure_owner(owner_id: &str, session: &Session) -> Result<(), AppError> {
    if owner_id == session.user_id() {
        Ok(())
    } else {
        warn!("User {} denied access to a record owned by another user", session.user_id());
        Err(AppError::Unauthorized)
    }
}

/// Rejects absent or blank ids the way the routes report a missing resource.
pub fn require_id(id: Option<&str>) -> Result<&str, AppError> {
    id.filter(|id| !id.trim().is_empty()).ok_or_else(|| AppError::not_found("Not Found!"))
}
