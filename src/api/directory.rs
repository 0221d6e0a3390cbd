use axum::{Json, extract::State};

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::model::DirectoryEntry;

/// Alumni directory, ordered by last name. Reachable only through the
/// membership gate.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<DirectoryEntry>>, ApiError> {
    let users = state.users.list_users().await?;
    Ok(Json(users.iter().map(DirectoryEntry::from).collect()))
}
