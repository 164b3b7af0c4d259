//! User endpoints

use axum::{extract::State, Extension};

use super::reply;
use crate::db::Identity;
use crate::error::{ApiError, Result};
use crate::subsonic::payload::User;
use crate::subsonic::{Payload, Reply, RequestParams};
use crate::{AppState, MUSIC_FOLDER_ID};

/// GET /rest/getUser
///
/// Non-admins may only look themselves up; any other name is "not found".
pub async fn get_user(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
    Extension(identity): Extension<Identity>,
) -> Reply {
    reply(&params, user(&state, &params, &identity).await)
}

async fn user(state: &AppState, params: &RequestParams, identity: &Identity) -> Result<Payload> {
    let username = params.require("username")?;
    if !identity.is_admin && username != identity.username {
        return Err(ApiError::NotFound(format!("User '{}'", username)));
    }

    let record = state
        .credentials
        .lookup_by_username(username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User '{}'", username)))?;

    Ok(Payload::User(User::with_roles(
        record.username,
        record.email,
        record.is_admin,
        MUSIC_FOLDER_ID,
    )))
}
