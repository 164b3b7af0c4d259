//! Playlist endpoints

use axum::{extract::State, Extension};

use super::reply;
use crate::db::{playlists, Identity};
use crate::error::{ApiError, Result};
use crate::subsonic::payload::{PlaylistWithSongs, Playlists};
use crate::subsonic::{Payload, Reply, RequestParams};
use crate::AppState;

/// GET /rest/getPlaylists
///
/// The caller's own playlists plus every public one. Admins may pass
/// `username` to list that user's playlists instead.
pub async fn get_playlists(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
    Extension(identity): Extension<Identity>,
) -> Reply {
    reply(&params, list(&state, &params, &identity).await)
}

async fn list(state: &AppState, params: &RequestParams, identity: &Identity) -> Result<Payload> {
    let records = match params.get_non_empty("username") {
        Some(username) if username != identity.username => {
            if !identity.is_admin {
                return Err(ApiError::NotFound(format!("User '{}'", username)));
            }
            let owner = state
                .credentials
                .lookup_by_username(username)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("User '{}'", username)))?;
            playlists::playlists_owned_by(&state.db, owner.id).await?
        }
        _ => playlists::playlists_visible_to(&state.db, identity.id).await?,
    };

    Ok(Payload::Playlists(Playlists {
        playlist: records.into_iter().map(|r| r.playlist).collect(),
    }))
}

/// GET /rest/getPlaylist
///
/// Someone else's private playlist is reported as not found.
pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
    Extension(identity): Extension<Identity>,
) -> Reply {
    reply(&params, playlist(&state, &params, &identity).await)
}

async fn playlist(state: &AppState, params: &RequestParams, identity: &Identity) -> Result<Payload> {
    let id = params.require_id("id")?;
    let record = playlists::get_playlist(&state.db, id)
        .await?
        .filter(|r| r.visible_to(identity.id, identity.is_admin))
        .ok_or_else(|| ApiError::NotFound(format!("Playlist {}", id)))?;
    let entry = playlists::playlist_entries(&state.db, id).await?;

    Ok(Payload::Playlist(PlaylistWithSongs {
        playlist: record.playlist,
        entry,
    }))
}
