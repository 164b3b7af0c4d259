//! Media retrieval: stream and download
//!
//! Byte serving (including `Range` requests) is delegated to
//! `tower_http::services::ServeFile`. Failures before the file is found are
//! answered with an error envelope like any other endpoint.

use axum::{
    body::Body,
    extract::{Request, State},
    response::{IntoResponse, Response},
    Extension,
};
use std::path::{Component, Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, warn};

use super::reply;
use crate::db::library;
use crate::error::{ApiError, Result};
use crate::subsonic::RequestParams;
use crate::AppState;

/// GET /rest/stream
///
/// Serves the original file; no transcoding.
pub async fn stream(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
    request: Request,
) -> Response {
    serve_song(&state, &params, request).await
}

/// GET /rest/download
pub async fn download(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
    request: Request,
) -> Response {
    serve_song(&state, &params, request).await
}

async fn serve_song(state: &AppState, params: &RequestParams, request: Request) -> Response {
    let path = match resolve_song_path(state, params).await {
        Ok(path) => path,
        Err(e) => return reply(params, Err(e)).into_response(),
    };

    debug!("Serving {}", path.display());
    match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.map(Body::new).into_response(),
        Err(e) => match e {},
    }
}

async fn resolve_song_path(state: &AppState, params: &RequestParams) -> Result<PathBuf> {
    let id = params.require_id("id")?;
    let file = library::song_file(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Song {}", id)))?;

    let path = music_file_path(&state.music_folder, &file.path)
        .ok_or_else(|| ApiError::NotFound(format!("Song {}", id)))?;

    if !path.is_file() {
        warn!("Song {} points at missing file {}", id, path.display());
        return Err(ApiError::NotFound(format!("Song {}", id)));
    }
    Ok(path)
}

/// Join a stored relative path onto the music folder
///
/// Absolute paths and `..` components are refused so a bad row cannot reach
/// outside the folder.
pub fn music_file_path(music_folder: &Path, relative: &Path) -> Option<PathBuf> {
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| music_folder.join(relative))
}
