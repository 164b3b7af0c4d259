//! wkmp-sc library - Subsonic Compatibility module
//!
//! Serves the Subsonic/OpenSubsonic REST API over the WKMP library so
//! third-party players can browse and stream it.

use axum::{
    handler::Handler,
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use wkmp_common::api::TokenCodec;

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod subsonic;

use db::{CredentialStore, SqliteCredentialStore};

/// Issuer claim of bearer tokens minted by this module
pub const TOKEN_ISSUER: &str = "wkmp-sc";

/// Id of the single music folder exposed to clients
pub const MUSIC_FOLDER_ID: i64 = 1;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Credential lookups for authentication
    pub credentials: Arc<dyn CredentialStore>,
    /// Bearer token codec
    pub tokens: TokenCodec,
    /// Root that song paths are relative to
    pub music_folder: PathBuf,
}

impl AppState {
    /// Create new application state backed by the `users` table
    pub fn new(db: SqlitePool, tokens: TokenCodec, music_folder: PathBuf) -> Self {
        let credentials = Arc::new(SqliteCredentialStore::new(db.clone()));
        Self {
            db,
            credentials,
            tokens,
            music_folder,
        }
    }

    /// Replace the credential store
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// `GET`+`POST` handler for `/rest/<name>` and `/rest/<name>.view`
fn rest_route<H, T>(router: Router<AppState>, name: &str, handler: H) -> Router<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    let method: MethodRouter<AppState> = get(handler.clone()).post(handler);
    router
        .route(&format!("/rest/{}", name), method.clone())
        .route(&format!("/rest/{}.view", name), method)
}

/// Build application router
///
/// All `/rest` routes get merged request parameters; every one except
/// `getOpenSubsonicExtensions` also requires authentication.
pub fn build_router(state: AppState) -> Router {
    let mut protected = Router::new();
    protected = rest_route(protected, "ping", api::ping);
    protected = rest_route(protected, "getLicense", api::get_license);
    protected = rest_route(protected, "tokenInfo", api::token_info);
    protected = rest_route(protected, "getUser", api::get_user);
    protected = rest_route(protected, "getMusicFolders", api::get_music_folders);
    protected = rest_route(protected, "getArtists", api::get_artists);
    protected = rest_route(protected, "getArtist", api::get_artist);
    protected = rest_route(protected, "getAlbum", api::get_album);
    protected = rest_route(protected, "getSong", api::get_song);
    protected = rest_route(protected, "getPlaylists", api::get_playlists);
    protected = rest_route(protected, "getPlaylist", api::get_playlist);
    protected = rest_route(protected, "stream", api::stream);
    protected = rest_route(protected, "download", api::download);
    let protected = protected.route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_auth,
    ));

    let public = rest_route(
        Router::new(),
        "getOpenSubsonicExtensions",
        api::get_open_subsonic_extensions,
    );

    let rest = Router::new()
        .merge(protected)
        .merge(public)
        .layer(middleware::from_fn(auth::collect_params));

    Router::new()
        .merge(rest)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
