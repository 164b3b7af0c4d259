//! Library browsing by ID3 tags: folders, artists, albums, songs

use axum::{extract::State, Extension};
use std::collections::BTreeMap;

use super::reply;
use crate::db::library;
use crate::error::{ApiError, Result};
use crate::subsonic::payload::{
    AlbumWithSongs, Artist, ArtistIndex, ArtistWithAlbums, Artists, MusicFolder, MusicFolders,
};
use crate::subsonic::{Payload, Reply, RequestParams};
use crate::{AppState, MUSIC_FOLDER_ID};

/// Leading articles skipped when indexing artist names
pub const IGNORED_ARTICLES: &[&str] = &["The", "El", "La", "Los", "Las", "Le", "Les"];

/// Index bucket for names that do not start with a letter
const NON_LETTER_INDEX: &str = "#";

/// GET /rest/getMusicFolders
pub async fn get_music_folders(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
) -> Reply {
    let name = state
        .music_folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Music".to_string());

    reply(
        &params,
        Ok(Payload::MusicFolders(MusicFolders {
            music_folder: vec![MusicFolder {
                id: MUSIC_FOLDER_ID,
                name,
            }],
        })),
    )
}

/// GET /rest/getArtists
pub async fn get_artists(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
) -> Reply {
    let result = library::list_artists(&state.db)
        .await
        .map(|artists| Payload::Artists(index_artists(artists)))
        .map_err(ApiError::from);
    reply(&params, result)
}

/// GET /rest/getArtist
pub async fn get_artist(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
) -> Reply {
    reply(&params, artist(&state, &params).await)
}

async fn artist(state: &AppState, params: &RequestParams) -> Result<Payload> {
    let id = params.require_id("id")?;
    let artist = library::get_artist(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Artist {}", id)))?;
    let album = library::albums_for_artist(&state.db, id).await?;

    Ok(Payload::Artist(ArtistWithAlbums { artist, album }))
}

/// GET /rest/getAlbum
pub async fn get_album(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
) -> Reply {
    reply(&params, album(&state, &params).await)
}

async fn album(state: &AppState, params: &RequestParams) -> Result<Payload> {
    let id = params.require_id("id")?;
    let album = library::get_album(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Album {}", id)))?;
    let song = library::songs_for_album(&state.db, id).await?;

    Ok(Payload::Album(AlbumWithSongs { album, song }))
}

/// GET /rest/getSong
pub async fn get_song(
    State(state): State<AppState>,
    Extension(params): Extension<RequestParams>,
) -> Reply {
    reply(&params, song(&state, &params).await)
}

async fn song(state: &AppState, params: &RequestParams) -> Result<Payload> {
    let id = params.require_id("id")?;
    let song = library::get_song(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Song {}", id)))?;

    Ok(Payload::Song(song))
}

/// Name with any leading ignored article removed (`"The Who"` → `"Who"`)
pub fn sort_name(name: &str) -> &str {
    let trimmed = name.trim_start();
    for article in IGNORED_ARTICLES {
        if let Some(rest) = strip_prefix_ignore_case(trimmed, article) {
            if let Some(rest) = rest.strip_prefix(' ') {
                let rest = rest.trim_start();
                if !rest.is_empty() {
                    return rest;
                }
            }
        }
    }
    trimmed
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

/// Index bucket an artist belongs to
pub fn index_key(name: &str) -> String {
    match sort_name(name).chars().next() {
        Some(c) if c.is_alphabetic() => c.to_uppercase().collect(),
        _ => NON_LETTER_INDEX.to_string(),
    }
}

/// Group artists into alphabetical buckets, each sorted by article-less name
pub fn index_artists(artists: Vec<Artist>) -> Artists {
    let mut buckets: BTreeMap<String, Vec<Artist>> = BTreeMap::new();
    for artist in artists {
        buckets.entry(index_key(&artist.name)).or_default().push(artist);
    }

    let index = buckets
        .into_iter()
        .map(|(name, mut artist)| {
            artist.sort_by_cached_key(|a| sort_name(&a.name).to_lowercase());
            ArtistIndex { name, artist }
        })
        .collect();

    Artists {
        ignored_articles: IGNORED_ARTICLES.join(" "),
        index,
    }
}
