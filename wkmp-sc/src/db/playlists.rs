//! Playlist queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use wkmp_common::Result;

use super::library::{song_from_row, SONG_SELECT};
use crate::subsonic::payload::{Child, Playlist};

const PLAYLIST_SELECT: &str = r#"
    SELECT p.id, p.name, p.comment, p.owner_id, p.is_public, u.username AS owner,
           strftime('%Y-%m-%dT%H:%M:%SZ', p.created_at) AS created,
           strftime('%Y-%m-%dT%H:%M:%SZ', p.updated_at) AS changed,
           (SELECT COUNT(*) FROM playlist_songs ps WHERE ps.playlist_id = p.id) AS song_count,
           (SELECT COALESCE(SUM(s.duration_seconds), 0)
              FROM playlist_songs ps JOIN songs s ON s.id = ps.song_id
             WHERE ps.playlist_id = p.id) AS duration
    FROM playlists p
    JOIN users u ON u.id = p.owner_id
"#;

/// A playlist together with the id of its owner
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistRecord {
    pub owner_id: i64,
    pub playlist: Playlist,
}

impl PlaylistRecord {
    /// Owners and admins see everything; others see only public playlists
    pub fn visible_to(&self, user_id: i64, is_admin: bool) -> bool {
        is_admin || self.owner_id == user_id || self.playlist.public
    }
}

fn playlist_from_row(row: &SqliteRow) -> PlaylistRecord {
    PlaylistRecord {
        owner_id: row.get("owner_id"),
        playlist: Playlist {
            id: row.get::<i64, _>("id").to_string(),
            name: row.get("name"),
            comment: row.get("comment"),
            owner: row.get("owner"),
            public: row.get::<i64, _>("is_public") != 0,
            song_count: row.get("song_count"),
            duration: row.get("duration"),
            created: row.get::<Option<String>, _>("created").unwrap_or_default(),
            changed: row.get::<Option<String>, _>("changed").unwrap_or_default(),
        },
    }
}

/// Playlists owned by `user_id` plus every public playlist
pub async fn playlists_visible_to(db: &SqlitePool, user_id: i64) -> Result<Vec<PlaylistRecord>> {
    let sql = format!(
        "{} WHERE p.owner_id = ? OR p.is_public = 1 ORDER BY p.name COLLATE NOCASE, p.id",
        PLAYLIST_SELECT
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(db).await?;

    Ok(rows.iter().map(playlist_from_row).collect())
}

/// Every playlist owned by `user_id`, public or not
pub async fn playlists_owned_by(db: &SqlitePool, user_id: i64) -> Result<Vec<PlaylistRecord>> {
    let sql = format!(
        "{} WHERE p.owner_id = ? ORDER BY p.name COLLATE NOCASE, p.id",
        PLAYLIST_SELECT
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(db).await?;

    Ok(rows.iter().map(playlist_from_row).collect())
}

pub async fn get_playlist(db: &SqlitePool, playlist_id: i64) -> Result<Option<PlaylistRecord>> {
    let sql = format!("{} WHERE p.id = ?", PLAYLIST_SELECT);
    let row = sqlx::query(&sql).bind(playlist_id).fetch_optional(db).await?;

    Ok(row.as_ref().map(playlist_from_row))
}

/// Songs of a playlist in playlist order (duplicates preserved)
pub async fn playlist_entries(db: &SqlitePool, playlist_id: i64) -> Result<Vec<Child>> {
    let sql = format!(
        "{} JOIN playlist_songs ps ON ps.song_id = s.id WHERE ps.playlist_id = ? ORDER BY ps.position",
        SONG_SELECT
    );
    let rows = sqlx::query(&sql).bind(playlist_id).fetch_all(db).await?;

    Ok(rows.iter().map(song_from_row).collect())
}
