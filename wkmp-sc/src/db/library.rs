//! Catalogue queries
//!
//! Read-only lookups over `artists`, `albums` and `songs`, returning the
//! protocol payload shapes directly. Ids go out as strings, as clients expect.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use wkmp_common::Result;

use crate::subsonic::payload::{Album, Artist, Child};

/// Media type reported for every song
const MEDIA_TYPE_MUSIC: &str = "music";

const ALBUM_SELECT: &str = r#"
    SELECT al.id, al.name, al.year, al.artist_id, ar.name AS artist,
           strftime('%Y-%m-%dT%H:%M:%SZ', al.created_at) AS created,
           (SELECT COUNT(*) FROM songs s WHERE s.album_id = al.id) AS song_count,
           (SELECT COALESCE(SUM(s.duration_seconds), 0) FROM songs s WHERE s.album_id = al.id) AS duration
    FROM albums al
    JOIN artists ar ON ar.id = al.artist_id
"#;

pub(crate) const SONG_SELECT: &str = r#"
    SELECT s.id, s.album_id, s.artist_id, s.title, s.track, s.year,
           s.duration_seconds, s.size_bytes, s.path, s.suffix, s.content_type,
           al.name AS album, ar.name AS artist,
           strftime('%Y-%m-%dT%H:%M:%SZ', s.created_at) AS created
    FROM songs s
    JOIN albums al ON al.id = s.album_id
    JOIN artists ar ON ar.id = s.artist_id
"#;

/// Location of a song's file, relative to the music folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongFile {
    pub path: PathBuf,
    pub content_type: String,
}

fn artist_from_row(row: &SqliteRow) -> Artist {
    Artist {
        id: row.get::<i64, _>("id").to_string(),
        name: row.get("name"),
        album_count: row.get("album_count"),
    }
}

fn album_from_row(row: &SqliteRow) -> Album {
    Album {
        id: row.get::<i64, _>("id").to_string(),
        name: row.get("name"),
        artist: row.get("artist"),
        artist_id: row.get::<i64, _>("artist_id").to_string(),
        song_count: row.get("song_count"),
        duration: row.get("duration"),
        year: row.get("year"),
        created: row.get::<Option<String>, _>("created").unwrap_or_default(),
    }
}

pub(crate) fn song_from_row(row: &SqliteRow) -> Child {
    let album_id = row.get::<i64, _>("album_id").to_string();
    Child {
        id: row.get::<i64, _>("id").to_string(),
        parent: album_id.clone(),
        is_dir: false,
        title: row.get("title"),
        album: row.get("album"),
        artist: row.get("artist"),
        track: row.get("track"),
        year: row.get("year"),
        size: row.get("size_bytes"),
        content_type: row.get("content_type"),
        suffix: row.get("suffix"),
        duration: row.get("duration_seconds"),
        path: row.get("path"),
        album_id,
        artist_id: row.get::<i64, _>("artist_id").to_string(),
        media_type: MEDIA_TYPE_MUSIC.to_string(),
        created: row.get::<Option<String>, _>("created").unwrap_or_default(),
    }
}

/// All artists with their album counts, ordered by name
pub async fn list_artists(db: &SqlitePool) -> Result<Vec<Artist>> {
    let rows = sqlx::query(
        r#"
        SELECT ar.id, ar.name, COUNT(al.id) AS album_count
        FROM artists ar
        LEFT JOIN albums al ON al.artist_id = ar.id
        GROUP BY ar.id
        ORDER BY ar.name COLLATE NOCASE
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows.iter().map(artist_from_row).collect())
}

pub async fn get_artist(db: &SqlitePool, artist_id: i64) -> Result<Option<Artist>> {
    let row = sqlx::query(
        r#"
        SELECT ar.id, ar.name, COUNT(al.id) AS album_count
        FROM artists ar
        LEFT JOIN albums al ON al.artist_id = ar.id
        WHERE ar.id = ?
        GROUP BY ar.id
        "#,
    )
    .bind(artist_id)
    .fetch_optional(db)
    .await?;

    Ok(row.as_ref().map(artist_from_row))
}

/// Albums by one artist, oldest first
pub async fn albums_for_artist(db: &SqlitePool, artist_id: i64) -> Result<Vec<Album>> {
    let sql = format!(
        "{} WHERE al.artist_id = ? ORDER BY al.year, al.name COLLATE NOCASE",
        ALBUM_SELECT
    );
    let rows = sqlx::query(&sql).bind(artist_id).fetch_all(db).await?;

    Ok(rows.iter().map(album_from_row).collect())
}

pub async fn get_album(db: &SqlitePool, album_id: i64) -> Result<Option<Album>> {
    let sql = format!("{} WHERE al.id = ?", ALBUM_SELECT);
    let row = sqlx::query(&sql).bind(album_id).fetch_optional(db).await?;

    Ok(row.as_ref().map(album_from_row))
}

/// Songs on one album in track order
pub async fn songs_for_album(db: &SqlitePool, album_id: i64) -> Result<Vec<Child>> {
    let sql = format!(
        "{} WHERE s.album_id = ? ORDER BY s.track, s.title COLLATE NOCASE",
        SONG_SELECT
    );
    let rows = sqlx::query(&sql).bind(album_id).fetch_all(db).await?;

    Ok(rows.iter().map(song_from_row).collect())
}

pub async fn get_song(db: &SqlitePool, song_id: i64) -> Result<Option<Child>> {
    let sql = format!("{} WHERE s.id = ?", SONG_SELECT);
    let row = sqlx::query(&sql).bind(song_id).fetch_optional(db).await?;

    Ok(row.as_ref().map(song_from_row))
}

pub async fn song_file(db: &SqlitePool, song_id: i64) -> Result<Option<SongFile>> {
    let row = sqlx::query("SELECT path, content_type FROM songs WHERE id = ?")
        .bind(song_id)
        .fetch_optional(db)
        .await?;

    Ok(row.map(|row| SongFile {
        path: PathBuf::from(row.get::<String, _>("path")),
        content_type: row.get("content_type"),
    }))
}
