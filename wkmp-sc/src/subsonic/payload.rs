//! Subsonic payload shapes
//!
//! Field names follow the protocol (camelCase). The same structs feed both the
//! JSON rendering and the markup rendering: scalar fields become attributes,
//! nested structs and lists become child elements.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct License {
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenSubsonicExtension {
    pub name: String,
    pub versions: Vec<u32>,
}

impl OpenSubsonicExtension {
    pub fn new(name: &str, versions: &[u32]) -> Self {
        Self {
            name: name.to_string(),
            versions: versions.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenInfo {
    pub username: String,
}

/// `user` payload
///
/// Roles not backed by a WKMP permission are reported as fixed values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub scrobbling_enabled: bool,
    pub admin_role: bool,
    pub settings_role: bool,
    pub download_role: bool,
    pub upload_role: bool,
    pub playlist_role: bool,
    pub cover_art_role: bool,
    pub comment_role: bool,
    pub podcast_role: bool,
    pub stream_role: bool,
    pub jukebox_role: bool,
    pub share_role: bool,
    pub video_conversion_role: bool,
    pub folder: Vec<i64>,
}

impl User {
    /// Role set for a WKMP user
    pub fn with_roles(username: String, email: Option<String>, is_admin: bool, folder_id: i64) -> Self {
        Self {
            username,
            email,
            scrobbling_enabled: false,
            admin_role: is_admin,
            settings_role: is_admin,
            download_role: true,
            upload_role: false,
            playlist_role: true,
            cover_art_role: false,
            comment_role: false,
            podcast_role: false,
            stream_role: true,
            jukebox_role: false,
            share_role: false,
            video_conversion_role: false,
            folder: vec![folder_id],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicFolders {
    pub music_folder: Vec<MusicFolder>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MusicFolder {
    pub id: i64,
    pub name: String,
}

/// `artists` payload: artists grouped into alphabetical indexes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artists {
    pub ignored_articles: String,
    pub index: Vec<ArtistIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistIndex {
    pub name: String,
    pub artist: Vec<Artist>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub album_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistWithAlbums {
    #[serde(flatten)]
    pub artist: Artist,
    pub album: Vec<Album>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub artist_id: String,
    pub song_count: i64,
    pub duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumWithSongs {
    #[serde(flatten)]
    pub album: Album,
    pub song: Vec<Child>,
}

/// A song as the protocol describes media files (`song`, `entry`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub id: String,
    pub parent: String,
    pub is_dir: bool,
    pub title: String,
    pub album: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    pub size: i64,
    pub content_type: String,
    pub suffix: String,
    pub duration: i64,
    pub path: String,
    pub album_id: String,
    pub artist_id: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Playlists {
    pub playlist: Vec<Playlist>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub owner: String,
    pub public: bool,
    pub song_count: i64,
    pub duration: i64,
    pub created: String,
    pub changed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistWithSongs {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub entry: Vec<Child>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_roles_follow_admin_flag() {
        let admin = User::with_roles("root".into(), None, true, 1);
        assert!(admin.admin_role && admin.settings_role);

        let user = User::with_roles("alice".into(), Some("a@example.com".into()), false, 1);
        assert!(!user.admin_role && !user.settings_role);
        assert!(user.stream_role);

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["adminRole"], json!(false));
        assert_eq!(value["email"], json!("a@example.com"));
        assert_eq!(value["folder"], json!([1]));
    }

    #[test]
    fn test_flattened_album_keeps_fields_at_one_level() {
        let album = AlbumWithSongs {
            album: Album {
                id: "3".into(),
                name: "Blue".into(),
                artist: "Joni Mitchell".into(),
                artist_id: "1".into(),
                song_count: 0,
                duration: 0,
                year: None,
                created: "2024-01-01T00:00:00Z".into(),
            },
            song: vec![],
        };

        let value = serde_json::to_value(&album).unwrap();
        assert_eq!(value["name"], json!("Blue"));
        assert_eq!(value["artistId"], json!("1"));
        assert!(value.get("year").is_none());
        assert_eq!(value["song"], json!([]));
    }
}
