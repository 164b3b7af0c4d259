//! HTTP API handlers for wkmp-sc
//!
//! Every `/rest` handler ends by handing a `Result<Payload>` to [`reply`], so
//! the envelope decides wire format and HTTP status in one place.

pub mod browsing;
pub mod health;
pub mod media;
pub mod playlists;
pub mod system;
pub mod users;

pub use browsing::{get_album, get_artist, get_artists, get_music_folders, get_song};
pub use health::health_routes;
pub use media::{download, stream};
pub use playlists::{get_playlist, get_playlists};
pub use system::{get_license, get_open_subsonic_extensions, ping, token_info};
pub use users::get_user;

use crate::error::Result;
use crate::subsonic::{Envelope, Payload, Reply, RequestParams};

/// Wrap a handler result in the envelope, in the format the client asked for
pub fn reply(params: &RequestParams, result: Result<Payload>) -> Reply {
    Reply::new(Envelope::from_result(result), params.format())
}
