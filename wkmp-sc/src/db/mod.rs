//! Database access for wkmp-sc
//!
//! Schema creation lives in `wkmp_common::db`; this module holds the queries
//! the Subsonic endpoints need.

pub mod library;
pub mod playlists;
pub mod users;

pub use users::{CredentialRecord, CredentialStore, Identity, SqliteCredentialStore};
