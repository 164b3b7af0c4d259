//! System endpoints: ping, license, extensions, token info

use axum::Extension;

use super::reply;
use crate::db::Identity;
use crate::subsonic::payload::{License, OpenSubsonicExtension, TokenInfo};
use crate::subsonic::{Envelope, Payload, Reply, RequestParams};

/// OpenSubsonic extensions this server implements, with supported versions
pub const EXTENSIONS: &[(&str, &[u32])] = &[("apiKeyAuthentication", &[1]), ("formPost", &[1])];

/// GET /rest/ping
///
/// Also serves as the capability probe: carries product name and version.
pub async fn ping(Extension(params): Extension<RequestParams>) -> Reply {
    Reply::new(Envelope::probe(), params.format())
}

/// GET /rest/getLicense
pub async fn get_license(Extension(params): Extension<RequestParams>) -> Reply {
    reply(&params, Ok(Payload::License(License { valid: true })))
}

/// GET /rest/getOpenSubsonicExtensions
///
/// Public: clients query it before they know how to authenticate.
pub async fn get_open_subsonic_extensions(Extension(params): Extension<RequestParams>) -> Reply {
    let extensions = EXTENSIONS
        .iter()
        .map(|(name, versions)| OpenSubsonicExtension::new(name, versions))
        .collect();
    reply(&params, Ok(Payload::OpenSubsonicExtensions(extensions)))
}

/// GET /rest/tokenInfo
pub async fn token_info(
    Extension(params): Extension<RequestParams>,
    Extension(identity): Extension<Identity>,
) -> Reply {
    reply(
        &params,
        Ok(Payload::TokenInfo(TokenInfo {
            username: identity.username,
        })),
    )
}
