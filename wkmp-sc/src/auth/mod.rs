//! Subsonic authentication negotiation
//!
//! A request may authenticate with exactly one of:
//!
//! 1. `apiKey` (OpenSubsonic API key extension)
//! 2. `u` + `p` (plaintext, or `enc:` + hex)
//! 3. `u` + `t` + `s` (legacy salted MD5 digest)
//! 4. `Authorization: Bearer <token>`
//!
//! Populating more than one is rejected with code 43 before the credential
//! store is consulted. Every verification miss produces the same code-40
//! failure so responses never reveal whether a username exists.

pub mod middleware;

use axum::http::{header, HeaderMap};
use tracing::{debug, error};
use wkmp_common::api::{
    constant_time_eq, decode_hex, verify_dummy_hash, verify_hash, verify_legacy_digest, TokenCodec,
    ENCODED_PASSWORD_PREFIX,
};

use crate::db::{CredentialStore, Identity};
use crate::error::ApiError;
use crate::subsonic::RequestParams;

pub use middleware::{collect_params, require_auth};

/// Credential-bearing fields of one request
///
/// Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthFields {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub salt: Option<String>,
    pub bearer: Option<String>,
}

impl AuthFields {
    pub fn from_request(params: &RequestParams, headers: &HeaderMap) -> Self {
        let owned = |name: &str| params.get_non_empty(name).map(str::to_string);
        Self {
            api_key: owned("apiKey"),
            username: owned("u"),
            password: owned("p"),
            token: owned("t"),
            salt: owned("s"),
            bearer: bearer_token(headers),
        }
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn has_user_credentials(&self) -> bool {
        self.username.is_some() && (self.password.is_some() || self.token.is_some())
    }

    fn has_bearer(&self) -> bool {
        self.bearer.is_some()
    }

    /// Number of distinct schemes populated on this request
    pub fn scheme_count(&self) -> usize {
        [self.has_api_key(), self.has_user_credentials(), self.has_bearer()]
            .into_iter()
            .filter(|present| *present)
            .count()
    }
}

/// Token from an `Authorization: Bearer ...` header
///
/// Any other authorization scheme is ignored. A bearer header with nothing
/// after the scheme still counts as presented (and will fail verification).
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim().to_string())
}

/// Why a credential was rejected; logged, never sent to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownApiKey,
    UnknownUser,
    WrongPassword,
    MalformedEncodedPassword,
    NoLegacyPassword,
    WrongDigest,
    InvalidBearer,
}

/// Outcome of a failed negotiation
#[derive(Debug)]
pub enum AuthFailure {
    /// Code 43
    Conflict,
    /// Code 10
    Missing(&'static str),
    /// Code 40, whatever the reason
    Rejected(RejectReason),
    /// Code 0: the store failed for a reason other than a missing row
    Store(wkmp_common::Error),
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Conflict => ApiError::ConflictingAuth,
            AuthFailure::Missing(name) => ApiError::MissingParameter(name.to_string()),
            AuthFailure::Rejected(_) => ApiError::AuthenticationFailed,
            AuthFailure::Store(wkmp_common::Error::Database(e)) => ApiError::Database(e),
            AuthFailure::Store(e) => ApiError::Internal(format!("Credential store failure: {}", e)),
        }
    }
}

fn reject(reason: RejectReason) -> AuthFailure {
    debug!("Authentication rejected: {:?}", reason);
    AuthFailure::Rejected(reason)
}

fn store_failure(err: wkmp_common::Error) -> AuthFailure {
    error!("Credential store lookup failed: {}", err);
    AuthFailure::Store(err)
}

/// Resolve the caller's identity from the request's auth fields
///
/// `now` (unix seconds) is only used to check bearer token expiry.
pub async fn negotiate<S: CredentialStore + ?Sized>(
    store: &S,
    tokens: &TokenCodec,
    fields: &AuthFields,
    now: i64,
) -> Result<Identity, AuthFailure> {
    // The API key already names a user, so `u` alongside it is a conflict
    // even without `p` or `t`.
    if fields.scheme_count() > 1 || (fields.has_api_key() && fields.username.is_some()) {
        debug!("Authentication rejected: conflicting mechanisms");
        return Err(AuthFailure::Conflict);
    }

    if let Some(api_key) = &fields.api_key {
        return verify_api_key(store, api_key).await;
    }

    if let Some(username) = fields.username.as_deref().filter(|_| fields.has_user_credentials()) {
        if let Some(password) = &fields.password {
            return verify_password(store, username, password).await;
        }
        if let Some(token) = &fields.token {
            let salt = fields.salt.as_deref().ok_or(AuthFailure::Missing("s"))?;
            return verify_digest(store, username, token, salt).await;
        }
    }

    // A bare `u` is not a scheme of its own; the bearer token decides.
    if let Some(bearer) = &fields.bearer {
        return verify_bearer(tokens, bearer, now);
    }

    if fields.username.is_some() {
        return Err(AuthFailure::Missing("p"));
    }

    Err(AuthFailure::Missing("u"))
}

async fn verify_api_key<S: CredentialStore + ?Sized>(
    store: &S,
    api_key: &str,
) -> Result<Identity, AuthFailure> {
    store
        .lookup_by_api_key(api_key)
        .await
        .map_err(store_failure)?
        .ok_or_else(|| reject(RejectReason::UnknownApiKey))
}

async fn verify_password<S: CredentialStore + ?Sized>(
    store: &S,
    username: &str,
    password: &str,
) -> Result<Identity, AuthFailure> {
    let record = store
        .lookup_by_username(username)
        .await
        .map_err(store_failure)?;
    let Some(record) = record else {
        verify_dummy_hash(password.as_bytes());
        return Err(reject(RejectReason::UnknownUser));
    };

    match password.strip_prefix(ENCODED_PASSWORD_PREFIX) {
        Some(hex) => {
            let secret =
                decode_hex(hex).map_err(|_| reject(RejectReason::MalformedEncodedPassword))?;

            let key_matches = record
                .api_key
                .as_deref()
                .is_some_and(|key| constant_time_eq(&secret, key.as_bytes()));
            if key_matches || verify_hash(&secret, &record.password_hash) {
                return Ok(Identity::from(&record));
            }
        }
        None => {
            if verify_hash(password.as_bytes(), &record.password_hash) {
                return Ok(Identity::from(&record));
            }
        }
    }

    Err(reject(RejectReason::WrongPassword))
}

async fn verify_digest<S: CredentialStore + ?Sized>(
    store: &S,
    username: &str,
    token: &str,
    salt: &str,
) -> Result<Identity, AuthFailure> {
    let record = store
        .lookup_by_username(username)
        .await
        .map_err(store_failure)?
        .ok_or_else(|| reject(RejectReason::UnknownUser))?;

    let legacy = record
        .legacy_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| reject(RejectReason::NoLegacyPassword))?;

    if verify_legacy_digest(legacy, salt, token) {
        Ok(Identity::from(&record))
    } else {
        Err(reject(RejectReason::WrongDigest))
    }
}

fn verify_bearer(tokens: &TokenCodec, bearer: &str, now: i64) -> Result<Identity, AuthFailure> {
    match tokens.parse(bearer, now) {
        Ok(claims) => Ok(Identity {
            id: claims.sub,
            username: claims.name,
            is_admin: claims.adm,
        }),
        Err(e) => {
            debug!("Bearer token rejected: {}", e);
            Err(reject(RejectReason::InvalidBearer))
        }
    }
}
