//! Axum middleware for the `/rest` routes
//!
//! [`collect_params`] runs on every protocol route and attaches the merged
//! [`RequestParams`]; [`require_auth`] runs on the protected routes only and
//! attaches the caller's [`Identity`]. Handlers read both from the request
//! extensions.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::{negotiate, AuthFields};
use crate::db::Identity;
use crate::error::ApiError;
use crate::subsonic::{Envelope, Format, Reply, RequestParams};
use crate::AppState;

/// Largest urlencoded POST body accepted (formPost extension)
pub const MAX_FORM_BODY_BYTES: usize = 64 * 1024;

/// Merge query string and urlencoded form body into [`RequestParams`]
pub async fn collect_params(request: Request, next: Next) -> Response {
    let mut params = RequestParams::from_query(request.uri().query());

    let mut request = if is_form_post(&request) {
        let (parts, body) = request.into_parts();
        let bytes = match to_bytes(body, MAX_FORM_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read form body: {}", e);
                let err = ApiError::InvalidParameter("request body".to_string());
                return error_reply(&err, params.format());
            }
        };
        params.extend_urlencoded(&bytes);
        Request::from_parts(parts, Body::from(bytes))
    } else {
        request
    };

    request.extensions_mut().insert(params);
    next.run(request).await
}

fn is_form_post(request: &Request) -> bool {
    request.method() == Method::POST
        && request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| {
                ct.trim_start()
                    .to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
            })
}

/// Authenticate the request or answer with an error envelope
///
/// The handler never runs for an unauthenticated request.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let params = request
        .extensions()
        .get::<RequestParams>()
        .cloned()
        .unwrap_or_else(|| RequestParams::from_query(request.uri().query()));

    let fields = AuthFields::from_request(&params, request.headers());
    let now = chrono::Utc::now().timestamp();

    match negotiate(state.credentials.as_ref(), &state.tokens, &fields, now).await {
        Ok(identity) => {
            debug!("Authenticated {} for {}", identity.username, request.uri().path());
            request.extensions_mut().insert::<Identity>(identity);
            request.extensions_mut().insert(params);
            next.run(request).await
        }
        Err(failure) => {
            let err = ApiError::from(failure);
            error_reply(&err, params.format())
        }
    }
}

fn error_reply(err: &ApiError, format: Format) -> Response {
    Reply::new(Envelope::from_error(err), format).into_response()
}
