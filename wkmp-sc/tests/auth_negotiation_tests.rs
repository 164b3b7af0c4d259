//! Authentication negotiation tests
//!
//! Run against an in-memory credential store that counts lookups, so tests can
//! check that conflicts are rejected before the store is touched.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use wkmp_common::api::{hash_password, legacy_digest, TokenCodec};
use wkmp_sc::auth::{negotiate, AuthFailure, AuthFields, RejectReason};
use wkmp_sc::db::{CredentialRecord, CredentialStore, Identity};
use wkmp_sc::error::ApiError;
use wkmp_sc::subsonic::{Envelope, Format, RequestParams};

const NOW: i64 = 1_700_000_000;

#[derive(Default)]
struct CountingStore {
    users: Mutex<HashMap<String, CredentialRecord>>,
    lookups: AtomicUsize,
    fail: bool,
}

impl CountingStore {
    fn with_user(self, record: CredentialRecord) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(record.username.clone(), record);
        self
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn lookup_by_username(&self, username: &str) -> wkmp_common::Result<Option<CredentialRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(wkmp_common::Error::Internal("store offline".into()));
        }
        Ok(self.users.lock().unwrap().get(username).cloned())
    }

    async fn lookup_by_api_key(&self, api_key: &str) -> wkmp_common::Result<Option<Identity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(wkmp_common::Error::Internal("store offline".into()));
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|r| r.api_key.as_deref() == Some(api_key))
            .map(Identity::from))
    }

    async fn set_api_key(&self, user_id: i64, api_key: Option<&str>) -> wkmp_common::Result<()> {
        let mut users = self.users.lock().unwrap();
        let record = users
            .values_mut()
            .find(|r| r.id == user_id)
            .ok_or_else(|| wkmp_common::Error::NotFound(format!("User id {}", user_id)))?;
        record.api_key = api_key.map(str::to_string);
        Ok(())
    }
}

fn alice() -> CredentialRecord {
    CredentialRecord {
        id: 1,
        username: "alice".into(),
        password_hash: hash_password("secret").unwrap(),
        legacy_password: None,
        is_admin: false,
        api_key: Some("K1".into()),
        email: None,
    }
}

fn carol_with_legacy_password() -> CredentialRecord {
    CredentialRecord {
        id: 3,
        username: "carol".into(),
        password_hash: hash_password("sesame").unwrap(),
        legacy_password: Some("sesame".into()),
        is_admin: true,
        api_key: None,
        email: None,
    }
}

fn store() -> CountingStore {
    CountingStore::default()
        .with_user(alice())
        .with_user(carol_with_legacy_password())
}

fn codec() -> TokenCodec {
    TokenCodec::new(b"test-secret".to_vec(), "wkmp-sc")
}

fn fields(query: &str) -> AuthFields {
    AuthFields::from_request(&RequestParams::from_query(Some(query)), &HeaderMap::new())
}

fn fields_with_bearer(query: &str, token: &str) -> AuthFields {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    AuthFields::from_request(&RequestParams::from_query(Some(query)), &headers)
}

async fn run(store: &CountingStore, fields: &AuthFields) -> Result<Identity, AuthFailure> {
    negotiate(store, &codec(), fields, NOW).await
}

/// Rendered error body as the client would see it
fn client_view(failure: AuthFailure) -> String {
    let err = ApiError::from(failure);
    let body = Envelope::from_error(&err).render(&Format::Json).unwrap();
    String::from_utf8(body).unwrap()
}

// ========================================
// Successful schemes
// ========================================

#[tokio::test]
async fn test_plaintext_password() {
    let store = store();
    let identity = run(&store, &fields("u=alice&p=secret")).await.unwrap();
    assert_eq!(identity.username, "alice");
    assert_eq!(identity.id, 1);
    assert!(!identity.is_admin);
}

#[tokio::test]
async fn test_hex_encoded_password() {
    // "secret"
    let store = store();
    let identity = run(&store, &fields("u=alice&p=enc:736563726574")).await.unwrap();
    assert_eq!(identity.username, "alice");
}

#[tokio::test]
async fn test_hex_encoded_api_key_as_password() {
    // "K1" is not the password, but it is alice's API key
    let store = store();
    let identity = run(&store, &fields("u=alice&p=enc:4b31")).await.unwrap();
    assert_eq!(identity.username, "alice");
}

#[tokio::test]
async fn test_plaintext_api_key_is_not_a_password() {
    let store = store();
    let result = run(&store, &fields("u=alice&p=K1")).await;
    assert!(matches!(result, Err(AuthFailure::Rejected(_))));
}

#[tokio::test]
async fn test_api_key() {
    let store = store();
    let identity = run(&store, &fields("apiKey=K1")).await.unwrap();
    assert_eq!(identity.username, "alice");
    assert_eq!(store.lookups(), 1);
}

#[tokio::test]
async fn test_legacy_digest() {
    let store = store();
    let token = legacy_digest("sesame", "c19b2d");
    let query = format!("u=carol&t={}&s=c19b2d", token);
    let identity = run(&store, &fields(&query)).await.unwrap();
    assert_eq!(identity.username, "carol");
    assert!(identity.is_admin);
}

#[tokio::test]
async fn test_legacy_digest_accepts_uppercase_token() {
    let store = store();
    let token = legacy_digest("sesame", "abc").to_uppercase();
    let query = format!("u=carol&t={}&s=abc", token);
    assert!(run(&store, &fields(&query)).await.is_ok());
}

#[tokio::test]
async fn test_bearer_token_needs_no_lookup() {
    let store = store();
    let codec = codec();
    let token = codec.issue(&codec.claims_for(3, "carol", true, NOW, 60)).unwrap();

    let identity = run(&store, &fields_with_bearer("", &token)).await.unwrap();
    assert_eq!(
        identity,
        Identity {
            id: 3,
            username: "carol".into(),
            is_admin: true
        }
    );
    assert_eq!(store.lookups(), 0);
}

#[tokio::test]
async fn test_bearer_token_with_bare_username() {
    // `u` without `p` or `t` is not a scheme, so the token alone authenticates
    let store = store();
    let codec = codec();
    let token = codec.issue(&codec.claims_for(1, "alice", false, NOW, 60)).unwrap();

    let fields = fields_with_bearer("u=alice", &token);
    assert_eq!(fields.scheme_count(), 1);

    let identity = run(&store, &fields).await.unwrap();
    assert_eq!(identity.username, "alice");
    assert_eq!(store.lookups(), 0);
}

#[tokio::test]
async fn test_invalid_bearer_with_bare_username_is_rejected() {
    let store = store();
    let result = run(&store, &fields_with_bearer("u=alice", "not-a-token")).await;
    assert!(matches!(
        result,
        Err(AuthFailure::Rejected(RejectReason::InvalidBearer))
    ));
}

// ========================================
// Conflicts
// ========================================

#[tokio::test]
async fn test_api_key_with_username_conflicts_before_lookup() {
    let store = store();
    let result = run(&store, &fields("apiKey=K1&u=alice")).await;
    assert!(matches!(result, Err(AuthFailure::Conflict)));
    assert_eq!(store.lookups(), 0);
}

#[tokio::test]
async fn test_multiple_schemes_conflict_even_when_each_is_valid() {
    let store = store();
    let codec = codec();
    let token = codec.issue(&codec.claims_for(1, "alice", false, NOW, 60)).unwrap();

    let cases = vec![
        fields("apiKey=K1&u=alice&p=secret"),
        fields_with_bearer("u=alice&p=secret", &token),
        fields_with_bearer("apiKey=K1", &token),
        fields_with_bearer("u=alice&t=x&s=y", &token),
    ];

    for case in cases {
        let result = run(&store, &case).await;
        assert!(matches!(result, Err(AuthFailure::Conflict)), "{:?}", case);
    }
    assert_eq!(store.lookups(), 0);
}

#[tokio::test]
async fn test_conflict_message_is_generic() {
    let store = store();
    let failure = run(&store, &fields("apiKey=K1&u=alice&p=secret")).await.unwrap_err();
    let body = client_view(failure);
    assert!(body.contains(r#""code":43"#));
    assert!(body.contains("Multiple conflicting authentication mechanisms provided."));
    assert!(!body.contains("apiKey"));
}

// ========================================
// Uniform failures
// ========================================

#[tokio::test]
async fn test_wrong_hex_password_fails() {
    // "wrong"
    let store = store();
    let result = run(&store, &fields("u=alice&p=enc:77726f6e67")).await;
    assert!(matches!(
        result,
        Err(AuthFailure::Rejected(RejectReason::WrongPassword))
    ));
}

#[tokio::test]
async fn test_malformed_hex_is_a_verification_miss() {
    let store = store();
    let result = run(&store, &fields("u=alice&p=enc:zz")).await;
    assert!(matches!(result, Err(AuthFailure::Rejected(_))));
}

#[tokio::test]
async fn test_digest_without_legacy_password_fails() {
    // alice has no stored plaintext, so even a digest of her real password fails
    let store = store();
    let token = legacy_digest("secret", "s4lt");
    let query = format!("u=alice&t={}&s=s4lt", token);
    let result = run(&store, &fields(&query)).await;
    assert!(matches!(
        result,
        Err(AuthFailure::Rejected(RejectReason::NoLegacyPassword))
    ));
}

#[tokio::test]
async fn test_every_verification_miss_looks_the_same() {
    let store = store();
    let codec = codec();
    let expired = codec.issue(&codec.claims_for(1, "alice", false, NOW - 120, 60)).unwrap();
    let forged = TokenCodec::new(b"other".to_vec(), "wkmp-sc")
        .issue(&codec.claims_for(1, "alice", true, NOW, 60))
        .unwrap();

    let cases = vec![
        fields("u=mallory&p=secret"),
        fields("u=alice&p=wrong"),
        fields("u=alice&p=enc:77726f6e67"),
        fields(&format!("u=carol&t={}&s=abc", legacy_digest("wrong", "abc"))),
        fields(&format!("u=nobody&t={}&s=abc", legacy_digest("sesame", "abc"))),
        fields("apiKey=unknown"),
        fields_with_bearer("", &expired),
        fields_with_bearer("", &forged),
        fields_with_bearer("", "not-a-token"),
    ];

    let expected = client_view(AuthFailure::Rejected(RejectReason::UnknownUser));
    assert!(expected.contains(r#""code":40"#));
    assert!(expected.contains("Wrong username or password."));

    for case in cases {
        let failure = run(&store, &case).await.unwrap_err();
        assert!(matches!(failure, AuthFailure::Rejected(_)), "{:?}", case);
        assert_eq!(client_view(failure), expected, "{:?}", case);
    }
}

#[tokio::test]
async fn test_unknown_user_still_rejected_after_dummy_hash() {
    let store = store();
    for query in ["u=mallory&p=secret", "u=mallory&p=enc:736563726574"] {
        let result = run(&store, &fields(query)).await;
        assert!(matches!(
            result,
            Err(AuthFailure::Rejected(RejectReason::UnknownUser))
        ));
    }
}

#[tokio::test]
async fn test_store_failure_is_generic_error() {
    let store = CountingStore::failing();
    for query in ["u=alice&p=secret", "apiKey=K1", "u=alice&t=x&s=y"] {
        let failure = run(&store, &fields(query)).await.unwrap_err();
        assert!(matches!(failure, AuthFailure::Store(_)));

        let body = client_view(failure);
        assert!(body.contains(r#""code":0"#));
        assert!(!body.contains("offline"));
    }
}

// ========================================
// Missing parameters
// ========================================

#[tokio::test]
async fn test_missing_credentials() {
    let store = store();
    assert!(matches!(run(&store, &fields("")).await, Err(AuthFailure::Missing("u"))));
    assert!(matches!(
        run(&store, &fields("u=alice")).await,
        Err(AuthFailure::Missing("p"))
    ));
    assert!(matches!(
        run(&store, &fields("u=carol&t=abc")).await,
        Err(AuthFailure::Missing("s"))
    ));
    assert!(matches!(
        run(&store, &fields("p=secret")).await,
        Err(AuthFailure::Missing("u"))
    ));
    assert_eq!(store.lookups(), 0);
}
