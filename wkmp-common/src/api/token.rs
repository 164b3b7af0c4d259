//! Signed bearer tokens
//!
//! Compact three-segment tokens (`header.claims.signature`), every segment
//! base64url without padding, signed with HMAC-SHA256 over
//! `header_b64.claims_b64`. The claims carry the caller's identity so a valid
//! token authenticates without a database lookup.
//!
//! The signing secret is owned by the caller (wkmp-sc keeps it in the
//! `settings` table); this module only issues and parses.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::api::credentials::constant_time_eq;

type HmacSha256 = Hmac<Sha256>;

/// Only signing algorithm this codec produces or accepts
pub const TOKEN_ALG: &str = "HS256";

/// Token rejection reasons
///
/// Callers authenticating a request should collapse all of these into one
/// generic failure; the variants exist for logging.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("token expired")]
    Expired,
    #[error("signing key rejected")]
    Key,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Identity claims embedded in a bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// User id
    pub sub: i64,
    /// Username
    pub name: String,
    /// Administrator flag
    pub adm: bool,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and parses HMAC-signed bearer tokens
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    issuer: String,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Build the claims for a user, valid from `now` for `ttl_seconds`
    pub fn claims_for(
        &self,
        user_id: i64,
        username: &str,
        is_admin: bool,
        now_unix_seconds: i64,
        ttl_seconds: i64,
    ) -> TokenClaims {
        TokenClaims {
            sub: user_id,
            name: username.to_string(),
            adm: is_admin,
            iss: self.issuer.clone(),
            iat: now_unix_seconds,
            exp: now_unix_seconds + ttl_seconds,
        }
    }

    /// Sign claims into a compact token
    pub fn issue(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let header = TokenHeader {
            alg: TOKEN_ALG.to_string(),
            typ: "JWT".to_string(),
        };
        let header_b64 = b64e_json(&header)?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let signature = self.sign(signing_input.as_bytes())?;
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token and return its claims
    ///
    /// Checks, in order: shape, header algorithm, signature, issuer, expiry.
    pub fn parse(&self, token: &str, now_unix_seconds: i64) -> Result<TokenClaims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Format)?;
        let claims_b64 = parts.next().ok_or(TokenError::Format)?;
        let sig_b64 = parts.next().ok_or(TokenError::Format)?;
        if parts.next().is_some() {
            return Err(TokenError::Format);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != TOKEN_ALG {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signing_input = format!("{header_b64}.{claims_b64}");
        let expected = self.sign(signing_input.as_bytes())?;
        let provided = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        if !constant_time_eq(&provided, &expected) {
            return Err(TokenError::InvalidSignature);
        }

        let claims: TokenClaims = b64d_json(claims_b64)?;
        if claims.iss != self.issuer {
            return Err(TokenError::InvalidIssuer);
        }
        if claims.exp <= now_unix_seconds {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Key)?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"0123456789abcdef0123456789abcdef".to_vec(), "wkmp-sc")
    }

    #[test]
    fn test_issue_and_parse() {
        let codec = codec();
        let claims = codec.claims_for(7, "alice", true, NOW, 120);
        let token = codec.issue(&claims).unwrap();

        assert_eq!(token.split('.').count(), 3);

        let parsed = codec.parse(&token, NOW + 60).unwrap();
        assert_eq!(parsed, claims);
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let token = codec.issue(&codec.claims_for(7, "alice", false, NOW, 120)).unwrap();

        assert!(matches!(codec.parse(&token, NOW + 120), Err(TokenError::Expired)));
        assert!(matches!(codec.parse(&token, NOW + 500), Err(TokenError::Expired)));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let token = codec()
            .issue(&codec().claims_for(7, "alice", false, NOW, 120))
            .unwrap();
        let other = TokenCodec::new(b"another secret".to_vec(), "wkmp-sc");

        assert!(matches!(other.parse(&token, NOW), Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let secret = b"shared".to_vec();
        let issuing = TokenCodec::new(secret.clone(), "somebody-else");
        let token = issuing
            .issue(&issuing.claims_for(7, "alice", false, NOW, 120))
            .unwrap();

        let codec = TokenCodec::new(secret, "wkmp-sc");
        assert!(matches!(codec.parse(&token, NOW), Err(TokenError::InvalidIssuer)));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let codec = codec();
        let token = codec.issue(&codec.claims_for(7, "alice", false, NOW, 120)).unwrap();

        let forged_claims = codec.claims_for(7, "alice", true, NOW, 120);
        let forged_b64 = b64e_json(&forged_claims).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_b64;
        let forged = parts.join(".");

        assert!(matches!(codec.parse(&forged, NOW), Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let codec = codec();
        assert!(matches!(codec.parse("", NOW), Err(TokenError::Format)));
        assert!(matches!(codec.parse("a.b", NOW), Err(TokenError::Format)));
        assert!(matches!(codec.parse("a.b.c.d", NOW), Err(TokenError::Format)));
        assert!(matches!(codec.parse("!!.b.c", NOW), Err(TokenError::Base64)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", codec());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
