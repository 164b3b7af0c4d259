//! API module for shared HTTP API functionality
//!
//! Provides the credential primitives and bearer token codec used by the
//! Subsonic compatibility module (wkmp-sc).
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Shared types
//!
//! The service wraps these with framework-specific middleware (Axum).

pub mod credentials;
pub mod token;

pub use credentials::{
    constant_time_eq, decode_hex, generate_api_key, hash_password, legacy_digest,
    verify_dummy_hash, verify_hash, verify_legacy_digest, ENCODED_PASSWORD_PREFIX,
};
pub use token::{TokenClaims, TokenCodec, TokenError};
