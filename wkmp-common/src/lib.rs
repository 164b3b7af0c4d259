//! # WKMP Common Library
//!
//! Shared code for WKMP microservices including:
//! - Database schema initialization and settings access
//! - Credential verification primitives and bearer token codec
//! - Configuration loading
//! - Common error type

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
