//! Authentication primitives.
//!
//! - [`jwt`] -- JWT access-token generation and validation.
//! - [`signature`] -- HMAC-SHA256 webhook payload signature verification.

pub mod jwt;
pub mod signature;
