//! # JToken Core
//!
//! Core build and verification library for JToken bearer tokens.
//!
//! A token is three base64url segments joined by dots: a JSON header naming
//! the algorithm, a JSON payload of claims, and an HMAC over the first two.
//! Tokens can be signed with a raw shared secret or with a key from a
//! revocable key registry, in which case the key's id travels in the payload.
//! The crate has no networking dependencies.
//!
//! ## Features
//!
//! - Token issuance: HS256, HS384 and HS512 with configurable expiry
//! - Token validation: constant-time signature checks, claim and key expiry
//! - Key registries: JSON key files with per-key expiry and revocation
//!
//! ## Usage
//!
//! ```
//! use jtoken_core::{validate_token, AlgorithmType, ExpireMode, TokenBuilder};
//! use serde_json::json;
//!
//! fn main() -> Result<(), jtoken_core::TokenError> {
//!     let claims = json!({"sub": "42"}).as_object().cloned().unwrap_or_default();
//!
//!     // Issue a token that lives for one day
//!     let token = TokenBuilder::new()
//!         .secret("k")
//!         .algorithm(AlgorithmType::HS256)
//!         .expire_mode(ExpireMode::Strict)
//!         .payload(claims)
//!         .make_token()?;
//!
//!     // Verify it
//!     assert!(validate_token(&token, Some("k"), None, None)?);
//!     Ok(())
//! }
//! ```

mod algorithm;
pub mod codec;
mod error;
mod expiry;
mod hash;
mod key;
mod keystore;
mod mint;
mod token;
mod verify;

pub use algorithm::{AlgorithmType, ExpireMode, SupportedType};
pub use error::TokenError;
pub use expiry::{resolve_expiry, ExpiryPolicy, RelativePeriod};
pub use hash::{generate_hash, generate_hash_default, DEFAULT_HASH_BYTES};
pub use key::{Key, KeyResolver};
pub use keystore::{parse_expires, JsonKeyStore};
pub use mint::{Claims, Header, SigningSecret, TokenBuilder, EXP_CLAIM, KEY_ID_CLAIM};
pub use token::{decode_header, decode_payload, get_token_payload, split_token, TokenParts};
pub use verify::{validate_token, TokenValidator};
