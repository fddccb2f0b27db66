//! # JToken
//!
//! Issue and verify compact HMAC-signed bearer tokens.
//!
//! A token is `header.payload.signature`, each segment base64url encoded.
//! The header names the algorithm, the payload holds the caller's claims plus
//! an `exp` timestamp, and the signature is an HMAC over the first two
//! segments. Tokens are signed either with a shared secret or with a key from
//! a revocable key registry.
//!
//! ## Features
//!
//! - **Token issuance**: HS256, HS384 and HS512 with named lifetimes,
//!   relative periods (`"+2 hours"`) or absolute timestamps
//! - **Token validation**: constant-time signature comparison, claim expiry,
//!   key expiry and revocation
//! - **Key registries**: JSON key files resolved by the `key_id` claim
//! - **Flexible configuration**: Load configuration from environment
//!   variables, JSON or TOML files
//!
//! ## Basic Usage
//!
//! ```rust
//! use jtoken::{validate_token, AlgorithmType, ExpireMode, TokenBuilder};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), jtoken::TokenError> {
//! let claims = json!({"sub": "42"}).as_object().cloned().unwrap_or_default();
//!
//! let token = TokenBuilder::new()
//!     .secret("k")
//!     .algorithm(AlgorithmType::HS256)
//!     .expire_mode(ExpireMode::Strict)
//!     .payload(claims)
//!     .make_token()?;
//!
//! assert!(validate_token(&token, Some("k"), None, None)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Registries
//!
//! When a token is signed with a registry [`Key`], the key's id is written
//! into the payload as `key_id`. Validation then needs a [`KeyResolver`];
//! revoking the key in the registry invalidates every token it signed.
//!
//! ```rust
//! use jtoken::{JsonKeyStore, KeyResolver, TokenBuilder, TokenValidator};
//!
//! # fn main() -> Result<(), jtoken::TokenError> {
//! let store = JsonKeyStore::from_json_str(
//!     r#"[{"id": "k1", "key": "s1", "revoked": false, "expires": null}]"#,
//! )?;
//!
//! let token = TokenBuilder::new()
//!     .secret(store.get_key_by_id("k1")?)
//!     .make_token()?;
//!
//! assert!(TokenValidator::new().with_resolver(&store).validate(&token)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ### Using environment variables
//!
//! When using `from_env()`, the following variables are read:
//!
//! ```text
//! ${PREFIX}_SECRET          - Shared secret
//! ${PREFIX}_SECRET_FILE     - Path to a file holding the shared secret
//! ${PREFIX}_ALGORITHM       - HS256, HS384 or HS512 (default HS256)
//! ${PREFIX}_EXPIRE_MODE     - low, middle or strict (default low)
//! ${PREFIX}_EXPIRES_PERIOD  - Relative lifetime such as "+2 hours"
//! ${PREFIX}_URL_SAFE        - true or false (default true)
//! ${PREFIX}_KEYS_FILE       - Path to a JSON key registry
//! ${PREFIX}_KEY_ID          - Registry key used to sign issued tokens
//! ```
//!
//! ### Using configuration files
//!
//! JSON (`from_file`) and TOML (`from_toml`) files use the field names of
//! [`JTokenConfig`]:
//!
//! ```toml
//! secret = "k"
//! algorithm = "HS512"
//! expire_mode = "middle"
//! ```
//!
//! ### Using the global configuration
//!
//! ```no_run
//! use jtoken::{get_default_config, set_default_config, try_load_default_config};
//!
//! if let Some(config) = try_load_default_config() {
//!     set_default_config(config).expect("Failed to set default configuration");
//! }
//!
//! if let Some(config) = get_default_config() {
//!     let valid = config.validate_token("header.payload.signature");
//!     println!("{:?}", valid);
//! }
//! ```

mod config;
pub use config::*;

pub use jtoken_core::{
    codec, decode_header, decode_payload, generate_hash, generate_hash_default,
    get_token_payload, parse_expires, resolve_expiry, split_token, validate_token, AlgorithmType,
    Claims, ExpireMode, ExpiryPolicy, Header, JsonKeyStore, Key, KeyResolver, RelativePeriod,
    SigningSecret, SupportedType, TokenBuilder, TokenError, TokenParts, TokenValidator,
    DEFAULT_HASH_BYTES, EXP_CLAIM, KEY_ID_CLAIM,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_bridges_round_trip() {
        let config = JTokenConfig::builder()
            .secret("k")
            .algorithm(AlgorithmType::HS384)
            .expires_period("+1 hour")
            .build()
            .unwrap();

        let token = config.token_builder().unwrap().make_token().unwrap();
        assert!(config.validate_token(&token).unwrap());

        let other = config.to_builder().secret("other").build().unwrap();
        assert!(!other.validate_token(&token).unwrap());
    }
}
