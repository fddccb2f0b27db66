use thiserror::Error;

/// Errors raised while building, parsing or resolving tokens.
///
/// A token that is well-formed but fails verification (bad signature, expired
/// claim, revoked or expired key, unknown key id) is never reported through
/// this type. Those outcomes are returned as `Ok(false)` by the validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token or one of its segments is malformed.
    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    /// `make_token` was called before a secret or key reference was set.
    #[error("The secret key is empty, can not make a token")]
    MissingSecret,

    /// The secret material cannot be used for signing.
    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    /// An algorithm, token type or expire mode name is not recognised.
    #[error("Unsupported {0}")]
    Unsupported(String),

    /// A relative expiry expression could not be understood.
    #[error("Invalid expiry period '{0}'")]
    InvalidPeriod(String),

    /// The payload names a key id but no resolver was supplied.
    #[error("Token carries key id '{0}' but no key resolver was supplied")]
    MissingResolver(String),

    /// A resolver was supplied but the payload carries no key id.
    #[error("A key resolver was supplied but the token carries no key id")]
    MissingKeyId,

    /// The resolver has no key with the requested id.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The key registry could not be read or parsed.
    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl TokenError {
    pub fn format(msg: impl Into<String>) -> Self {
        TokenError::InvalidFormat(msg.into())
    }

    pub fn invalid_secret(msg: impl Into<String>) -> Self {
        TokenError::InvalidSecret(msg.into())
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        TokenError::Unsupported(what.into())
    }

    pub fn invalid_period(period: impl Into<String>) -> Self {
        TokenError::InvalidPeriod(period.into())
    }

    pub fn key_not_found(id: impl Into<String>) -> Self {
        TokenError::KeyNotFound(id.into())
    }

    pub fn key_store(msg: impl Into<String>) -> Self {
        TokenError::KeyStore(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        TokenError::Crypto(msg.into())
    }

    /// Returns true for the errors a caller causes by wiring the validator
    /// inconsistently with the token (key id without resolver or vice versa).
    pub fn is_resolution_mismatch(&self) -> bool {
        matches!(
            self,
            TokenError::MissingResolver(_) | TokenError::MissingKeyId
        )
    }

    /// Returns true for build-time misuse of the token builder.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TokenError::MissingSecret
                | TokenError::InvalidSecret(_)
                | TokenError::InvalidPeriod(_)
                | TokenError::Unsupported(_)
        )
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        TokenError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for TokenError {
    fn from(err: base64::DecodeError) -> Self {
        TokenError::InvalidFormat(format!("Failed to decode base64 segment: {err}"))
    }
}
