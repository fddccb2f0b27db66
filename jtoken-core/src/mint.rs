use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::algorithm::{AlgorithmType, ExpireMode, SupportedType};
use crate::codec;
use crate::error::TokenError;
use crate::expiry::{ExpiryPolicy, RelativePeriod};
use crate::key::Key;

/// Claim holding the expiry timestamp
pub const EXP_CLAIM: &str = "exp";
/// Claim holding the id of the registry key that signed the token
pub const KEY_ID_CLAIM: &str = "key_id";

/// Caller supplied claims of a token
pub type Claims = Map<String, Value>;

/// The JSON header of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: AlgorithmType,
    pub typ: SupportedType,
}

/// Secret material a token is signed with
#[derive(Clone, PartialEq, Eq)]
pub enum SigningSecret {
    /// A raw shared secret
    Raw(String),
    /// A registry key; its id is embedded in the payload as `key_id`
    Key(Key),
}

impl SigningSecret {
    fn bytes(&self) -> &[u8] {
        match self {
            SigningSecret::Raw(secret) => secret.as_bytes(),
            SigningSecret::Key(key) => key.value().as_bytes(),
        }
    }

    fn key_id(&self) -> Option<&str> {
        match self {
            SigningSecret::Raw(_) => None,
            SigningSecret::Key(key) => Some(key.id()),
        }
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningSecret::Raw(_) => f.write_str("Raw(..)"),
            SigningSecret::Key(key) => f.debug_tuple("Key").field(key).finish(),
        }
    }
}

impl From<&str> for SigningSecret {
    fn from(secret: &str) -> Self {
        SigningSecret::Raw(secret.to_string())
    }
}

impl From<String> for SigningSecret {
    fn from(secret: String) -> Self {
        SigningSecret::Raw(secret)
    }
}

impl From<&String> for SigningSecret {
    fn from(secret: &String) -> Self {
        SigningSecret::Raw(secret.clone())
    }
}

impl From<Key> for SigningSecret {
    fn from(key: Key) -> Self {
        SigningSecret::Key(key)
    }
}

impl From<&Key> for SigningSecret {
    fn from(key: &Key) -> Self {
        SigningSecret::Key(key.clone())
    }
}

/// Builds signed tokens
///
/// Every setter consumes and returns the builder so configuration can be
/// chained. `make_token` borrows the builder, so the same configuration can
/// issue several tokens.
///
/// # Example
///
/// ```
/// use jtoken_core::{AlgorithmType, ExpireMode, TokenBuilder};
/// use serde_json::json;
///
/// # fn main() -> Result<(), jtoken_core::TokenError> {
/// let claims = json!({"sub": "42"}).as_object().cloned().unwrap_or_default();
/// let token = TokenBuilder::new()
///     .secret("k")
///     .algorithm(AlgorithmType::HS256)
///     .expire_mode(ExpireMode::Strict)
///     .payload(claims)
///     .make_token()?;
///
/// assert_eq!(token.split('.').count(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    secret: Option<SigningSecret>,
    algorithm: AlgorithmType,
    token_type: SupportedType,
    payload: Claims,
    expiry: ExpiryPolicy,
    url_safe: bool,
}

impl Default for TokenBuilder {
    fn default() -> Self {
        Self {
            secret: None,
            algorithm: AlgorithmType::default(),
            token_type: SupportedType::default(),
            payload: Claims::new(),
            expiry: ExpiryPolicy::default(),
            url_safe: true,
        }
    }
}

impl TokenBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signing secret: a raw secret string or a registry [`Key`]
    pub fn secret(mut self, secret: impl Into<SigningSecret>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Replace the claims wholesale. Earlier claims are discarded, not merged.
    pub fn payload(mut self, claims: Claims) -> Self {
        self.payload = claims;
        self
    }

    pub fn algorithm(mut self, algorithm: AlgorithmType) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn token_type(mut self, token_type: SupportedType) -> Self {
        self.token_type = token_type;
        self
    }

    /// Set the named lifetime. Passing `None` clears the mode, which makes
    /// tokens without an explicit expiry live for ten years.
    pub fn expire_mode(mut self, mode: impl Into<Option<ExpireMode>>) -> Self {
        self.expiry.mode = mode.into();
        self
    }

    /// Expire tokens a relative period after issuance, e.g. `"+2 hours"`.
    ///
    /// The expression is checked here and rejected with
    /// `TokenError::InvalidPeriod` if it cannot be parsed.
    pub fn expires_period(mut self, period: &str) -> Result<Self, TokenError> {
        self.expiry.period = Some(RelativePeriod::parse(period)?);
        Ok(self)
    }

    /// Expire tokens at an absolute unix timestamp. Takes precedence over any
    /// period or mode.
    pub fn expires_ts(mut self, timestamp: i64) -> Self {
        self.expiry.expires_ts = Some(timestamp);
        self
    }

    /// Emit URL-safe unpadded segments (default) or standard padded base64
    pub fn url_safe(mut self, url_safe: bool) -> Self {
        self.url_safe = url_safe;
        self
    }

    pub fn get_algorithm(&self) -> AlgorithmType {
        self.algorithm
    }

    pub fn expiry(&self) -> &ExpiryPolicy {
        &self.expiry
    }

    /// Build and sign a token using the current time
    pub fn make_token(&self) -> Result<String, TokenError> {
        self.make_token_at(Utc::now())
    }

    /// Build and sign a token as if issued at `now`
    pub fn make_token_at(&self, now: DateTime<Utc>) -> Result<String, TokenError> {
        let secret = self.secret.as_ref().ok_or(TokenError::MissingSecret)?;
        match secret {
            SigningSecret::Raw(raw) if raw.is_empty() => return Err(TokenError::MissingSecret),
            SigningSecret::Key(key) if key.value().is_empty() => {
                return Err(TokenError::invalid_secret(format!(
                    "Key '{}' has an empty value",
                    key.id()
                )))
            }
            SigningSecret::Key(key) if key.is_revoked() || key.is_expired_at(now) => {
                warn!(key_id = key.id(), "issuing token with a revoked or expired key");
            }
            _ => {}
        }

        let header = self.make_header()?;
        let exp = self.expiry.resolve(now)?;
        let payload = self.make_payload(exp, secret.key_id())?;

        let signing_input = format!("{header}.{payload}");
        let digest = self.algorithm.sign(secret.bytes(), signing_input.as_bytes())?;
        let signature = self.encode(&digest);

        debug!(
            algorithm = %self.algorithm,
            key_id = secret.key_id(),
            exp,
            "token issued"
        );

        Ok(format!("{signing_input}.{signature}"))
    }

    fn make_header(&self) -> Result<String, TokenError> {
        let header = Header {
            alg: self.algorithm,
            typ: self.token_type,
        };
        Ok(self.encode(&serde_json::to_vec(&header)?))
    }

    fn make_payload(&self, exp: i64, key_id: Option<&str>) -> Result<String, TokenError> {
        let mut claims = self.payload.clone();
        claims.insert(EXP_CLAIM.to_string(), Value::from(exp));
        if let Some(key_id) = key_id {
            claims.insert(KEY_ID_CLAIM.to_string(), Value::from(key_id));
        }
        Ok(self.encode(&serde_json::to_vec(&Value::Object(claims))?))
    }

    fn encode(&self, bytes: &[u8]) -> String {
        if self.url_safe {
            codec::encode(bytes)
        } else {
            codec::encode_standard(bytes)
        }
    }
}
