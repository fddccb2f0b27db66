use chrono::{DateTime, Utc};

use crate::error::TokenError;

/// A signing key held in a key registry
///
/// Keys are created by a registry when it loads and are never mutated
/// afterwards. A key without an expiry never expires by time.
#[derive(Clone, PartialEq, Eq)]
pub struct Key {
    id: String,
    expires: Option<DateTime<Utc>>,
    value: String,
    revoked: bool,
}

impl Key {
    pub fn new(
        id: impl Into<String>,
        expires: Option<DateTime<Utc>>,
        value: impl Into<String>,
        revoked: bool,
    ) -> Self {
        Self {
            id: id.into(),
            expires,
            value: value.into(),
            revoked,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    /// The secret string used as HMAC key material
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Whether the key has expired, evaluated against the current clock
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the key has expired at `now`. A key is expired from its expiry
    /// instant onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Some(expires) => now >= expires,
            None => false,
        }
    }
}

// The secret value stays out of debug output.
impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("expires", &self.expires)
            .field("revoked", &self.revoked)
            .finish_non_exhaustive()
    }
}

/// Looks up signing keys by identifier
///
/// Implementations may block (file or network lookups). The validator calls
/// `get_key_by_id` at most once per validation and never caches the result.
pub trait KeyResolver {
    /// Return the key with the given id, or `TokenError::KeyNotFound`
    fn get_key_by_id(&self, id: &str) -> Result<Key, TokenError>;
}

impl<R: KeyResolver + ?Sized> KeyResolver for &R {
    fn get_key_by_id(&self, id: &str) -> Result<Key, TokenError> {
        (**self).get_key_by_id(id)
    }
}

impl<R: KeyResolver + ?Sized> KeyResolver for std::sync::Arc<R> {
    fn get_key_by_id(&self, id: &str) -> Result<Key, TokenError> {
        (**self).get_key_by_id(id)
    }
}
