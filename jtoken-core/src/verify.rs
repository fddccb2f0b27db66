use chrono::{DateTime, Utc};
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::algorithm::AlgorithmType;
use crate::codec;
use crate::error::TokenError;
use crate::key::{Key, KeyResolver};
use crate::mint::{Claims, EXP_CLAIM, KEY_ID_CLAIM};
use crate::token::{decode_payload, split_token, TokenParts};

/// The claims the validator itself interprets
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReservedClaims {
    exp: Option<i64>,
    key_id: Option<String>,
}

impl ReservedClaims {
    fn from_claims(claims: &Claims) -> Result<Self, TokenError> {
        let exp = match claims.get(EXP_CLAIM) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(match (n.as_i64(), n.as_u64()) {
                (Some(exp), _) => exp,
                (None, Some(_)) => i64::MAX,
                // fractional seconds round up
                (None, None) => n.as_f64().map_or(i64::MIN, |f| f.ceil() as i64),
            }),
            Some(_) => return Err(TokenError::format("Claim 'exp' must be a number")),
        };

        let key_id = match claims.get(KEY_ID_CLAIM) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => return Err(TokenError::format("Claim 'key_id' must be a string")),
        };

        Ok(Self { exp, key_id })
    }
}

/// Verifies tokens signed with a shared secret or a registry key
///
/// Malformed tokens and mismatched wiring (a key id without a resolver, or a
/// resolver without a key id) are errors. Every other reason a token can be
/// rejected collapses into `Ok(false)`, so callers cannot learn why a token
/// failed.
///
/// # Example
///
/// ```
/// use jtoken_core::{Key, JsonKeyStore, TokenBuilder, TokenValidator};
///
/// # fn main() -> Result<(), jtoken_core::TokenError> {
/// let key = Key::new("k1", None, "registry-secret", false);
/// let store = JsonKeyStore::from_keys([key.clone()]);
///
/// let token = TokenBuilder::new().secret(&key).make_token()?;
/// let valid = TokenValidator::new().with_resolver(&store).validate(&token)?;
/// assert!(valid);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Default)]
pub struct TokenValidator<'a> {
    secret: Option<&'a str>,
    algorithm: AlgorithmType,
    resolver: Option<&'a dyn KeyResolver>,
}

impl std::fmt::Debug for TokenValidator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("has_secret", &self.secret.is_some())
            .field("algorithm", &self.algorithm)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl<'a> TokenValidator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify with a raw shared secret
    pub fn with_secret(mut self, secret: &'a str) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Algorithm used to recompute the signature (default HS256)
    pub fn with_algorithm(mut self, algorithm: AlgorithmType) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Resolve the signing key through a registry using the token's `key_id`
    pub fn with_resolver(mut self, resolver: &'a dyn KeyResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Validate a token against the current time
    pub fn validate(&self, token: &str) -> Result<bool, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as if the current time were `now`
    ///
    /// Stages run in order and stop at the first failure:
    /// split, payload decode, key id consistency, key resolution, key state,
    /// claim expiry, secret materialisation, signature comparison.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<bool, TokenError> {
        let parts = split_token(token)?;
        let claims = decode_payload(parts.payload)?;
        let reserved = ReservedClaims::from_claims(&claims)?;

        let key_id = match (&reserved.key_id, self.resolver) {
            (Some(id), None) => return Err(TokenError::MissingResolver(id.clone())),
            (None, Some(_)) => return Err(TokenError::MissingKeyId),
            (key_id, _) => key_id.as_deref(),
        };

        let key = match (key_id, self.resolver) {
            (Some(id), Some(resolver)) => match resolver.get_key_by_id(id) {
                Ok(key) => Some(key),
                Err(_) => return Ok(reject("key resolution")),
            },
            _ => None,
        };

        if let Some(key) = &key {
            if key.is_revoked() || key.is_expired_at(now) {
                return Ok(reject("key state"));
            }
        }

        if let Some(exp) = reserved.exp {
            if exp <= now.timestamp() {
                return Ok(reject("claim expiry"));
            }
        }

        let secret = match effective_secret(key.as_ref(), self.secret) {
            Some(secret) => secret,
            None => return Ok(reject("missing secret")),
        };

        if !self.signature_matches(&parts, secret)? {
            return Ok(reject("signature"));
        }

        Ok(true)
    }

    fn signature_matches(&self, parts: &TokenParts<'_>, secret: &str) -> Result<bool, TokenError> {
        let digest = self
            .algorithm
            .sign(secret.as_bytes(), parts.signing_input().as_bytes())?;
        let expected = codec::encode(&digest);
        let provided = codec::url_safe(parts.signature);
        Ok(expected.as_bytes().ct_eq(provided.as_bytes()).into())
    }
}

fn effective_secret<'k>(key: Option<&'k Key>, secret: Option<&'k str>) -> Option<&'k str> {
    let secret = match key {
        Some(key) => key.value(),
        None => secret?,
    };
    (!secret.is_empty()).then_some(secret)
}

fn reject(stage: &'static str) -> bool {
    debug!(stage, "token rejected");
    false
}

/// Validate a token in one call
///
/// # Arguments
///
/// * `token` - The token string
/// * `secret` - The shared secret, or `None` when a resolver supplies the key
/// * `algorithm` - Algorithm to verify with, `None` for HS256
/// * `resolver` - Key registry used when the token carries a `key_id`
///
/// # Returns
///
/// * `Ok(true)` - The token is authentic and unexpired
/// * `Ok(false)` - The token failed verification
/// * `Err(TokenError)` - The token is malformed or the resolver wiring does not
///   match the token
pub fn validate_token(
    token: &str,
    secret: Option<&str>,
    algorithm: Option<AlgorithmType>,
    resolver: Option<&dyn KeyResolver>,
) -> Result<bool, TokenError> {
    TokenValidator {
        secret,
        algorithm: algorithm.unwrap_or_default(),
        resolver,
    }
    .validate(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::ExpireMode;
    use crate::keystore::JsonKeyStore;
    use crate::mint::TokenBuilder;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn claims(value: Value) -> Claims {
        value.as_object().cloned().unwrap()
    }

    struct FailingResolver;

    impl KeyResolver for FailingResolver {
        fn get_key_by_id(&self, _id: &str) -> Result<Key, TokenError> {
            Err(TokenError::key_store("registry unavailable"))
        }
    }

    #[test]
    fn test_round_trip_with_secret() {
        let token = TokenBuilder::new()
            .secret("k")
            .payload(claims(json!({"sub": "42"})))
            .make_token()
            .unwrap();
        assert!(validate_token(&token, Some("k"), None, None).unwrap());
        assert!(!validate_token(&token, Some("other"), None, None).unwrap());
    }

    #[test]
    fn test_round_trip_each_algorithm() {
        for algorithm in [AlgorithmType::HS256, AlgorithmType::HS384, AlgorithmType::HS512] {
            let token = TokenBuilder::new()
                .secret("k")
                .algorithm(algorithm)
                .make_token()
                .unwrap();
            let validator = TokenValidator::new().with_secret("k");
            assert!(validator.with_algorithm(algorithm).validate(&token).unwrap());
            // The header is not trusted to pick the algorithm
            if algorithm != AlgorithmType::HS256 {
                assert!(!validator.validate(&token).unwrap());
            }
        }
    }

    #[test]
    fn test_flipped_signature_bit_is_rejected() {
        let token = TokenBuilder::new().secret("k").make_token_at(now()).unwrap();
        let parts = split_token(&token).unwrap();
        let signature = codec::decode(parts.signature).unwrap();
        let validator = TokenValidator::new().with_secret("k");

        for byte in 0..signature.len() {
            for bit in 0..8 {
                let mut tampered = signature.clone();
                tampered[byte] ^= 1 << bit;
                let forged = format!(
                    "{}.{}",
                    parts.signing_input(),
                    codec::encode(&tampered)
                );
                assert!(!validator.validate_at(&forged, now()).unwrap());
            }
        }
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let token = TokenBuilder::new()
            .secret("k")
            .payload(claims(json!({"role": "user"})))
            .make_token_at(now())
            .unwrap();
        let parts = split_token(&token).unwrap();
        let forged_payload = codec::encode(br#"{"role":"admin","exp":9999999999}"#);
        let forged = format!("{}.{}.{}", parts.header, forged_payload, parts.signature);
        assert!(!TokenValidator::new()
            .with_secret("k")
            .validate_at(&forged, now())
            .unwrap());
    }

    #[test]
    fn test_expired_claim_is_rejected() {
        let token = TokenBuilder::new()
            .secret("k")
            .expires_ts(now().timestamp() - 1)
            .make_token_at(now())
            .unwrap();
        assert!(!validate_token(&token, Some("k"), None, None).unwrap());
    }

    #[test]
    fn test_exp_boundary_is_inclusive() {
        let exp = now().timestamp();
        let token = TokenBuilder::new()
            .secret("k")
            .expires_ts(exp)
            .make_token_at(now())
            .unwrap();
        let validator = TokenValidator::new().with_secret("k");

        assert!(!validator.validate_at(&token, now()).unwrap());
        assert!(validator
            .validate_at(&token, now() - Duration::seconds(1))
            .unwrap());
    }

    #[test]
    fn test_strict_mode_clock_scenario() {
        let token = TokenBuilder::new()
            .secret("k")
            .algorithm(AlgorithmType::HS256)
            .payload(claims(json!({"sub": "42"})))
            .expire_mode(ExpireMode::Strict)
            .make_token_at(now())
            .unwrap();
        let validator = TokenValidator::new()
            .with_secret("k")
            .with_algorithm(AlgorithmType::HS256);

        assert!(validator
            .validate_at(&token, now() + Duration::hours(23))
            .unwrap());
        assert!(!validator
            .validate_at(&token, now() + Duration::days(2))
            .unwrap());
    }

    #[test]
    fn test_format_errors_are_not_false() {
        let validator = TokenValidator::new().with_secret("k");
        assert!(matches!(
            validator.validate("only.two"),
            Err(TokenError::InvalidFormat(_))
        ));
        assert!(matches!(
            validator.validate("a.b.c"),
            Err(TokenError::InvalidFormat(_))
        ));

        let array_payload = codec::encode(b"[]");
        assert!(matches!(
            validator.validate(&format!("aGVhZA.{array_payload}.c2ln")),
            Err(TokenError::InvalidFormat(_))
        ));

        let string_exp = codec::encode(br#"{"exp":"tomorrow"}"#);
        assert!(matches!(
            validator.validate(&format!("aGVhZA.{string_exp}.c2ln")),
            Err(TokenError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_key_id_without_resolver() {
        let key = Key::new("k1", None, "registry-secret", false);
        let token = TokenBuilder::new().secret(&key).make_token().unwrap();
        let result = validate_token(&token, Some("registry-secret"), None, None);
        assert_eq!(result, Err(TokenError::MissingResolver("k1".to_string())));
    }

    #[test]
    fn test_resolver_without_key_id() {
        let store = JsonKeyStore::from_keys([Key::new("k1", None, "s", false)]);
        let token = TokenBuilder::new().secret("k").make_token().unwrap();
        let result = validate_token(&token, Some("k"), None, Some(&store));
        assert_eq!(result, Err(TokenError::MissingKeyId));
    }

    #[test]
    fn test_round_trip_with_key_registry() {
        let key = Key::new("k1", None, "registry-secret", false);
        let store = JsonKeyStore::from_keys([key.clone()]);
        let token = TokenBuilder::new().secret(&key).make_token().unwrap();

        assert!(validate_token(&token, None, None, Some(&store)).unwrap());
        // The registry key wins over a caller supplied secret
        assert!(validate_token(&token, Some("ignored"), None, Some(&store)).unwrap());
    }

    #[test]
    fn test_revoked_key_is_rejected() {
        let signing_key = Key::new("k1", None, "registry-secret", false);
        let token = TokenBuilder::new().secret(&signing_key).make_token().unwrap();

        let revoked = Key::new("k1", None, "registry-secret", true);
        let store = JsonKeyStore::from_keys([revoked]);
        assert!(!validate_token(&token, None, None, Some(&store)).unwrap());
    }

    #[test]
    fn test_expired_key_is_rejected() {
        let key = Key::new("k1", Some(now() + Duration::hours(1)), "registry-secret", false);
        let token = TokenBuilder::new().secret(&key).make_token_at(now()).unwrap();
        let store = JsonKeyStore::from_keys([key]);
        let validator = TokenValidator::new().with_resolver(&store);

        assert!(validator.validate_at(&token, now()).unwrap());
        assert!(!validator
            .validate_at(&token, now() + Duration::hours(1))
            .unwrap());
    }

    #[test]
    fn test_resolver_failures_become_false() {
        let key = Key::new("k1", None, "registry-secret", false);
        let token = TokenBuilder::new().secret(&key).make_token().unwrap();

        let empty = JsonKeyStore::default();
        assert!(!validate_token(&token, None, None, Some(&empty)).unwrap());
        assert!(!validate_token(&token, None, None, Some(&FailingResolver)).unwrap());
    }

    #[test]
    fn test_missing_or_empty_secret_is_false() {
        let token = TokenBuilder::new().secret("k").make_token().unwrap();
        assert!(!validate_token(&token, None, None, None).unwrap());
        assert!(!validate_token(&token, Some(""), None, None).unwrap());
    }

    #[test]
    fn test_standard_base64_token_validates() {
        let token = TokenBuilder::new()
            .secret("k")
            .url_safe(false)
            .payload(claims(json!({"data": "??>>"})))
            .make_token()
            .unwrap();
        assert!(validate_token(&token, Some("k"), None, None).unwrap());
    }
}
