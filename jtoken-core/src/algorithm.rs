use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::TokenError;

/// HMAC signing algorithms a token may be signed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AlgorithmType {
    /// HMAC-SHA256 (default)
    #[default]
    #[serde(alias = "hs256")]
    HS256,
    /// HMAC-SHA384
    #[serde(alias = "hs384")]
    HS384,
    /// HMAC-SHA512
    #[serde(alias = "hs512")]
    HS512,
}

impl AlgorithmType {
    /// Canonical name written into the token header
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmType::HS256 => "HS256",
            AlgorithmType::HS384 => "HS384",
            AlgorithmType::HS512 => "HS512",
        }
    }

    /// Name of the underlying digest function
    pub fn digest_name(&self) -> &'static str {
        match self {
            AlgorithmType::HS256 => "sha256",
            AlgorithmType::HS384 => "sha384",
            AlgorithmType::HS512 => "sha512",
        }
    }

    /// Compute the raw HMAC of `message` keyed with `secret`
    pub fn sign(&self, secret: &[u8], message: &[u8]) -> Result<Vec<u8>, TokenError> {
        match self {
            AlgorithmType::HS256 => hmac_digest::<Hmac<Sha256>>(secret, message),
            AlgorithmType::HS384 => hmac_digest::<Hmac<Sha384>>(secret, message),
            AlgorithmType::HS512 => hmac_digest::<Hmac<Sha512>>(secret, message),
        }
    }

    /// Compute the plain (unkeyed) digest of `data`
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            AlgorithmType::HS256 => Sha256::digest(data).to_vec(),
            AlgorithmType::HS384 => Sha384::digest(data).to_vec(),
            AlgorithmType::HS512 => Sha512::digest(data).to_vec(),
        }
    }
}

fn hmac_digest<M: Mac + hmac::digest::KeyInit>(
    secret: &[u8],
    message: &[u8],
) -> Result<Vec<u8>, TokenError> {
    let mut mac = <M as Mac>::new_from_slice(secret)
        .map_err(|e| TokenError::crypto(format!("Failed to initialise HMAC: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmType {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" | "SHA256" => Ok(AlgorithmType::HS256),
            "HS384" | "SHA384" => Ok(AlgorithmType::HS384),
            "HS512" | "SHA512" => Ok(AlgorithmType::HS512),
            _ => Err(TokenError::unsupported(format!("algorithm '{s}'"))),
        }
    }
}

/// Token type tag carried in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SupportedType {
    #[default]
    #[serde(rename = "JWT", alias = "jwt")]
    Jwt,
}

impl SupportedType {
    pub fn name(&self) -> &'static str {
        match self {
            SupportedType::Jwt => "JWT",
        }
    }
}

impl fmt::Display for SupportedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SupportedType {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JWT" => Ok(SupportedType::Jwt),
            _ => Err(TokenError::unsupported(format!("token type '{s}'"))),
        }
    }
}

/// Named token lifetimes used when no explicit expiry is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpireMode {
    /// One month
    #[default]
    #[serde(alias = "LOW")]
    Low,
    /// One week
    #[serde(alias = "MIDDLE")]
    Middle,
    /// One day
    #[serde(alias = "STRICT")]
    Strict,
}

impl ExpireMode {
    pub fn name(&self) -> &'static str {
        match self {
            ExpireMode::Low => "low",
            ExpireMode::Middle => "middle",
            ExpireMode::Strict => "strict",
        }
    }

    /// The instant a token issued at `now` expires under this mode.
    ///
    /// Returns `None` only if the result falls outside chrono's range.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ExpireMode::Low => now.checked_add_months(Months::new(1)),
            ExpireMode::Middle => now.checked_add_signed(Duration::weeks(1)),
            ExpireMode::Strict => now.checked_add_signed(Duration::days(1)),
        }
    }
}

impl fmt::Display for ExpireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExpireMode {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(ExpireMode::Low),
            "middle" => Ok(ExpireMode::Middle),
            "strict" => Ok(ExpireMode::Strict),
            _ => Err(TokenError::unsupported(format!("expire mode '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_algorithm_names() {
        assert_eq!(AlgorithmType::default(), AlgorithmType::HS256);
        assert_eq!(AlgorithmType::HS384.name(), "HS384");
        assert_eq!(AlgorithmType::HS512.digest_name(), "sha512");
        assert_eq!("hs512".parse::<AlgorithmType>().unwrap(), AlgorithmType::HS512);
        assert!("RS256".parse::<AlgorithmType>().is_err());
    }

    #[test]
    fn test_unknown_names_are_unsupported() {
        let err = "RS256".parse::<AlgorithmType>().unwrap_err();
        assert_eq!(err, TokenError::Unsupported("algorithm 'RS256'".to_string()));
        assert_eq!(err.to_string(), "Unsupported algorithm 'RS256'");
        assert!(err.is_configuration());

        assert!(matches!(
            "paseto".parse::<SupportedType>(),
            Err(TokenError::Unsupported(_))
        ));
        assert!(matches!(
            "forever".parse::<ExpireMode>(),
            Err(TokenError::Unsupported(_))
        ));
    }

    #[test]
    fn test_digest_lengths() {
        let secret = b"k";
        assert_eq!(AlgorithmType::HS256.sign(secret, b"m").unwrap().len(), 32);
        assert_eq!(AlgorithmType::HS384.sign(secret, b"m").unwrap().len(), 48);
        assert_eq!(AlgorithmType::HS512.sign(secret, b"m").unwrap().len(), 64);
        assert_eq!(AlgorithmType::HS512.digest(b"m").len(), 64);
    }

    #[test]
    fn test_hmac_sha256_known_vector() {
        // RFC 4231 test case 2
        let mac = AlgorithmType::HS256
            .sign(b"Jefe", b"what do ya want for nothing?")
            .unwrap();
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&AlgorithmType::HS256).unwrap(),
            "\"HS256\""
        );
        assert_eq!(serde_json::to_string(&SupportedType::Jwt).unwrap(), "\"JWT\"");
        assert_eq!(
            serde_json::from_str::<ExpireMode>("\"STRICT\"").unwrap(),
            ExpireMode::Strict
        );
    }

    #[test]
    fn test_expire_mode_durations() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            ExpireMode::Strict.expires_at(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            ExpireMode::Middle.expires_at(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 7, 12, 0, 0).unwrap()
        );
        // Calendar month arithmetic clamps to the end of February
        assert_eq!(
            ExpireMode::Low.expires_at(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
        );
        assert_eq!(ExpireMode::default(), ExpireMode::Low);
    }
}
