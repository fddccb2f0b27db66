use rand::rngs::OsRng;
use rand::RngCore;

use crate::algorithm::AlgorithmType;
use crate::error::TokenError;

/// Number of random bytes drawn per half by [`generate_hash_default`]
pub const DEFAULT_HASH_BYTES: usize = 10_000;

/// Generate a random identifier suitable for a registry key id or secret
///
/// Two independent buffers of `num_bytes` are drawn from the operating system
/// RNG, concatenated and digested with the digest behind `algorithm`. The hex
/// digest is appended to `prefix`.
///
/// # Arguments
///
/// * `prefix` - Text placed before the digest, may be empty
/// * `num_bytes` - Size of each random buffer
/// * `algorithm` - Selects the digest (SHA-256, SHA-384 or SHA-512)
///
/// # Returns
///
/// `prefix` followed by the lowercase hex digest
pub fn generate_hash(
    prefix: &str,
    num_bytes: usize,
    algorithm: AlgorithmType,
) -> Result<String, TokenError> {
    let total = num_bytes.checked_mul(2).ok_or_else(|| {
        TokenError::crypto(format!("Too many random bytes requested: {num_bytes}"))
    })?;
    let mut entropy = vec![0u8; total];
    OsRng
        .try_fill_bytes(&mut entropy[..num_bytes])
        .and_then(|_| OsRng.try_fill_bytes(&mut entropy[num_bytes..]))
        .map_err(|e| TokenError::crypto(format!("Failed to read random bytes: {e}")))?;

    Ok(format!("{prefix}{}", hex::encode(algorithm.digest(&entropy))))
}

/// [`generate_hash`] with HS256's digest and the default buffer size
pub fn generate_hash_default(prefix: &str) -> Result<String, TokenError> {
    generate_hash(prefix, DEFAULT_HASH_BYTES, AlgorithmType::HS256)
}
