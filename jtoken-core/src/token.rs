use serde_json::Value;

use crate::codec;
use crate::error::TokenError;
use crate::mint::{Claims, Header};

/// The three encoded segments of a token, borrowed from the token string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenParts<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

impl<'a> TokenParts<'a> {
    /// The text the signature is computed over: `header.payload`
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }
}

/// Split a token into its header, payload and signature segments
///
/// Surrounding whitespace is ignored. Exactly three non-empty dot-separated
/// segments are required.
///
/// # Arguments
///
/// * `token` - The token string
///
/// # Returns
///
/// The borrowed segments or `TokenError::InvalidFormat`
pub fn split_token(token: &str) -> Result<TokenParts<'_>, TokenError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    match parts.as_slice() {
        &[header, payload, signature]
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok(TokenParts {
                header,
                payload,
                signature,
            })
        }
        _ => Err(TokenError::format("Wrong token format")),
    }
}

/// Decode a payload segment into its claim map
pub fn decode_payload(segment: &str) -> Result<Claims, TokenError> {
    let bytes = codec::decode(segment)?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::format(format!("Payload is not valid JSON: {e}")))?;
    match value {
        Value::Object(claims) => Ok(claims),
        _ => Err(TokenError::format("Payload is not a JSON object")),
    }
}

/// Decode a header segment
pub fn decode_header(segment: &str) -> Result<Header, TokenError> {
    let bytes = codec::decode(segment)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::format(format!("Header is not valid: {e}")))
}

/// Returns the token's payload without validating it
///
/// Nothing about the signature, expiry or key is checked. Use this only to
/// route or inspect a token before handing it to the validator.
pub fn get_token_payload(token: &str) -> Result<Claims, TokenError> {
    let parts = split_token(token)?;
    decode_payload(parts.payload)
}
