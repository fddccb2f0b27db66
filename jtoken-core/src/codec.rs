use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::TokenError;

/// Encode binary data as unpadded base64url text
///
/// Standard base64 is produced first, then `+` becomes `-`, `/` becomes `_`
/// and the trailing `=` padding is removed.
///
/// # Arguments
///
/// * `bytes` - Raw bytes to encode
///
/// # Returns
///
/// URL-safe base64 text without padding
pub fn encode(bytes: &[u8]) -> String {
    url_safe(&STANDARD.encode(bytes))
}

/// Encode binary data as standard padded base64 text
pub fn encode_standard(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64url text back into bytes
///
/// Both the URL-safe and the standard alphabet are accepted, with or without
/// trailing padding.
///
/// # Arguments
///
/// * `text` - base64url (or standard base64) text
///
/// # Returns
///
/// The decoded bytes or `TokenError::InvalidFormat` if the text is not base64
pub fn decode(text: &str) -> Result<Vec<u8>, TokenError> {
    let standard = to_standard(text)?;
    Ok(STANDARD.decode(standard)?)
}

/// Rebuild a native padded base64 string from its URL-safe form
///
/// Padding is restored from the unpadded length: a remainder of 0 needs
/// nothing, 2 needs `==`, 3 needs `=`. A remainder of 1 can never come out of
/// a base64 encoder and is rejected.
pub fn to_standard(text: &str) -> Result<String, TokenError> {
    let mut standard: String = text
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    match standard.len() % 4 {
        0 => {}
        2 => standard.push_str("=="),
        3 => standard.push('='),
        _ => {
            return Err(TokenError::format(
                "The string is not base64 encoded: invalid length",
            ))
        }
    }

    Ok(standard)
}

/// Make a standard base64 string URL safe by swapping `+` and `/` and
/// dropping the `=` padding
pub fn url_safe(encoded: &str) -> String {
    encoded
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_url_safe_and_unpadded() {
        // 0xfb 0xff encodes to "+/8=" in the standard alphabet
        let encoded = encode(&[0xfb, 0xff]);
        assert_eq!(encoded, "-_8");
        assert_eq!(encode_standard(&[0xfb, 0xff]), "+/8=");
    }

    #[test]
    fn test_decode_restores_every_valid_remainder() {
        // Lengths 0, 1, 2, 3 bytes give unpadded lengths with remainder 0, 2, 3, 0
        for len in 0..=9usize {
            let bytes: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(37) ^ 0xa5).collect();
            let encoded = encode(&bytes);
            assert_ne!(encoded.len() % 4, 1);
            assert_eq!(decode(&encoded).unwrap(), bytes, "length {len}");
        }
    }

    #[test]
    fn test_decode_rejects_remainder_one() {
        assert!(matches!(decode("A"), Err(TokenError::InvalidFormat(_))));
        assert!(matches!(decode("AAAAB"), Err(TokenError::InvalidFormat(_))));
    }

    #[test]
    fn test_decode_rejects_foreign_characters() {
        match decode("inva!id-") {
            Err(TokenError::InvalidFormat(msg)) => {
                assert!(msg.starts_with("Failed to decode base64 segment"), "{msg}")
            }
            other => panic!("Expected InvalidFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_accepts_standard_alphabet() {
        let bytes = [0xfb, 0xff, 0x00, 0x10];
        let standard = encode_standard(&bytes);
        assert!(standard.ends_with('='));
        assert_eq!(decode(&standard).unwrap(), bytes);
    }

    #[test]
    fn test_to_standard_padding() {
        assert_eq!(to_standard("-_8").unwrap(), "+/8=");
        assert_eq!(to_standard("QQ").unwrap(), "QQ==");
        assert_eq!(to_standard("QUJD").unwrap(), "QUJD");
        assert_eq!(to_standard("").unwrap(), "");
    }
}
