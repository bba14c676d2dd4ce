//! Transport token decoding.
//!
//! The camera firmware prints every byte as hex on its own line and drops the
//! leading zero for values below 0x10, so a line holds one or two hex digits.
//! `decode_token` turns one such token into exactly one byte and knows nothing
//! about framing.

use thiserror::Error;

/// Errors produced while decoding a single token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Token is neither one nor two characters after trimming.
    #[error("malformed token: expected 1 or 2 hex characters, got {len}")]
    MalformedEncoding { len: usize },
    /// Token has the right length but is not hex.
    #[error("invalid hex token {token:?}")]
    InvalidHex { token: String },
}

/// Decode a one- or two-character hex token into a byte.
///
/// Surrounding ASCII whitespace (including `\r\n`) is ignored. Both cases are
/// accepted, so `"a"`, `"A"`, `"0a"` and `"0A"` all decode to `0x0A`.
pub fn decode_token(raw: &[u8]) -> Result<u8, TokenError> {
    let token = raw.trim_ascii();
    let padded = match token.len() {
        1 => [b'0', token[0]],
        2 => [token[0], token[1]],
        len => return Err(TokenError::MalformedEncoding { len }),
    };
    let mut out = [0u8; 1];
    hex::decode_to_slice(padded, &mut out).map_err(|_| TokenError::InvalidHex {
        token: String::from_utf8_lossy(token).into_owned(),
    })?;
    Ok(out[0])
}
