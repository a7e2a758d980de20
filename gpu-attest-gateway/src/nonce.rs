use std::fmt;

/// The number of bytes in an attestation nonce.
pub const NONCE_SIZE: usize = 32;

/// Checks whether `s` is a hex string representing exactly `num_bytes` bytes.
pub fn is_valid_hex(s: &str, num_bytes: usize) -> bool {
    if s.len() != num_bytes * 2 {
        return false;
    }
    match hex::decode(s) {
        Ok(decoded) => decoded.len() == num_bytes,
        Err(_) => false,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("nonce must be a 32-byte hex string")]
pub struct InvalidNonce;

/// A nonce that has been validated to be a hex encoded [`NONCE_SIZE`] byte string.
///
/// The original text is kept so it's forwarded to the verifier exactly as the client sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Parse an optional nonce. An empty string means no nonce was provided.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, InvalidNonce> {
        if s.is_empty() {
            return Ok(None);
        }
        s.parse().map(Some)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Nonce {
    type Err = InvalidNonce;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_valid_hex(s, NONCE_SIZE) { Ok(Self(s.to_string())) } else { Err(InvalidNonce) }
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
