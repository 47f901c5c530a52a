//! Random token generation for session identifiers and CSRF secrets.

use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use subtle::ConstantTimeEq;

/// Generate a cryptographically random token.
///
/// Returns an unpadded URL-safe base64 string (43 characters) from 32 random bytes, so it can
/// travel in cookies and form fields without escaping.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare two tokens without leaking the position of the first difference.
pub fn tokens_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
