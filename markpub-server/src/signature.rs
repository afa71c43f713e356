//! Webhook signature verification.
//!
//! The notifier signs every request body with HMAC-SHA256 keyed by the app
//! secret and sends the hex digest in [`SIGNATURE_HEADER`].

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded HMAC of the raw body.
pub const SIGNATURE_HEADER: &str = "x-dropbox-signature";

fn digest(body: &[u8], secret: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Hex HMAC-SHA256 of `body`, as the notifier would send it.
pub fn sign(body: &[u8], secret: &[u8]) -> String {
    digest(body, secret).map(hex::encode).unwrap_or_default()
}

/// Checks `provided` (hex, either case) against the HMAC of the exact raw body.
///
/// The digest comparison is constant time. Malformed hex never matches.
pub fn verify_signature(body: &[u8], provided: &str, secret: &[u8]) -> bool {
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    let Some(expected) = digest(body, secret) else {
        return false;
    };
    expected.as_slice().ct_eq(provided.as_slice()).into()
}
