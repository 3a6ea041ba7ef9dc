//! Webhook payload signature verification.
//!
//! The provider signs every webhook POST with an HMAC-SHA256 of the raw
//! request body keyed by the app secret, delivered in the
//! `X-Hub-Signature-256` header as `sha256=<hex digest>`. Verification must
//! run over the exact raw bytes, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Verify a `sha256=<hex>` signature header against the raw request body.
///
/// Returns `false` for malformed headers as well as digest mismatches. The
/// comparison is constant-time via the hmac crate's `verify_slice`.
pub fn verify_signature(app_secret: &str, body: &[u8], header_value: &str) -> bool {
    let hex_digest = match header_value.strip_prefix("sha256=") {
        Some(rest) => rest,
        None => return false,
    };
    let expected = match decode_hex(hex_digest) {
        Some(bytes) => bytes,
        None => return false,
    };

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the `sha256=<hex>` signature for a body. Test fixtures and the
/// verification handshake docs use this to build valid headers.
pub fn sign_body(app_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256={hex}")
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
