//! Constant-time credential checks.
//!
//! Both the bearer token and the webhook signature compare in constant
//! time; a length mismatch still performs a dummy compare so the rejection
//! path has the same timing shape as a near-miss.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header prefix for webhook signatures (lowercase by contract).
const SIGNATURE_PREFIX: &str = "sha256=";

/// Compare a presented secret against the expected one in constant time.
///
/// Unequal lengths compare the presented value against itself to burn the
/// same work, then reject.
fn constant_time_eq(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        let _ = presented.ct_eq(presented);
        return false;
    }
    presented.ct_eq(expected).into()
}

/// Verify an `Authorization` header against the configured API key.
///
/// Accepts only `Bearer <key>`. An empty configured key rejects everything.
#[must_use]
pub fn verify_bearer(header: Option<&str>, expected_key: &str) -> bool {
    if expected_key.is_empty() {
        return false;
    }
    let Some(header) = header else {
        return false;
    };
    let Some(presented) = header.strip_prefix("Bearer ") else {
        return false;
    };
    constant_time_eq(presented.as_bytes(), expected_key.as_bytes())
}

/// Compute the webhook signature header value for a body.
#[must_use]
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify an `X-Webhook-Signature` header over the raw body.
///
/// Rejects when no secret is configured, the header is absent, the prefix
/// is wrong, or the digest mismatches.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(header) = header else {
        return false;
    };
    let Some(presented_hex) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(presented_hex.as_bytes(), expected.as_bytes())
}
