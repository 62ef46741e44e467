// runloop-notify/src/signing.rs
// ============================================================================
// Module: Webhook Signing
// Description: HMAC-SHA256 request signing and constant-time verification.
// Purpose: Let a subscriber prove a delivery came from this notifier and was
//          not replayed outside a tolerance window.
// Dependencies: hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! Two signatures are attached to every signed request: a v1 signature over
//! the raw body (kept for subscribers that predate timestamp binding) and a
//! v2 signature over `"<timestamp>.<body>"`, which [`verify`] actually
//! checks. Comparison is constant-time via [`subtle::ConstantTimeEq`].

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// The three headers a signed delivery carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// `X-Webhook-Signature` value, e.g. `sha256=<hex>`.
    pub signature: String,
    /// `X-Webhook-Timestamp` value, Unix seconds as a decimal string.
    pub timestamp: String,
    /// `X-Webhook-Signature-V2` value, e.g. `sha256=<hex>`.
    pub signature_v2: String,
}

/// Computes the signature headers for `body`, signed with `secret` at
/// `timestamp_unix_secs`.
#[must_use]
pub fn sign(secret: &str, body: &[u8], timestamp_unix_secs: i64) -> SignatureHeaders {
    let v1 = hmac_hex(secret.as_bytes(), body);
    let timestamp = timestamp_unix_secs.to_string();
    let v2_message = format!("{timestamp}.{}", String::from_utf8_lossy(body));
    let v2 = hmac_hex(secret.as_bytes(), v2_message.as_bytes());
    SignatureHeaders {
        signature: format!("sha256={v1}"),
        timestamp,
        signature_v2: format!("sha256={v2}"),
    }
}

/// Verifies a v2 signature against `body`, accepting it only if
/// `timestamp_unix_secs` is within `tolerance_secs` of `now_unix_secs` and
/// the HMAC matches in constant time.
#[must_use]
pub fn verify(
    secret: &str,
    body: &[u8],
    timestamp_unix_secs: i64,
    provided_signature_v2: &str,
    now_unix_secs: i64,
    tolerance_secs: i64,
) -> bool {
    if (now_unix_secs - timestamp_unix_secs).abs() > tolerance_secs {
        return false;
    }
    let Some(provided_hex) = provided_signature_v2.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(provided_bytes) = hex_decode(provided_hex) else {
        return false;
    };
    let v2_message = format!("{timestamp_unix_secs}.{}", String::from_utf8_lossy(body));
    let expected_hex = hmac_hex(secret.as_bytes(), v2_message.as_bytes());
    let Ok(expected_bytes) = hex_decode(&expected_hex) else {
        return false;
    };
    if provided_bytes.len() != expected_bytes.len() {
        return false;
    }
    provided_bytes.ct_eq(&expected_bytes).into()
}

/// Computes `hmac_sha256(key, message)`, hex-encoded.
fn hmac_hex(key: &[u8], message: &[u8]) -> String {
    #[allow(clippy::expect_used, reason = "HMAC accepts keys of any length, this never fails")]
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(message);
    runloop_core::model::hashing::hex_encode(&mac.finalize().into_bytes())
}

/// Decodes a lowercase hex string into bytes.
fn hex_decode(hex: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::sign;
    use super::verify;

    #[test]
    fn signature_verifies_within_tolerance() {
        let body = br#"[{"id":"1"}]"#;
        let headers = sign("secret", body, 1_000);
        assert!(verify("secret", body, 1_000, &headers.signature_v2, 1_100, 300));
    }

    #[test]
    fn signature_rejects_outside_tolerance() {
        let body = br#"[{"id":"1"}]"#;
        let headers = sign("secret", body, 1_000);
        assert!(!verify("secret", body, 1_000, &headers.signature_v2, 2_000, 300));
    }

    #[test]
    fn signature_rejects_wrong_secret() {
        let body = br#"[{"id":"1"}]"#;
        let headers = sign("secret", body, 1_000);
        assert!(!verify("other", body, 1_000, &headers.signature_v2, 1_000, 300));
    }

    #[test]
    fn signature_rejects_tampered_body() {
        let body = br#"[{"id":"1"}]"#;
        let headers = sign("secret", body, 1_000);
        assert!(!verify("secret", br#"[{"id":"2"}]"#, 1_000, &headers.signature_v2, 1_000, 300));
    }
}
