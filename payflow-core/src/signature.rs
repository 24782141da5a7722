//! Signing utilities for webhook payloads and idempotency keys.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Signs `{timestamp}.{body}` with HMAC-SHA256, returning lowercase hex.
pub fn sign_payload(body: &[u8], timestamp: i64, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a payload signature using constant-time comparison.
pub fn verify_payload(body: &[u8], timestamp: i64, secret: &str, signature: &str) -> bool {
    let expected = sign_payload(body, timestamp, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Builds the `t=...,v1=...` header value a provider attaches to a delivery.
pub fn signature_header(body: &[u8], timestamp: i64, secret: &str) -> String {
    format!("t={timestamp},v1={}", sign_payload(body, timestamp, secret))
}

/// Derives a stable idempotency key for one logical charge request.
pub fn derive_idempotency_key(customer_id: &str, order_id: &str, amount: i64) -> String {
    let digest = Sha256::digest(format!("{customer_id}:{order_id}:{amount}").as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let body = br#"{"id":"evt_1","type":"payment.captured"}"#;
        let secret = "whsec_test123";

        let signature = sign_payload(body, 1_700_000_000, secret);
        assert_eq!(signature.len(), 64);
        assert!(verify_payload(body, 1_700_000_000, secret, &signature));
        assert!(!verify_payload(body, 1_700_000_001, secret, &signature));
        assert!(!verify_payload(body, 1_700_000_000, "wrong_secret", &signature));
        assert!(!verify_payload(b"tampered", 1_700_000_000, secret, &signature));
    }

    #[test]
    fn test_header_format() {
        let header = signature_header(b"{}", 1_700_000_000, "s");
        assert!(header.starts_with("t=1700000000,v1="));
    }

    #[test]
    fn test_idempotency_key_is_stable() {
        let a = derive_idempotency_key("cus_1", "ord_1", 9999);
        let b = derive_idempotency_key("cus_1", "ord_1", 9999);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, derive_idempotency_key("cus_1", "ord_1", 9998));
    }
}
