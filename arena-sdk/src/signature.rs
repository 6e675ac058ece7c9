//! Signature scheme shared by the indexer and the control plane.
//!
//! Webhook bodies (and, optionally, chain-event ingestion bodies) are signed
//! with HMAC-SHA256 over the exact canonical JSON bytes that go on the wire.
//! The header carries the lowercase hex digest:
//!
//! ```text
//! X-Arena-Signature: 5d41402abc4b2a76b9719d911017c592...
//! ```
//!
//! Canonical JSON means object keys sorted lexicographically at every depth
//! and no insignificant whitespace. Together with [`Quantity`](crate::Quantity)
//! rendering big integers as decimal strings, the same logical payload always
//! produces the same bytes and therefore the same signature.

use alloy_primitives::hex;
use serde_json::Value;

/// Header name for the HMAC signature.
pub const SIGNATURE_HEADER: &str = "X-Arena-Signature";

/// Default maximum accepted age of a signed envelope, in milliseconds.
pub const DEFAULT_MAX_AGE_MS: i64 = 5 * 60 * 1000;

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

// ---------------------------------------------------------------------------
// Canonical JSON
// ---------------------------------------------------------------------------

/// Render `value` as canonical JSON.
///
/// Key order does not depend on how the `Value` was built, nor on whether
/// `serde_json` was compiled with `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_scalar(&Value::String(key.clone()), out);
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut String) {
    // Scalars have exactly one compact rendering.
    out.push_str(&value.to_string());
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

fn key(secret: &[u8]) -> ring::hmac::Key {
    ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret)
}

/// Compute `hex(HMAC-SHA256(body, secret))`.
pub fn sign(body: &[u8], secret: &[u8]) -> String {
    let tag = ring::hmac::sign(&key(secret), body);
    hex::encode(tag.as_ref())
}

/// Verify a hex signature against `body` in constant time.
pub fn verify(body: &[u8], signature_hex: &str, secret: &[u8]) -> Result<(), SignatureError> {
    let signature = hex::decode(signature_hex.trim()).map_err(|_| SignatureError::InvalidHex)?;
    ring::hmac::verify(&key(secret), body, &signature)?;
    Ok(())
}

/// Check that an envelope timestamp (epoch milliseconds) is no older than
/// `max_age_ms`.
pub fn check_timestamp(timestamp_ms: i64, max_age_ms: i64) -> Result<(), SignatureError> {
    let now = now_millis();
    if now - timestamp_ms > max_age_ms {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

/// Current wall clock in epoch milliseconds.
pub fn now_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000_000) as i64
}

// ---------------------------------------------------------------------------
// SignedPayload
// ---------------------------------------------------------------------------

/// A canonical JSON body together with its signature, ready to send.
///
/// `signature` is `None` when no secret is configured; the request then goes
/// out unsigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub json: String,
    pub signature: Option<String>,
}

impl SignedPayload {
    /// Canonicalize `value` and sign it with `secret` if one is given.
    pub fn new(value: &Value, secret: Option<&[u8]>) -> Self {
        let json = canonical_json(value);
        let signature = secret.map(|s| sign(json.as_bytes(), s));
        Self { json, signature }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Quantity;
    use alloy_primitives::U256;
    use serde_json::json;

    const SECRET: &[u8] = b"control-plane-secret";

    #[test]
    fn canonical_json_sorts_keys_at_every_depth() {
        let a = json!({ "b": 1, "a": { "z": true, "y": [ { "d": 1, "c": 2 } ] } });
        assert_eq!(
            canonical_json(&a),
            r#"{"a":{"y":[{"c":2,"d":1}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn same_payload_same_signature() {
        let first = json!({ "eventType": "trade_opened", "timestamp": 1, "matchId": "1" });
        let second = json!({ "matchId": "1", "timestamp": 1, "eventType": "trade_opened" });
        let a = SignedPayload::new(&first, Some(SECRET));
        let b = SignedPayload::new(&second, Some(SECRET));
        assert_eq!(a.json, b.json);
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn changed_field_changes_signature() {
        let a = SignedPayload::new(&json!({ "matchId": "1" }), Some(SECRET));
        let b = SignedPayload::new(&json!({ "matchId": "2" }), Some(SECRET));
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn native_and_stringified_big_integers_sign_identically() {
        let big = U256::from(10u64).pow(U256::from(30u64));
        let native = json!({ "value": Quantity(big) });
        let stringified = json!({ "value": "1000000000000000000000000000000" });
        let a = SignedPayload::new(&native, Some(SECRET));
        let b = SignedPayload::new(&stringified, Some(SECRET));
        assert_eq!(a.json, b.json);
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn unsigned_without_secret() {
        let payload = SignedPayload::new(&json!({ "a": 1 }), None);
        assert!(!payload.is_signed());
        assert_eq!(payload.json, r#"{"a":1}"#);
    }

    #[test]
    fn verify_roundtrip_and_mismatch() {
        let body = br#"{"a":1}"#;
        let sig = sign(body, SECRET);
        assert!(verify(body, &sig, SECRET).is_ok());
        assert!(matches!(
            verify(br#"{"a":2}"#, &sig, SECRET),
            Err(SignatureError::SignatureMismatch)
        ));
        assert!(matches!(
            verify(body, &sig, b"other-secret"),
            Err(SignatureError::SignatureMismatch)
        ));
        assert!(matches!(
            verify(body, "not-hex", SECRET),
            Err(SignatureError::InvalidHex)
        ));
    }

    #[test]
    fn timestamp_window() {
        assert!(check_timestamp(now_millis(), DEFAULT_MAX_AGE_MS).is_ok());
        assert!(matches!(
            check_timestamp(now_millis() - DEFAULT_MAX_AGE_MS - 1_000, DEFAULT_MAX_AGE_MS),
            Err(SignatureError::Expired)
        ));
    }
}
