//! Signed-URL verification (spec.md §4.1 "Signed URL verification").
//!
//! The server never issues signatures itself for this emulator's own
//! traffic in the current surface (no "generate a signed URL" endpoint is
//! named in spec.md's key-endpoint list); it only verifies signatures a
//! client presents, exactly as documented.

use crate::error::ApiError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub struct SignedUrlParams<'a> {
    pub algorithm: &'a str,
    pub expires_secs: u64,
    pub timestamp: DateTime<Utc>,
    pub signature_b64url: &'a str,
}

/// Recomputes `HMAC-SHA256(secret, "<METHOD>\n<PATH>\n<TIMESTAMP>")` and
/// compares against the caller's signature; also enforces `now > timestamp`
/// fails. `X-Goog-Expires` is accepted but not re-validated per spec.md §9's
/// open question resolution -- the only operational check is the timestamp.
pub fn verify(
    secret: &str,
    method: &str,
    path: &str,
    params: &SignedUrlParams<'_>,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if params.algorithm != "GOOG4-HMAC-SHA256" {
        return Err(ApiError::Invalid(format!(
            "unsupported signing algorithm '{}'",
            params.algorithm
        )));
    }

    if now > params.timestamp {
        return Err(ApiError::Invalid("signed URL has expired".to_string()));
    }

    let message = format!("{method}\n{path}\n{}", params.timestamp.timestamp());
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("invalid HMAC key length: {e}")))?;
    mac.update(message.as_bytes());
    let expected = mac.finalize().into_bytes();
    let expected_b64 = BASE64URL.encode(expected);

    if expected_b64 != params.signature_b64url {
        return Err(ApiError::Invalid("signed URL signature mismatch".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sign(secret: &str, method: &str, path: &str, timestamp: DateTime<Utc>) -> String {
        let message = format!("{method}\n{path}\n{}", timestamp.timestamp());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        BASE64URL.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn matching_signature_at_exact_expiry_succeeds() {
        let secret = "s3cr3t";
        let timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let signature = sign(secret, "GET", "/storage/v1/b/x/o/y", timestamp);
        let params = SignedUrlParams {
            algorithm: "GOOG4-HMAC-SHA256",
            expires_secs: 3600,
            timestamp,
            signature_b64url: &signature,
        };
        assert!(verify(secret, "GET", "/storage/v1/b/x/o/y", &params, timestamp).is_ok());
    }

    #[test]
    fn expired_timestamp_fails() {
        let secret = "s3cr3t";
        let timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let signature = sign(secret, "GET", "/p", timestamp);
        let params = SignedUrlParams {
            algorithm: "GOOG4-HMAC-SHA256",
            expires_secs: 3600,
            timestamp,
            signature_b64url: &signature,
        };
        let now = timestamp + chrono::Duration::seconds(1);
        assert!(verify(secret, "GET", "/p", &params, now).is_err());
    }

    #[test]
    fn tampered_signature_fails() {
        let secret = "s3cr3t";
        let timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let params = SignedUrlParams {
            algorithm: "GOOG4-HMAC-SHA256",
            expires_secs: 3600,
            timestamp,
            signature_b64url: "not-the-right-signature",
        };
        assert!(verify(secret, "GET", "/p", &params, timestamp).is_err());
    }
}
