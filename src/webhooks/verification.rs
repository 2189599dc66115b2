//! Svix-style webhook signature verification.

use crate::billing::BillingError;
use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::fmt;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SVIX_ID_HEADER: &str = "svix-id";
pub const SVIX_TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SVIX_SIGNATURE_HEADER: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// Verifies that a raw webhook request came from the billing provider.
///
/// Implementations must reject the request before any of its content is
/// trusted. Verification is pure computation, so the trait is synchronous.
pub trait WebhookVerifier: Send + Sync {
    /// Verify `payload` against the signature headers.
    fn verify(&self, headers: &HeaderMap, payload: &[u8]) -> Result<(), BillingError>;
}

/// HMAC-SHA256 verifier for Svix-signed deliveries.
///
/// The signed content is `"{svix-id}.{svix-timestamp}.{body}"`. The
/// `svix-signature` header holds one or more space separated
/// `v1,<base64>` entries; any match is accepted.
///
/// # Example
///
/// ```rust,ignore
/// use keelson::webhooks::SvixVerifier;
///
/// let verifier = SvixVerifier::new("whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw")?;
/// verifier.verify(&headers, &body)?;
/// ```
pub struct SvixVerifier {
    key: Vec<u8>,
    tolerance: Duration,
}

impl fmt::Debug for SvixVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SvixVerifier")
            .field("key", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl SvixVerifier {
    /// Create a verifier from a `whsec_`-prefixed (or bare) base64 secret.
    pub fn new(secret: &str) -> Result<Self, BillingError> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        if encoded.is_empty() {
            return Err(BillingError::InvalidSigningSecret {
                reason: "secret is empty".to_string(),
            });
        }
        let key = BASE64
            .decode(encoded)
            .map_err(|e| BillingError::InvalidSigningSecret {
                reason: e.to_string(),
            })?;

        Ok(Self {
            key,
            tolerance: Duration::from_secs(300),
        })
    }

    pub fn from_secret(secret: &SecretString) -> Result<Self, BillingError> {
        Self::new(secret.expose_secret())
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn compute_signature(&self, id: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, BillingError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| BillingError::Internal {
            message: e.to_string(),
        })?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Produce a `v1,<base64>` signature entry for the given delivery.
    pub fn sign(&self, id: &str, timestamp: i64, payload: &[u8]) -> Result<String, BillingError> {
        let signature = self.compute_signature(id, timestamp, payload)?;
        Ok(format!("{},{}", SIGNATURE_VERSION, BASE64.encode(signature)))
    }

    /// Verify against an explicit clock reading (unix seconds).
    pub fn verify_at(&self, headers: &HeaderMap, payload: &[u8], now: i64) -> Result<(), BillingError> {
        let id = required_header(headers, SVIX_ID_HEADER)?;
        let timestamp: i64 = required_header(headers, SVIX_TIMESTAMP_HEADER)?
            .parse()
            .map_err(|_| BillingError::MissingWebhookHeaders {
                header: SVIX_TIMESTAMP_HEADER.to_string(),
            })?;
        let signatures = required_header(headers, SVIX_SIGNATURE_HEADER)?;

        let age_seconds = now.saturating_sub(timestamp);
        if age_seconds.unsigned_abs() > self.tolerance.as_secs() {
            return Err(BillingError::WebhookTimestampExpired { age_seconds });
        }

        let expected = self.compute_signature(id, timestamp, payload)?;
        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, encoded)| BASE64.decode(encoded).ok())
            .any(|provided| constant_time_compare(&expected, &provided));

        if !matched {
            tracing::debug!(target: "keelson::webhooks", "Webhook signature verification failed");
            return Err(BillingError::InvalidWebhookSignature);
        }
        Ok(())
    }
}

impl WebhookVerifier for SvixVerifier {
    fn verify(&self, headers: &HeaderMap, payload: &[u8]) -> Result<(), BillingError> {
        self.verify_at(headers, payload, crate::utils::unix_timestamp())
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, BillingError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BillingError::MissingWebhookHeaders {
            header: name.to_string(),
        })
}

/// Constant-time comparison resistant to compiler optimization.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_c2VjcmV0LWtleS1mb3ItdGVzdHM=";
    const NOW: i64 = 1_700_000_000;

    fn headers(id: &str, timestamp: i64, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SVIX_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers.insert(
            SVIX_TIMESTAMP_HEADER,
            HeaderValue::from_str(&timestamp.to_string()).unwrap(),
        );
        headers.insert(SVIX_SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        headers
    }

    #[test]
    fn test_valid_signature() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let body = br#"{"type":"subscriptionItem.active"}"#;
        let signature = verifier.sign("msg_1", NOW, body).unwrap();

        assert!(verifier.verify_at(&headers("msg_1", NOW, &signature), body, NOW).is_ok());
    }

    #[test]
    fn test_any_of_multiple_signatures_matches() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let body = b"{}";
        let good = verifier.sign("msg_1", NOW, body).unwrap();
        let header = format!("v1,AAAA v2,ignored {}", good);

        assert!(verifier.verify_at(&headers("msg_1", NOW, &header), body, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let signature = verifier.sign("msg_1", NOW, b"{}").unwrap();

        let err = verifier
            .verify_at(&headers("msg_1", NOW, &signature), b"{\"x\":1}", NOW)
            .unwrap_err();
        assert_eq!(err, BillingError::InvalidWebhookSignature);
    }

    #[test]
    fn test_signature_bound_to_message_id() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let signature = verifier.sign("msg_1", NOW, b"{}").unwrap();

        let err = verifier
            .verify_at(&headers("msg_2", NOW, &signature), b"{}", NOW)
            .unwrap_err();
        assert_eq!(err, BillingError::InvalidWebhookSignature);
    }

    #[test]
    fn test_timestamp_outside_tolerance() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let old = NOW - 301;
        let signature = verifier.sign("msg_1", old, b"{}").unwrap();

        let err = verifier
            .verify_at(&headers("msg_1", old, &signature), b"{}", NOW)
            .unwrap_err();
        assert_eq!(err, BillingError::WebhookTimestampExpired { age_seconds: 301 });

        let future = NOW + 400;
        let signature = verifier.sign("msg_1", future, b"{}").unwrap();
        assert!(verifier
            .verify_at(&headers("msg_1", future, &signature), b"{}", NOW)
            .is_err());
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        let verifier = SvixVerifier::new(SECRET).unwrap();

        for timestamp in [i64::MIN, i64::MAX] {
            let err = verifier
                .verify_at(&headers("msg_1", timestamp, "v1,AAAA"), b"{}", NOW)
                .unwrap_err();
            assert!(matches!(err, BillingError::WebhookTimestampExpired { .. }));
        }
    }

    #[test]
    fn test_missing_headers() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let err = verifier.verify_at(&HeaderMap::new(), b"{}", NOW).unwrap_err();
        assert_eq!(
            err,
            BillingError::MissingWebhookHeaders {
                header: SVIX_ID_HEADER.to_string()
            }
        );

        let mut partial = headers("msg_1", NOW, "v1,AAAA");
        partial.insert(SVIX_TIMESTAMP_HEADER, HeaderValue::from_static("soon"));
        assert!(matches!(
            verifier.verify_at(&partial, b"{}", NOW),
            Err(BillingError::MissingWebhookHeaders { .. })
        ));
    }

    #[test]
    fn test_invalid_secret() {
        assert!(SvixVerifier::new("whsec_").is_err());
        assert!(SvixVerifier::new("whsec_not base64!").is_err());
        assert!(SvixVerifier::new("c2VjcmV0").is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        assert!(format!("{:?}", verifier).contains("[REDACTED]"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_compare(&[1, 2], &[1, 2, 3]));
    }
}
