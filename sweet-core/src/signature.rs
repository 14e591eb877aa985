//! Webhook signature verification using the processor's `t=…,v1=…` scheme.
//!
//! The signed payload is `"{timestamp}.{raw body}"`, authenticated with
//! HMAC-SHA256 under the endpoint's signing secret.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature header has no timestamp")]
    MissingTimestamp,
    #[error("signature header has no v1 signature")]
    MissingSignature,
    #[error("signature timestamp {timestamp} is outside the {tolerance}s tolerance")]
    OutsideTolerance { timestamp: i64, tolerance: i64 },
    #[error("no signature matches the payload")]
    Mismatch,
    #[error("webhook secret cannot be used as an HMAC key")]
    InvalidSecret,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: i64,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"********")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: DEFAULT_TOLERANCE_SECONDS,
        }
    }

    pub fn with_tolerance(mut self, seconds: i64) -> Self {
        self.tolerance = seconds;
        self
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        let parsed = parse_header(header)?;

        if (now - parsed.timestamp).abs() > self.tolerance {
            return Err(SignatureError::OutsideTolerance {
                timestamp: parsed.timestamp,
                tolerance: self.tolerance,
            });
        }

        let mac = self.mac_for(payload, parsed.timestamp)?;
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Builds a header value the processor would send for `payload`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let mac = self.mac_for(payload, timestamp)?;
        Ok(format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    fn mac_for(&self, payload: &[u8], timestamp: i64) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

fn parse_header(header: &str) -> Result<ParsedHeader, SignatureError> {
    let header = header.trim();
    if header.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();
    let mut saw_v1 = false;

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(SignatureError::Malformed)?;
        match key {
            "t" => {
                let ts = value.parse::<i64>().map_err(|_| SignatureError::Malformed)?;
                timestamp = Some(ts);
            }
            "v1" => {
                saw_v1 = true;
                // Undecodable entries simply never match.
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if !saw_v1 {
        return Err(SignatureError::MissingSignature);
    }

    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const PAYLOAD: &[u8] = br#"{"type":"payment_intent.succeeded"}"#;
    const NOW: i64 = 1_760_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET)
    }

    #[test]
    fn accepts_valid_signature() {
        let header = verifier().sign(PAYLOAD, NOW).unwrap();
        assert_eq!(verifier().verify_at(PAYLOAD, &header, NOW), Ok(()));
    }

    #[test]
    fn accepts_when_any_v1_entry_matches() {
        let good = verifier().sign(PAYLOAD, NOW).unwrap();
        let sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), sig);
        assert_eq!(verifier().verify_at(PAYLOAD, &header, NOW), Ok(()));
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = SignatureVerifier::new("wrong_secret").sign(PAYLOAD, NOW).unwrap();
        assert_eq!(
            verifier().verify_at(PAYLOAD, &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_modified_payload() {
        let header = verifier().sign(PAYLOAD, NOW).unwrap();
        let tampered = br#"{"type":"payment_intent.succeeded","hacked":true}"#;
        assert_eq!(
            verifier().verify_at(tampered, &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_old_timestamp() {
        let header = verifier().sign(PAYLOAD, NOW - 600).unwrap();
        assert!(matches!(
            verifier().verify_at(PAYLOAD, &header, NOW),
            Err(SignatureError::OutsideTolerance { .. })
        ));
    }

    #[test]
    fn custom_tolerance_applies() {
        let header = verifier().sign(PAYLOAD, NOW - 600).unwrap();
        let relaxed = verifier().with_tolerance(900);
        assert_eq!(relaxed.verify_at(PAYLOAD, &header, NOW), Ok(()));
    }

    #[test]
    fn header_shape_errors() {
        let v = verifier();
        assert_eq!(v.verify_at(PAYLOAD, "", NOW), Err(SignatureError::Malformed));
        assert_eq!(v.verify_at(PAYLOAD, "garbage", NOW), Err(SignatureError::Malformed));
        assert_eq!(
            v.verify_at(PAYLOAD, "v1=abcdef", NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            v.verify_at(PAYLOAD, &format!("t={}", NOW), NOW),
            Err(SignatureError::MissingSignature)
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let rendered = format!("{:?}", verifier());
        assert!(!rendered.contains(SECRET));
    }
}
