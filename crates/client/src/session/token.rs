//! Bearer token payload decoding.
//!
//! Tokens are treated as three-segment dot-delimited credentials with a
//! base64url-encoded JSON payload in the middle segment. The signature is
//! never verified client-side - only the server can do that - so decoding
//! exists purely to read the expiry claim. Anything that fails to decode is
//! treated as invalid, never propagated.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when decoding a token payload.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token does not have the expected three segments.
    #[error("token has {0} segments, expected 3")]
    SegmentCount(usize),

    /// The payload segment is not valid base64url.
    #[error("token payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded payload is not valid JSON.
    #[error("token payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Claims carried in a token payload. All fields are optional; unknown
/// fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry as a Unix timestamp in seconds.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Subject, usually the user's email.
    #[serde(default)]
    pub sub: Option<String>,
    /// Role claim, when the identity service includes one.
    #[serde(default)]
    pub role: Option<String>,
}

impl Claims {
    /// Whether the claims are still valid at `now` (Unix seconds).
    ///
    /// A payload without an expiry claim is treated as valid. That mirrors
    /// the deployed identity service, which has issued such tokens; see the
    /// design notes before changing it.
    #[must_use]
    pub fn valid_at(&self, now: i64) -> bool {
        self.exp.is_none_or(|exp| exp > now)
    }
}

/// Decode the claims of a three-segment bearer token.
///
/// # Errors
///
/// Returns an error if the segment count is not 3, the payload is not
/// base64url, or the decoded payload is not JSON.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let segments = token.split('.').count();
    if segments != 3 {
        return Err(TokenError::SegmentCount(segments));
    }

    let payload = token.split('.').nth(1).unwrap_or_default();
    let decoded = URL_SAFE_NO_PAD.decode(payload)?;
    let claims = serde_json::from_slice(&decoded)?;
    Ok(claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned token with the given JSON payload.
    pub(crate) fn make_token(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn test_decode_claims_with_expiry() {
        let token = make_token(&serde_json::json!({
            "sub": "ana@example.com",
            "exp": 1_900_000_000_i64,
        }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert_eq!(claims.sub.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_decode_claims_without_expiry() {
        let token = make_token(&serde_json::json!({ "sub": "ana@example.com" }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, None);
        assert!(claims.valid_at(i64::MAX - 1));
    }

    #[test]
    fn test_valid_at_boundary() {
        let claims = Claims {
            exp: Some(100),
            sub: None,
            role: None,
        };
        assert!(claims.valid_at(99));
        assert!(!claims.valid_at(100));
        assert!(!claims.valid_at(101));
    }

    #[test]
    fn test_wrong_segment_count() {
        assert!(matches!(
            decode_claims("only.two"),
            Err(TokenError::SegmentCount(2))
        ));
        assert!(matches!(
            decode_claims("a.b.c.d"),
            Err(TokenError::SegmentCount(4))
        ));
        assert!(matches!(
            decode_claims("opaque-token"),
            Err(TokenError::SegmentCount(1))
        ));
    }

    #[test]
    fn test_payload_not_base64() {
        assert!(matches!(
            decode_claims("head.!!!not-base64!!!.sig"),
            Err(TokenError::Base64(_))
        ));
    }

    #[test]
    fn test_payload_not_json() {
        let body = URL_SAFE_NO_PAD.encode(b"plain text");
        let token = format!("head.{body}.sig");
        assert!(matches!(
            decode_claims(&token),
            Err(TokenError::Payload(_))
        ));
    }
}
