//! Access Token Claim Inspection
//!
//! Pure decoding of the expiry claim from a three-part signed token, used for
//! local scheduling decisions only. The signature is NOT verified here; the
//! backend is the authority on token validity, and its 401 responses remain
//! the ground truth. An undecodable token is reported as expired rather than
//! trusted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    /// Expiry in seconds since the Unix epoch
    exp: i64,
}

/// Decode the `exp` claim of a signed token, in epoch milliseconds.
///
/// Returns `None` when the token is not a three-segment signed token, the
/// claims segment is not valid base64url JSON, or the `exp` claim is absent.
pub fn expiry_timestamp(token: &str) -> Option<i64> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    // Tolerate padded encoders; the wire format itself is unpadded base64url.
    let payload = segments[1].trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&decoded).ok()?;

    claim.exp.checked_mul(1000)
}

/// Whether the token is expired at `now`.
///
/// Malformed tokens are always expired: an undecodable credential is never
/// trusted locally.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match expiry_timestamp(token) {
        Some(expiry_millis) => now.timestamp_millis() >= expiry_millis,
        None => true,
    }
}

/// Whether the token is expired right now.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}
