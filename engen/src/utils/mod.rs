//! Small helpers for identifiers, timestamps and payload digests.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Returns the current UTC time as an ISO 8601 string with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Generates a new time-ordered identifier.
#[must_use]
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}

/// Returns the hex SHA-256 digest of a JSON payload's canonical text.
///
/// `serde_json` keeps object keys sorted unless `preserve_order` is on,
/// so equal payloads hash equally.
#[must_use]
pub fn payload_digest(payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
