//! Digests that identify service bus state across processes.
//!
//! The HTTP channel keys its cached auth token by
//! [`ServiceBusConfig::token_key`](crate::ServiceBusConfig::token_key) and
//! FIFO queue messages carry the body digest as their deduplication id. Both
//! must be identical on every node, so they are plain lowercase hex SHA-256.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
