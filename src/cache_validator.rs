use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cached provider payload with a SHA-256 integrity checksum and its own TTL.
///
/// The fetch client stores the raw JSON body once and decodes it into the
/// caller's type on every hit. The checksum is computed when the entry is
/// created and verified on read; an entry whose body no longer matches is
/// treated as a miss and refetched.
#[derive(Debug, Clone)]
pub struct ValidatedCacheEntry {
    /// Raw JSON payload as returned by the provider
    pub body: Arc<String>,
    /// SHA-256 checksum of the body (hex encoded)
    pub checksum: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl ValidatedCacheEntry {
    /// Creates a new entry stamped with the current instant.
    pub fn new(body: Arc<String>, ttl: Duration) -> Self {
        let checksum = Self::compute_checksum(&body);
        Self {
            body,
            checksum,
            created_at: Instant::now(),
            ttl,
        }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// An entry is live while its age is strictly below the TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }

    /// Returns true if the checksum still matches the body.
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.body) == self.checksum
    }

    /// Returns the body if the entry is both live and intact.
    pub fn live_body(&self) -> Option<Arc<String>> {
        if self.is_expired() {
            return None;
        }
        if !self.is_valid() {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                self.checksum,
                self.body.len()
            );
            return None;
        }
        Some(self.body.clone())
    }
}
