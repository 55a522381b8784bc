//! Expiring cache envelope over the raw key-value cache adapter.
//!
//! The adapter contract is raw strings; this layer adds `{value, expires}`
//! semantics on top. The cache is consulted opportunistically and is never a
//! correctness dependency — a miss, an expired entry, or a malformed
//! envelope all read as `None` and trigger recomputation upstream.

use chrono::Utc;
use loreweave_core::adapter::CacheAdapter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct Envelope {
    value: String,
    /// Expiry as milliseconds since the epoch; 0 means never.
    expires: i64,
}

/// A best-effort cache with per-entry expiry.
#[derive(Clone)]
pub struct ExpiringCache {
    inner: Arc<dyn CacheAdapter>,
}

impl ExpiringCache {
    pub fn new(inner: Arc<dyn CacheAdapter>) -> Self {
        Self { inner }
    }

    /// Read a value, deleting it if expired.
    pub async fn get(&self, key: &str) -> Option<String> {
        let raw = self.inner.get(key).await?;
        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(e) => e,
            Err(_) => {
                debug!(key, "malformed cache envelope, treating as miss");
                return None;
            }
        };
        if envelope.expires > 0 && Utc::now().timestamp_millis() > envelope.expires {
            self.inner.delete(key).await;
            return None;
        }
        Some(envelope.value)
    }

    /// Store a value, optionally expiring after `ttl`.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires = match ttl {
            Some(ttl) => Utc::now().timestamp_millis() + ttl.as_millis() as i64,
            None => 0,
        };
        let envelope = Envelope {
            value: value.to_string(),
            expires,
        };
        match serde_json::to_string(&envelope) {
            Ok(raw) => self.inner.set(key, &raw).await,
            Err(e) => debug!(key, error = %e, "failed to encode cache envelope"),
        }
    }

    pub async fn delete(&self, key: &str) {
        self.inner.delete(key).await;
    }
}
