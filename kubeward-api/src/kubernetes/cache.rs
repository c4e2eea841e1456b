//! Live client cache keyed by cluster id
//!
//! An entry is only served while it is unexpired and was built from the
//! credential the cluster record currently holds. Stale entries are evicted
//! on lookup.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

use super::client::ClientHandle;

/// Default entry lifetime
pub const DEFAULT_CLIENT_TTL: Duration = Duration::from_secs(600);

/// Cache of live cluster clients
pub trait ClientCache: Send + Sync {
    /// Cached client for `cluster_id`, if one built from `credential_hash` is still fresh
    fn get(&self, cluster_id: &str, credential_hash: &str) -> Option<ClientHandle>;

    fn put(&self, cluster_id: &str, credential_hash: String, client: ClientHandle);

    fn invalidate(&self, cluster_id: &str);
}

/// A cached client plus the fingerprint of the credential that built it
pub struct CacheEntry {
    pub client: ClientHandle,
    pub credential_hash: String,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_usable(&self, credential_hash: &str, now: Instant) -> bool {
        now < self.expires_at && self.credential_hash == credential_hash
    }
}

/// In-memory cache with a fixed time-to-live
pub struct TtlClientCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl TtlClientCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TtlClientCache {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_TTL)
    }
}

impl ClientCache for TtlClientCache {
    fn get(&self, cluster_id: &str, credential_hash: &str) -> Option<ClientHandle> {
        let now = Instant::now();
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match entries.get(cluster_id) {
                None => return None,
                Some(entry) if entry.is_usable(credential_hash, now) => {
                    debug!("Client cache hit for cluster {}", cluster_id);
                    return Some(entry.client.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another caller may have replaced the entry between the two locks
        if let Some(entry) = entries.get(cluster_id) {
            if entry.is_usable(credential_hash, now) {
                return Some(entry.client.clone());
            }
            debug!("Evicting stale client for cluster {}", cluster_id);
            entries.remove(cluster_id);
        }
        None
    }

    fn put(&self, cluster_id: &str, credential_hash: String, client: ClientHandle) {
        let entry = CacheEntry {
            client,
            credential_hash,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(cluster_id.to_string(), entry);
    }

    fn invalidate(&self, cluster_id: &str) {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(cluster_id);
        if removed.is_some() {
            debug!("Invalidated cached client for cluster {}", cluster_id);
        }
    }
}
