//! In-memory data stores.
//!
//! [`KeyValueStore`] maps keys to string values with optional expiration, and
//! [`HashStore`] maps hash names to field/value maps. Each store is guarded by its own
//! reader/writer lock, so the two are linearized independently of each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::debug;

#[derive(Debug, PartialEq, Clone)]
pub struct Value {
    pub data: Bytes,
    pub expiration: Option<Instant>,
}

impl Value {
    fn is_expired(&self, now: Instant) -> bool {
        self.expiration.is_some_and(|expiration| expiration <= now)
    }
}

#[derive(Debug, Default)]
struct Entries {
    values: HashMap<Bytes, Value>,
    /// Deadlines ordered by time, so the sweeper only looks at the front.
    expirations: BTreeSet<(Instant, Bytes)>,
}

impl Entries {
    fn next_expiration(&self) -> Option<Instant> {
        self.expirations.first().map(|(when, _)| *when)
    }

    fn forget_expiration(&mut self, key: &Bytes, previous: Option<Value>) {
        if let Some(when) = previous.and_then(|value| value.expiration) {
            self.expirations.remove(&(when, key.clone()));
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    entries: RwLock<Entries>,
    /// Wakes the sweeper when a new, earlier deadline is stored.
    sweeper: Notify,
}

/// String key/value store with per-key expiration.
///
/// Expired keys are never returned: every read compares the stored deadline with the
/// current time. The background sweeper started by [`KeyValueStore::spawn_expiry_sweeper`]
/// only reclaims memory. Overwriting a key drops its pending deadline.
#[derive(Debug, Clone, Default)]
pub struct KeyValueStore {
    shared: Arc<Shared>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &[u8]) -> Option<Bytes> {
        let entries = self.shared.entries.read().await;

        entries
            .values
            .get(key)
            .filter(|value| !value.is_expired(Instant::now()))
            .map(|value| value.data.clone())
    }

    pub async fn set(&self, key: Bytes, data: Bytes, expire: Option<Duration>) {
        let mut entries = self.shared.entries.write().await;
        let expiration = expire.map(|duration| Instant::now() + duration);

        let previous = entries
            .values
            .insert(key.clone(), Value { data, expiration });
        entries.forget_expiration(&key, previous);

        let notify = match expiration {
            Some(when) => {
                let earlier = entries.next_expiration().map_or(true, |next| when < next);
                entries.expirations.insert((when, key));
                earlier
            }
            None => false,
        };

        drop(entries);

        if notify {
            self.shared.sweeper.notify_one();
        }
    }

    pub async fn len(&self) -> usize {
        self.shared.entries.read().await.values.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes every key whose deadline has passed and returns the next pending deadline.
    pub async fn purge_expired_keys(&self) -> Option<Instant> {
        let mut entries = self.shared.entries.write().await;
        let now = Instant::now();
        let mut purged = 0;

        while let Some((when, key)) = entries.expirations.first().cloned() {
            if when > now {
                break;
            }

            entries.expirations.remove(&(when, key.clone()));
            entries.values.remove(&key);
            purged += 1;
        }

        if purged > 0 {
            debug!(purged, "removed expired keys");
        }

        entries.next_expiration()
    }

    /// Spawns the task that deletes keys once their deadline passes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_expiry_sweeper(&self) -> JoinHandle<()> {
        let store = self.clone();

        tokio::spawn(async move {
            loop {
                match store.purge_expired_keys().await {
                    Some(when) => {
                        tokio::select! {
                            _ = time::sleep_until(when) => {}
                            _ = store.shared.sweeper.notified() => {}
                        }
                    }
                    None => store.shared.sweeper.notified().await,
                }
            }
        })
    }
}

/// Hash name -> (field -> value), created lazily on the first HSET of a name.
#[derive(Debug, Clone, Default)]
pub struct HashStore {
    hashes: Arc<RwLock<HashMap<Bytes, HashMap<Bytes, Bytes>>>>,
}

impl HashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, hash: Bytes, field: Bytes, value: Bytes) {
        let mut hashes = self.hashes.write().await;
        hashes.entry(hash).or_default().insert(field, value);
    }

    pub async fn get(&self, hash: &[u8], field: &[u8]) -> Option<Bytes> {
        let hashes = self.hashes.read().await;
        hashes.get(hash).and_then(|fields| fields.get(field)).cloned()
    }

    /// Returns every field/value pair of a hash in unspecified order.
    pub async fn get_all(&self, hash: &[u8]) -> Vec<(Bytes, Bytes)> {
        let hashes = self.hashes.read().await;

        hashes
            .get(hash)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
