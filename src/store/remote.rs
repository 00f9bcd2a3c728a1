//! The remote cache (C2): one entry per key maintained elsewhere.
//!
//! Grounded on `enterprise/cache/tier.rs`'s promotion-on-miss pattern. Each
//! entry gets its own `tokio::sync::Mutex<Option<Vec<u8>>>` rather than one
//! lock shared across the whole cache: holding that lock across the
//! READ-REQ/READ-RESP round trip is what gives every key its own
//! single-flight fetch — a second caller arriving mid-fetch waits on the
//! same lock instead of issuing a duplicate request — while unrelated keys
//! never contend with each other.

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::codec;
use crate::error::{MeshError, MeshResult};
use crate::transport::{ProcessGroup, TAG_READ_REQ, TAG_READ_RESP, TAG_WRITE_REQ};

/// A cache slot for one remote key: `Empty` until the first successful
/// fetch, `Filled` until an invalidation clears it. `Option<Vec<u8>>` keeps
/// that distinction explicit rather than conflating "empty" with a null
/// pointer.
struct RemoteEntry {
    owner: i32,
    slot: Mutex<Option<Vec<u8>>>,
}

/// The per-process cache of blocks maintained by other workers.
pub struct RemoteStore {
    entries: DashMap<i32, RemoteEntry>,
    block_size: usize,
}

impl RemoteStore {
    /// Builds a cache with one Empty entry per `(key, owner)` pair.
    pub fn new(owners: &[(i32, i32)], block_size: usize) -> Self {
        let entries = DashMap::with_capacity(owners.len());
        for &(key, owner) in owners {
            entries.insert(
                key,
                RemoteEntry {
                    owner,
                    slot: Mutex::new(None),
                },
            );
        }
        Self { entries, block_size }
    }

    /// `true` if `key` is cached here (i.e. owned by some other rank).
    pub fn is_remote(&self, key: i32) -> bool {
        self.entries.contains_key(&key)
    }

    /// Returns a copy of `key`'s bytes, fetching from its owner on a cache
    /// miss. At most one fetch for a given key is ever in flight: a second
    /// caller arriving while a fetch is underway waits on the same lock and
    /// then observes the now-Filled slot instead of issuing a second
    /// READ-REQ.
    pub async fn read(&self, key: i32, group: &dyn ProcessGroup) -> MeshResult<Vec<u8>> {
        let entry = self.entries.get(&key).ok_or(MeshError::BadKey(key))?;
        let owner = entry.owner;
        let mut slot = entry.slot.lock().await;

        if let Some(bytes) = slot.as_ref() {
            return Ok(bytes.clone());
        }

        let request = codec::encode_read_request(key);
        group
            .send(TAG_READ_REQ, owner, request)
            .await
            .map_err(|_| MeshError::TransportError(format!("failed to send READ-REQ for key {key}")))?;
        let response = group
            .recv(TAG_READ_RESP, owner)
            .await
            .map_err(|_| MeshError::TransportError(format!("failed to receive READ-RESP for key {key}")))?;
        if response.len() != self.block_size {
            return Err(MeshError::TransportError(format!(
                "READ-RESP for key {key} was {} bytes, expected {}",
                response.len(),
                self.block_size
            )));
        }

        *slot = Some(response.clone());
        Ok(response)
    }

    /// Sends a WRITE-REQ to `key`'s owner without waiting for acknowledgement
    /// and without touching the local cache slot — invalidation arrives
    /// later via broadcast, same as every other non-owner's copy.
    pub async fn write(&self, key: i32, bytes: &[u8], group: &dyn ProcessGroup) -> MeshResult<()> {
        let owner = self.entries.get(&key).ok_or(MeshError::BadKey(key))?.owner;
        let frame = codec::encode_write(key, bytes);
        group
            .send(TAG_WRITE_REQ, owner, frame)
            .await
            .map_err(|_| MeshError::TransportError(format!("failed to send WRITE-REQ for key {key}")))
    }

    /// Sets `key`'s slot to Empty. Idempotent; `BadKey` if `key` is not a
    /// remote key of this store (e.g. it is locally owned — callers should
    /// skip invalidating keys they own themselves before reaching here,
    /// since an owner's own invalidation broadcast is a no-op by
    /// construction).
    pub async fn invalidate(&self, key: i32) -> MeshResult<()> {
        let entry = self.entries.get(&key).ok_or(MeshError::BadKey(key))?;
        *entry.slot.lock().await = None;
        Ok(())
    }

    /// A deep copy of every remote key's slot. Empty slots appear as `None`.
    pub async fn dump(&self) -> HashMap<i32, Option<Vec<u8>>> {
        let mut snapshot = HashMap::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            let bytes = entry.slot.lock().await.clone();
            snapshot.insert(*entry.key(), bytes);
        }
        snapshot
    }
}
