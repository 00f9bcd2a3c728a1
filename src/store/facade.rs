//! The unified facade (C3): routes a key to the local store or the remote
//! cache, and exposes the engine's public `read`/`write` primitives.
//!
//! Routing is a tagged variant (`Owner::Local` / `Owner::Remote`) indexed by
//! key rather than a dynamic dispatch over a shared repository interface,
//! and the facade owns both stores outright — the route table holds
//! discriminants, never pointers into the stores it routes between.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Registry;
use crate::error::{MeshError, MeshResult};
use crate::memory_map;
use crate::transport::ProcessGroup;

use super::local::LocalStore;
use super::remote::RemoteStore;

/// Which store maintains a given key, for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// This process is the maintainer; route to `LocalStore`.
    Local,
    /// Some other rank is the maintainer; route to `RemoteStore`.
    Remote,
}

/// A single store spanning the whole `[0, num_blocks)` key space, backed by
/// one `LocalStore` and one `RemoteStore`.
pub struct UnifiedStore {
    local: Arc<LocalStore>,
    remote: RemoteStore,
    routes: Vec<Owner>,
    registry: Registry,
    group: Arc<dyn ProcessGroup>,
}

impl UnifiedStore {
    /// Builds the facade for `registry.world_rank`, partitioning
    /// `[0, num_blocks)` by `memory_map::owner` computed against
    /// `registry.worker_count()`.
    pub fn new(registry: Registry, group: Arc<dyn ProcessGroup>) -> Self {
        let w = registry.worker_count();
        let block_size = registry.block_size as usize;

        let owned: Vec<i32> = memory_map::owned_keys(registry.world_rank, registry.num_blocks, w);
        let local = Arc::new(LocalStore::new(&owned, block_size));

        let remote_owners: Vec<(i32, i32)> = (0..registry.num_blocks)
            .filter_map(|k| {
                let owner = memory_map::owner(k, w);
                (owner != registry.world_rank).then_some((k, owner))
            })
            .collect();
        let remote = RemoteStore::new(&remote_owners, block_size);

        let routes = (0..registry.num_blocks)
            .map(|k| {
                if memory_map::owner(k, w) == registry.world_rank {
                    Owner::Local
                } else {
                    Owner::Remote
                }
            })
            .collect();

        Self {
            local,
            remote,
            routes,
            registry,
            group,
        }
    }

    fn route(&self, key: i32) -> MeshResult<Owner> {
        self.routes.get(key as usize).copied().ok_or(MeshError::BadKey(key))
    }

    /// `true` if this process maintains `key`.
    pub fn owns_locally(&self, key: i32) -> bool {
        matches!(self.route(key), Ok(Owner::Local))
    }

    /// The same `LocalStore` this facade delegates local reads/writes to.
    /// The READ and WRITE listeners need this handle so they operate on
    /// the process's one authoritative copy rather than a second, diverging
    /// store — see `src/bin/demo.rs` for how it's wired up alongside the
    /// facade at startup.
    pub fn local_handle(&self) -> Arc<LocalStore> {
        self.local.clone()
    }

    /// Reads a single block by key, dispatching to whichever store
    /// maintains it.
    pub async fn read_block(&self, key: i32) -> MeshResult<Vec<u8>> {
        match self.route(key)? {
            Owner::Local => self.local.read(key),
            Owner::Remote => self.remote.read(key, &self.group).await,
        }
    }

    /// Writes a single block by key, dispatching to whichever store
    /// maintains it.
    pub async fn write_block(&self, key: i32, bytes: &[u8]) -> MeshResult<()> {
        match self.route(key)? {
            Owner::Local => self.local.write(key, bytes, &self.registry, &self.group).await,
            Owner::Remote => self.remote.write(key, bytes, &self.group).await,
        }
    }

    /// Invalidates the cache slot for `key`. Only valid for a key this
    /// process does *not* maintain.
    pub async fn invalidate(&self, key: i32) -> MeshResult<()> {
        match self.route(key)? {
            Owner::Local => Err(MeshError::BadKey(key)),
            Owner::Remote => self.remote.invalidate(key).await,
        }
    }

    /// Merges both stores' snapshots into one map covering `[0, num_blocks)`.
    /// Locally-owned keys appear as `Some(bytes)`; remote keys as whatever
    /// their cache slot currently holds.
    pub async fn dump(&self) -> HashMap<i32, Option<Vec<u8>>> {
        let mut snapshot: HashMap<i32, Option<Vec<u8>>> = self
            .local
            .dump()
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();
        snapshot.extend(self.remote.dump().await);
        snapshot
    }

    /// `write(position, buf, size)`: computes `n = size / block_size`
    /// covered blocks and writes each one. `size` must be an exact multiple
    /// of `block_size`; a partial trailing block would otherwise have to
    /// either read past the end of `buf` or silently zero-pad, so this is
    /// enforced up front by returning [`MeshError::OutOfRange`] instead of
    /// guessing at the caller's intent.
    pub async fn write(&self, position: i32, buf: &[u8], size: usize) -> MeshResult<()> {
        let block_size = self.registry.block_size as usize;
        if size % block_size != 0 {
            return Err(MeshError::OutOfRange);
        }
        let n = (size / block_size) as i32;
        if position < 0 || position + n > self.registry.num_blocks {
            return Err(MeshError::OutOfRange);
        }
        for i in 0..n {
            let start = (i as usize) * block_size;
            let end = start + block_size;
            self.write_block(position + i, &buf[start..end]).await?;
        }
        Ok(())
    }

    /// `read(position, buf, size)`: symmetric with [`Self::write`].
    pub async fn read(&self, position: i32, buf: &mut [u8], size: usize) -> MeshResult<()> {
        let block_size = self.registry.block_size as usize;
        if size % block_size != 0 {
            return Err(MeshError::OutOfRange);
        }
        let n = (size / block_size) as i32;
        if position < 0 || position + n > self.registry.num_blocks {
            return Err(MeshError::OutOfRange);
        }
        for i in 0..n {
            let bytes = self.read_block(position + i).await?;
            let start = (i as usize) * block_size;
            buf[start..start + block_size].copy_from_slice(&bytes);
        }
        Ok(())
    }
}
