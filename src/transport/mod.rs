//! The process-group substrate.
//!
//! The messaging substrate itself — a process-group library offering tagged
//! point-to-point send/receive, a non-blocking probe, a broadcast primitive,
//! and a thread-safety level permitting concurrent sends/receives from
//! multiple threads — is assumed rather than built from scratch here.
//! [`ProcessGroup`] is that assumed interface. [`channel::ChannelGroup`]
//! is the one concrete implementation this crate ships — an in-process
//! simulation used by the demo binary and the test suite, grounded on
//! `enterprise::cluster::transport::Transport`'s envelope-over-channels
//! design. A real multi-host deployment would add a second implementation
//! (TCP, the way `enterprise::cluster::transport::Transport` does it for
//! Raft messages) without touching `store`, `server`, or `broadcaster`.

pub mod channel;

use async_trait::async_trait;

use crate::error::MeshResult;

/// READ request: a single `i32` key, sent to the owner.
pub const TAG_READ_REQ: i32 = 100;
/// READ response: exactly `S` bytes, sent back to the requester.
pub const TAG_READ_RESP: i32 = 101;
/// WRITE request: `[key: i32][payload: S bytes]`, sent to the owner.
pub const TAG_WRITE_REQ: i32 = 102;
/// INVALIDATE: `[key: i32][timestamp: i64]`, sent to the broadcaster by a
/// worker, and re-emitted by the broadcaster to every worker via
/// [`ProcessGroup::broadcast`].
pub const TAG_INVALIDATE: i32 = 103;

/// Tagged point-to-point send/receive, non-blocking probe, and a broadcast
/// collective, over a fixed set of `size()` ranks.
///
/// Implementations must tolerate concurrent calls from multiple tasks/threads
/// — every method takes `&self`, never `&mut self`.
#[async_trait]
pub trait ProcessGroup: Send + Sync {
    /// This process's rank in `0..size()`.
    fn rank(&self) -> i32;

    /// Total number of ranks in the group.
    fn size(&self) -> i32;

    /// Sends `bytes` to `dest` tagged `tag`. May block.
    async fn send(&self, tag: i32, dest: i32, bytes: Vec<u8>) -> MeshResult<()>;

    /// Blocks until a message tagged `tag` from `source` is available, then
    /// returns its bytes. Pairs with [`Self::iprobe`], which identifies
    /// `source` without blocking.
    async fn recv(&self, tag: i32, source: i32) -> MeshResult<Vec<u8>>;

    /// Non-blocking: returns the source rank of a pending message tagged
    /// `tag` from any source, or `None` if none is queued right now. Never
    /// blocks and never consumes the message — a matching [`Self::recv`]
    /// call does that.
    async fn iprobe(&self, tag: i32) -> MeshResult<Option<i32>>;

    /// Collective broadcast rooted at `root`. Every rank in the group calls
    /// this with the same `root`; the rank that *is* `root` passes
    /// `Some(payload)` and gets it back; every other rank passes `None` and
    /// receives the root's payload, blocking until it arrives.
    async fn broadcast(&self, root: i32, payload: Option<Vec<u8>>) -> MeshResult<Vec<u8>>;

    /// Collective barrier: blocks until every rank in the group has called
    /// it. Called once during startup, after listener tasks are launched
    /// and before the application loop enters its main phase.
    async fn barrier(&self) -> MeshResult<()>;
}
