//! An in-process reference implementation of [`super::ProcessGroup`] over
//! tokio primitives, simulating `world_size` peers inside a single process.
//!
//! Grounded on `enterprise::cluster::transport::Transport`: that type routes
//! `Envelope`s to an `mpsc::UnboundedSender` per incoming connection and
//! hands a receiver to the caller; this module applies the same "channel
//! per mailbox" idea per `(rank, tag)` pair instead of per TCP connection,
//! and adds a `tokio::sync::broadcast` channel for the INVALIDATE collective.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Barrier, Mutex, Notify};

use crate::error::{MeshError, MeshResult};

use super::ProcessGroup;

type QueueEntry = (i32, Vec<u8>);

struct Mailbox {
    queue: Mutex<VecDeque<QueueEntry>>,
    notify: Notify,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

/// Shared state every rank's [`ChannelGroup`] handle holds a reference to.
struct Shared {
    size: i32,
    /// `mailboxes[rank][tag]`: the inbox for messages tagged `tag`
    /// addressed to `rank`.
    mailboxes: Vec<HashMap<i32, Mailbox>>,
    broadcast_tx: broadcast::Sender<Vec<u8>>,
    barrier: Barrier,
}

/// One rank's handle onto an in-process simulated cluster. Cheap to clone;
/// every handle shares the same [`Shared`] state and one dedicated
/// broadcast subscription.
#[derive(Clone)]
pub struct ChannelGroup {
    rank: i32,
    shared: Arc<Shared>,
    broadcast_rx: Arc<Mutex<broadcast::Receiver<Vec<u8>>>>,
}

/// Every tag the engine actually uses; mailboxes are pre-created for all of
/// them on every rank so `send`/`recv` never need to lazily insert under a
/// write lock.
const KNOWN_TAGS: [i32; 4] = [
    super::TAG_READ_REQ,
    super::TAG_READ_RESP,
    super::TAG_WRITE_REQ,
    super::TAG_INVALIDATE,
];

impl ChannelGroup {
    /// Builds a simulated cluster of `world_size` ranks, returning one
    /// handle per rank, ordered by rank.
    pub fn build(world_size: i32) -> Vec<ChannelGroup> {
        assert!(world_size >= 2, "need at least one worker and a broadcaster");

        let mailboxes = (0..world_size)
            .map(|_| KNOWN_TAGS.iter().map(|&tag| (tag, Mailbox::new())).collect())
            .collect();

        let (broadcast_tx, _) = broadcast::channel(1024);
        let shared = Arc::new(Shared {
            size: world_size,
            mailboxes,
            broadcast_tx,
            barrier: Barrier::new(world_size as usize),
        });

        (0..world_size)
            .map(|rank| ChannelGroup {
                rank,
                shared: shared.clone(),
                broadcast_rx: Arc::new(Mutex::new(shared.broadcast_tx.subscribe())),
            })
            .collect()
    }
}

#[async_trait]
impl ProcessGroup for ChannelGroup {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn size(&self) -> i32 {
        self.shared.size
    }

    async fn send(&self, tag: i32, dest: i32, bytes: Vec<u8>) -> MeshResult<()> {
        let mailbox = self
            .shared
            .mailboxes
            .get(dest as usize)
            .and_then(|by_tag| by_tag.get(&tag))
            .ok_or_else(|| {
                MeshError::TransportError(format!("no mailbox for rank {dest} tag {tag}"))
            })?;
        mailbox.queue.lock().await.push_back((self.rank, bytes));
        mailbox.notify.notify_one();
        Ok(())
    }

    async fn recv(&self, tag: i32, source: i32) -> MeshResult<Vec<u8>> {
        let mailbox = self
            .shared
            .mailboxes
            .get(self.rank as usize)
            .and_then(|by_tag| by_tag.get(&tag))
            .ok_or_else(|| {
                MeshError::TransportError(format!("no mailbox for rank {} tag {tag}", self.rank))
            })?;

        loop {
            {
                let mut queue = mailbox.queue.lock().await;
                if let Some(pos) = queue.iter().position(|(src, _)| *src == source) {
                    let (_, bytes) = queue.remove(pos).expect("position just found");
                    return Ok(bytes);
                }
            }
            mailbox.notify.notified().await;
        }
    }

    async fn iprobe(&self, tag: i32) -> MeshResult<Option<i32>> {
        let mailbox = self
            .shared
            .mailboxes
            .get(self.rank as usize)
            .and_then(|by_tag| by_tag.get(&tag))
            .ok_or_else(|| {
                MeshError::TransportError(format!("no mailbox for rank {} tag {tag}", self.rank))
            })?;
        let queue = mailbox.queue.lock().await;
        Ok(queue.front().map(|(src, _)| *src))
    }

    async fn broadcast(&self, root: i32, payload: Option<Vec<u8>>) -> MeshResult<Vec<u8>> {
        if self.rank == root {
            let bytes = payload.ok_or_else(|| {
                MeshError::TransportError("broadcast root must supply a payload".to_string())
            })?;
            self.shared
                .broadcast_tx
                .send(bytes.clone())
                .map_err(|e| MeshError::TransportError(e.to_string()))?;
            Ok(bytes)
        } else {
            let mut rx = self.broadcast_rx.lock().await;
            loop {
                match rx.recv().await {
                    Ok(bytes) => return Ok(bytes),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => return Err(MeshError::TransportError(e.to_string())),
                }
            }
        }
    }

    async fn barrier(&self) -> MeshResult<()> {
        self.shared.barrier.wait().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn point_to_point_round_trips() {
        let group = ChannelGroup::build(2);
        let (a, b) = (group[0].clone(), group[1].clone());

        a.send(super::super::TAG_READ_REQ, 1, vec![1, 2, 3])
            .await
            .unwrap();

        let source = b
            .iprobe(super::super::TAG_READ_REQ)
            .await
            .unwrap()
            .expect("message should be queued");
        assert_eq!(source, 0);

        let bytes = b.recv(super::super::TAG_READ_REQ, source).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn iprobe_is_empty_with_nothing_queued() {
        let group = ChannelGroup::build(2);
        assert_eq!(group[1].iprobe(super::super::TAG_READ_REQ).await.unwrap(), None);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_non_root_rank() {
        let group = ChannelGroup::build(3);
        let root = 2;

        let workers = (0..2).map(|i| {
            let g = group[i].clone();
            tokio::spawn(async move { g.broadcast(root, None).await.unwrap() })
        });

        let root_fut = group[root as usize].broadcast(root, Some(vec![9, 9]));
        let (root_result, worker_results) = tokio::join!(
            root_fut,
            futures::future::join_all(workers)
        );

        assert_eq!(root_result.unwrap(), vec![9, 9]);
        for r in worker_results {
            assert_eq!(r.unwrap(), vec![9, 9]);
        }
    }

    #[tokio::test]
    async fn barrier_releases_all_ranks() {
        let group = ChannelGroup::build(3);
        let handles: Vec<_> = group
            .iter()
            .cloned()
            .map(|g| tokio::spawn(async move { g.barrier().await.unwrap() }))
            .collect();
        for h in handles {
            h.await.unwrap();
        }
    }
}
