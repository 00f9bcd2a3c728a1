//! The broadcaster (C6): rank `W` (`world_size - 1`), the one process that
//! owns no blocks and serves no READ/WRITE traffic.
//!
//! Cache invalidation is routed through this dedicated rank rather than
//! fanned out directly from the write path, so invalidations from every
//! worker pass through one serialization point before fanning back out,
//! giving the group a total order over invalidations without requiring one
//! over writes. This module is that rank's entire job: receive one
//! INVALIDATE notification at a time, then re-emit it to everyone via
//! [`ProcessGroup::broadcast`].

use std::sync::Arc;

use crate::error::MeshResult;
use crate::transport::{ProcessGroup, TAG_INVALIDATE};

/// Runs forever on the broadcaster rank: waits for the next INVALIDATE
/// notification from any worker, then re-emits it as the root of a
/// broadcast collective every worker is blocked on inside
/// [`crate::server::invalidate_listener`].
///
/// Workers queue their own INVALIDATE sends (see `LocalStore::write`) and
/// never call this function themselves — only the rank for which
/// `Registry::is_broadcaster()` is true runs this loop.
pub async fn run(group: Arc<dyn ProcessGroup>) -> MeshResult<()> {
    let root = group.rank();
    log::info!("rank {root} broadcaster started");
    loop {
        let source = loop {
            if let Some(source) = group.iprobe(TAG_INVALIDATE).await? {
                break source;
            }
            tokio::time::sleep(std::time::Duration::from_micros(100)).await;
        };
        let frame = group.recv(TAG_INVALIDATE, source).await?;
        log::debug!("broadcaster relaying invalidation from rank {source}");
        group.broadcast(root, Some(frame)).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::transport::channel::ChannelGroup;

    #[tokio::test]
    async fn relays_one_invalidation_to_every_worker() {
        let group = ChannelGroup::build(3);
        let broadcaster_rank = 2;
        let broadcaster: Arc<dyn ProcessGroup> = Arc::new(group[broadcaster_rank as usize].clone());

        let broadcaster_task = tokio::spawn(async move {
            // Service exactly one relay for this test, rather than looping
            // forever.
            let root = broadcaster.rank();
            let source = loop {
                if let Some(s) = broadcaster.iprobe(TAG_INVALIDATE).await.unwrap() {
                    break s;
                }
            };
            let frame = broadcaster.recv(TAG_INVALIDATE, source).await.unwrap();
            broadcaster.broadcast(root, Some(frame)).await.unwrap()
        });

        let workers: Vec<_> = (0..2)
            .map(|rank| {
                let g = group[rank].clone();
                tokio::spawn(async move { g.broadcast(broadcaster_rank, None).await.unwrap() })
            })
            .collect();

        group[0]
            .send(TAG_INVALIDATE, broadcaster_rank, codec::encode_notification(3, 42))
            .await
            .unwrap();

        let relayed = broadcaster_task.await.unwrap();
        for w in workers {
            assert_eq!(w.await.unwrap(), relayed);
        }
        let (key, timestamp) = codec::decode_notification(&relayed).unwrap();
        assert_eq!(key, 3);
        assert_eq!(timestamp, 42);
    }
}
