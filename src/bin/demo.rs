//! Runnable end-to-end walkthrough: builds an in-process cluster over
//! [`meshstore::transport::channel::ChannelGroup`], starts every rank's
//! listeners and the broadcaster, drives a handful of `read`/`write` calls
//! from each worker, and prints the resulting state.
//!
//! A real deployment would drive these primitives from a workload generator
//! talking to a live MPI-style cluster; this is the minimal version that
//! keeps the crate runnable end to end without fabricating that binding.
//! Follows the runnable-walkthrough convention CADDY's enterprise demos use,
//! one binary exercising one subsystem top to bottom.

use std::sync::Arc;

use anyhow::Context;
use meshstore::config::Registry;
use meshstore::store::facade::UnifiedStore;
use meshstore::transport::channel::ChannelGroup;
use meshstore::transport::ProcessGroup;
use meshstore::{broadcaster, cli, logging, server};

const WORLD_SIZE: i32 = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let parsed = cli::parse(&args, chrono::Utc::now().timestamp()).context("failed to parse arguments")?;

    let group = ChannelGroup::build(WORLD_SIZE);
    let mut handles = Vec::new();

    for rank in 0..WORLD_SIZE {
        let registry = Registry::new(
            rank,
            WORLD_SIZE,
            parsed.num_blocks,
            parsed.block_size,
            parsed.timestamp,
            parsed.log_level,
        )
        .context("invalid registry configuration")?;

        if rank == 0 {
            logging::DualLogger::install(&registry).ok();
            log::info!(
                "starting with block_size={} num_blocks={} world_size={WORLD_SIZE}",
                registry.block_size,
                registry.num_blocks
            );
        }

        let pg: Arc<dyn ProcessGroup> = Arc::new(group[rank as usize].clone());
        let facade = Arc::new(UnifiedStore::new(registry, pg.clone()));

        if rank == 0 && registry.log_level >= 2 {
            let snapshot = facade.dump().await;
            match serde_json::to_string(&snapshot) {
                Ok(json) => log::debug!("rank 0 initial local store: {json}"),
                Err(e) => log::debug!("rank 0 initial local store (unserializable): {e}"),
            }
        }

        if registry.is_broadcaster() {
            let broadcaster_pg = pg.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = broadcaster::run(broadcaster_pg).await {
                    log::error!("broadcaster aborted: {e}");
                }
            }));
        } else {
            let local_store = facade.local_handle();
            let read_pg = pg.clone();
            let read_store = local_store.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = server::read_listener(read_pg, read_store).await {
                    log::error!("read listener aborted: {e}");
                }
            }));

            let write_pg = pg.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = server::write_listener(write_pg, local_store, registry).await {
                    log::error!("write listener aborted: {e}");
                }
            }));

            let invalidate_pg = pg.clone();
            let invalidate_facade = facade.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = server::invalidate_listener(invalidate_pg, invalidate_facade, registry).await {
                    log::error!("invalidate listener aborted: {e}");
                }
            }));
        }

        // Every rank, worker and broadcaster alike, clears the barrier once
        // its listeners are up, right before the application's main phase
        // begins.
        let barrier_pg = pg.clone();
        let worker_facade = facade.clone();
        let is_broadcaster = registry.is_broadcaster();
        handles.push(tokio::spawn(async move {
            if barrier_pg.barrier().await.is_ok() && !is_broadcaster {
                run_worker(rank, worker_facade, registry.num_blocks, registry.block_size).await;
            }
        }));
    }

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    for handle in handles {
        handle.abort();
    }
    Ok(())
}

async fn run_worker(rank: i32, facade: Arc<UnifiedStore>, num_blocks: i32, block_size: i32) {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let key = rank % num_blocks;
    let payload = vec![rank as u8; block_size as usize];

    match facade.write_block(key, &payload).await {
        Ok(()) => log::info!("rank {rank} wrote key {key}"),
        Err(e) => log::info!("rank {rank} write of key {key} failed: {e}"),
    }

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    match facade.read_block(key).await {
        Ok(bytes) => log::info!("rank {rank} read key {key} back as {bytes:?}"),
        Err(e) => log::info!("rank {rank} read of key {key} failed: {e}"),
    }
}
