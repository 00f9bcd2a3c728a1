//! Process-scoped configuration registry.
//!
//! Rather than a lazily-initialized global singleton, this is a plain,
//! explicitly-constructed record passed into every long-lived task at
//! spawn time — no lock is needed after construction because nothing ever
//! mutates it.

use serde::Serialize;

use crate::error::{MeshError, MeshResult};

/// Immutable, process-wide configuration, set once before any component
/// starts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Registry {
    /// This process's rank in `0..world_size`.
    pub world_rank: i32,
    /// Total process count, including the broadcaster.
    pub world_size: i32,
    /// `B`: number of blocks in the logical address space.
    pub num_blocks: i32,
    /// `S`: bytes per block.
    pub block_size: i32,
    /// Run-identifying Unix timestamp, used for the log directory name and
    /// stamped (uninterpreted) into NOTIFICATION frames.
    pub timestamp: i64,
    /// `0` (silent), `1` (info) or `2` (debug).
    pub log_level: u8,
}

impl Registry {
    /// Builds a registry, validating the bounds the CLI contract documents:
    /// `1 <= block_size <= 32`, `num_blocks >= W`, `num_blocks <= 32`,
    /// `log_level in {0,1,2}`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        world_rank: i32,
        world_size: i32,
        num_blocks: i32,
        block_size: i32,
        timestamp: i64,
        log_level: u8,
    ) -> MeshResult<Self> {
        if world_size < 2 {
            return Err(MeshError::ConfigError(
                "world_size deve ser maior ou igual a 2 (pelo menos um worker e um broadcaster)"
                    .to_string(),
            ));
        }
        let registry = Self {
            world_rank,
            world_size,
            num_blocks,
            block_size,
            timestamp,
            log_level,
        };
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> MeshResult<()> {
        if !(1..=32).contains(&self.block_size) {
            return Err(MeshError::ConfigError(
                "Tamanho de bloco de memória deve estar entre 1 e 32".to_string(),
            ));
        }
        if self.num_blocks < self.worker_count() {
            return Err(MeshError::ConfigError(
                "Número de blocos de memória alocados deve ser igual ou maior ao número de \
                 processos trabalhadores"
                    .to_string(),
            ));
        }
        if self.num_blocks > 32 {
            return Err(MeshError::ConfigError(
                "Número de blocos de memória alocados deve ser menor ou igual a 32".to_string(),
            ));
        }
        if self.log_level > 2 {
            return Err(MeshError::ConfigError(
                "Nível de log deve ser 0, 1 ou 2".to_string(),
            ));
        }
        Ok(())
    }

    /// `W = world_size - 1`: the number of workers, i.e. the divisor
    /// `memory_map::owner` uses. The broadcaster rank never maintains a
    /// share of the keyspace, so it is excluded from the worker count.
    pub fn worker_count(&self) -> i32 {
        self.world_size - 1
    }

    /// The rank that serializes and re-emits invalidations.
    pub fn broadcaster_rank(&self) -> i32 {
        self.world_size - 1
    }

    /// Whether this process is the broadcaster rather than a worker.
    pub fn is_broadcaster(&self) -> bool {
        self.world_rank == self.broadcaster_rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(world_rank: i32) -> MeshResult<Registry> {
        Registry::new(world_rank, 3, 4, 8, 1_700_000_000, 1)
    }

    #[test]
    fn worker_count_is_world_size_minus_one() {
        let r = base(0).unwrap();
        assert_eq!(r.worker_count(), 2);
        assert_eq!(r.broadcaster_rank(), 2);
        assert!(!r.is_broadcaster());
        assert!(base(2).unwrap().is_broadcaster());
    }

    #[test]
    fn rejects_block_size_out_of_bounds() {
        assert!(Registry::new(0, 3, 4, 0, 0, 1).is_err());
        assert!(Registry::new(0, 3, 4, 33, 0, 1).is_err());
    }

    #[test]
    fn rejects_num_blocks_below_worker_count() {
        assert!(Registry::new(0, 3, 1, 8, 0, 1).is_err());
    }

    #[test]
    fn rejects_num_blocks_above_32() {
        assert!(Registry::new(0, 3, 33, 8, 0, 1).is_err());
    }

    #[test]
    fn rejects_bad_log_level() {
        assert!(Registry::new(0, 3, 4, 8, 0, 3).is_err());
    }

    #[test]
    fn accepts_minimum_world_size() {
        assert!(Registry::new(0, 2, 1, 8, 0, 1).is_ok());
    }
}
