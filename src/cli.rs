//! Hand-rolled `argv` parsing for the four knobs a process needs beyond its
//! rank and the world size, which come from the process group instead.
//!
//! Grounded on `original_source/.../utils.hpp`'s `capture_args`/
//! `validate_args`: positional arguments, independently defaulted, verbose
//! echo of what was used vs. defaulted, Portuguese diagnostics on a bad
//! value. The source only ever parsed two fixed arities (`argc == 2` or
//! `argc == 3`); this accepts anywhere from zero to four positional
//! arguments, each defaulted independently rather than all-or-nothing.

use crate::error::{MeshError, MeshResult};

/// The four process-local knobs read from `argv`, in positional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CliArgs {
    pub log_level: u8,
    pub timestamp: i64,
    pub block_size: i32,
    pub num_blocks: i32,
}

const DEFAULT_LOG_LEVEL: u8 = 1;
const DEFAULT_BLOCK_SIZE: i32 = 8;
const DEFAULT_NUM_BLOCKS: i32 = 4;

/// Parses up to four positional arguments, in order: `log_level`,
/// `timestamp_tag`, `block_size`, `num_blocks`. `args` excludes argv[0].
/// `now` supplies the default `timestamp_tag` when fewer than two arguments
/// are given (`chrono::Utc::now().timestamp()` at the call site — kept out
/// of this function so it stays pure and testable).
pub fn parse(args: &[String], now: i64) -> MeshResult<CliArgs> {
    let log_level = match args.first() {
        Some(s) => parse_field(s, "nível de log")?,
        None => DEFAULT_LOG_LEVEL,
    };
    let timestamp = match args.get(1) {
        Some(s) => parse_field(s, "timestamp")?,
        None => now,
    };
    let block_size = match args.get(2) {
        Some(s) => parse_field(s, "tamanho de bloco")?,
        None => DEFAULT_BLOCK_SIZE,
    };
    let num_blocks = match args.get(3) {
        Some(s) => parse_field(s, "número de blocos")?,
        None => DEFAULT_NUM_BLOCKS,
    };

    Ok(CliArgs {
        log_level,
        timestamp,
        block_size,
        num_blocks,
    })
}

fn parse_field<T: std::str::FromStr>(raw: &str, label: &str) -> MeshResult<T> {
    raw.parse()
        .map_err(|_| MeshError::ConfigError(format!("valor inválido para {label}: {raw:?}")))
}
