//! Per-process dual logging: every line goes to stdout and to
//! `log/<timestamp>/proc-<rank>_output.log`, gated by `Registry.log_level`.
//!
//! Grounded on `original_source/.../logger.cpp`'s `ThreadSafeLogger`: one
//! log file per rank under a timestamp-named run directory, written under a
//! single mutex, silent when the configured level is `0`. That type wrote
//! directly to `std::cout` and an `ofstream` from call sites holding a
//! `shared_ptr<ThreadSafeLogger>`; here the same dual-sink behavior is
//! wired in once, at startup, as a [`log::Log`] implementation so the rest
//! of the crate just uses `log::info!`/`log::debug!` like any other crate
//! in this dependency stack (`enterprise::audit::logger` also treats logging
//! as a first-class subsystem rather than scattered `println!`s, though its
//! event-sourced design is overkill for this crate's needs).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

use crate::config::Registry;
use crate::error::{MeshError, MeshResult};

const LOG_DIR: &str = "log";

/// Writes every record to stdout and to this process's run-scoped log file.
pub struct DualLogger {
    rank: i32,
    file: Mutex<File>,
}

impl DualLogger {
    /// Creates `log/<registry.timestamp>/proc-<world_rank>_output.log`
    /// (and any missing parent directories), and installs the logger as the
    /// global `log` facade sink. `registry.log_level` maps to `0 -> Off`,
    /// `1 -> Info`, `2 -> Debug`.
    ///
    /// Call exactly once per process, before any component starts.
    pub fn install(registry: &Registry) -> MeshResult<()> {
        let level = match registry.log_level {
            0 => LevelFilter::Off,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        };

        let dir: PathBuf = [LOG_DIR, &registry.timestamp.to_string()].iter().collect();
        fs::create_dir_all(&dir).map_err(|e| {
            MeshError::ConfigError(format!("falha ao criar diretório de log {}: {e}", dir.display()))
        })?;

        let path = dir.join(format!("proc-{}_output.log", registry.world_rank));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                MeshError::ConfigError(format!("falha ao abrir arquivo de log {}: {e}", path.display()))
            })?;

        let logger = Box::new(DualLogger {
            rank: registry.world_rank,
            file: Mutex::new(file),
        });
        log::set_boxed_logger(logger)
            .map_err(|e| MeshError::ConfigError(format!("logger já instalado: {e}")))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for DualLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] rank {} {} - {}",
            chrono::Utc::now().timestamp(),
            self.rank,
            record.level(),
            record.args()
        );
        println!("{line}");

        let mut file = self.file.lock();
        let _ = writeln!(file, "{line}");
    }

    fn flush(&self) {
        let _ = self.file.lock().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_zero_maps_to_off() {
        // install() touches process-global logger state and the filesystem,
        // so this only checks the pure mapping `DualLogger::install` relies
        // on rather than calling it directly.
        let levels = [(0u8, LevelFilter::Off), (1, LevelFilter::Info), (2, LevelFilter::Debug)];
        for (log_level, expected) in levels {
            let mapped = match log_level {
                0 => LevelFilter::Off,
                1 => LevelFilter::Info,
                _ => LevelFilter::Debug,
            };
            assert_eq!(mapped, expected);
        }
    }
}
