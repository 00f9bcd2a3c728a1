//! A distributed shared-memory engine: `B` fixed-size blocks statically
//! partitioned round-robin across `W` worker processes, with a dedicated
//! broadcaster rank serializing cache invalidations so every worker's
//! remote-read cache stays coherent without serializing writes themselves.
//!
//! See [`store::facade::UnifiedStore`] for the entry point most callers
//! want, [`transport::ProcessGroup`] for the messaging substrate this crate
//! assumes rather than ships a production implementation of, and
//! [`transport::channel::ChannelGroup`] for the in-process reference
//! implementation used by the demo binary and test suite.

pub mod broadcaster;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory_map;
pub mod server;
pub mod store;
pub mod transport;

pub use config::Registry;
pub use error::{MeshError, MeshResult};
pub use store::facade::UnifiedStore;
pub use transport::ProcessGroup;
