//! The storage layer: C1 (local, authoritative blocks), C2 (remote cache),
//! and C3 (the unified facade tying the two together behind one key space).

pub mod facade;
pub mod local;
pub mod remote;
