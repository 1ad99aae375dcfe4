//! Provenance: run journal and BLAKE3 plan digests.

pub mod eventlog;
pub mod hasher;
