//! In-process adapters that live inside the domain crate for convenience.
//!
//! Used by unit tests, the demo CLI and the `memory` storage provider of the
//! api-server. Durable adapters live in separate crates.

pub mod memory_repo;
