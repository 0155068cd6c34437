//! Repository layer over the embedded key-value capability.
//!
//! # Responsibility
//! - Define the get/put/delete-by-key contract the gateway relies on.
//! - Isolate SQLite query details from snapshot encoding and orchestration.
//!
//! # Invariants
//! - Every call is atomic on its own; no call spans more than one statement.
//! - Keys are non-empty after trimming.

pub mod snapshot_repo;
