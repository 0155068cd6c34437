//! Task-board domain model.
//!
//! # Responsibility
//! - Define boards, lists and tasks plus their create/patch inputs.
//! - Define the whole-state `Snapshot` and its persisted codec.
//!
//! # Invariants
//! - Every entity is identified by a generated `Uuid` that is never reused.
//! - `created_at` never changes after construction; `updated_at` moves only
//!   when that entity itself is mutated.

pub mod board;
pub mod snapshot;
pub mod task;
