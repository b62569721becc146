//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record and its closed-variant fields.
//! - Keep persisted string forms out of the domain types.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Priority rank is derived, never stored independently.

pub mod task;
