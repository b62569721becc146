//! Pure scheduling rules.
//!
//! # Responsibility
//! - Keep priority, ordering, status and day-bucket rules free of storage.
//! - Operate on in-memory task snapshots handed in by the service layer.
//!
//! # Invariants
//! - Engine functions never read the wall clock; "now" is a parameter.
//! - Engine functions never persist; callers save the returned changes.

pub mod day_buckets;
pub mod ordering;
pub mod priority;
pub mod status;
