//! Outbound sync collaborators.
//!
//! # Responsibility
//! - Define injectable sinks that mirror task state outside the store.
//!
//! # Invariants
//! - Sinks are passed to the service; there is no process-wide client.

pub mod calendar_sink;
