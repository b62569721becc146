//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine rules, repository calls and outbound sinks into
//!   use-case level APIs.
//! - Keep callers decoupled from storage details.

pub mod schedule_service;
