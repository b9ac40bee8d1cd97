#![deny(unused)]
//! Observability for swarm missions.
//!
//! This crate provides:
//! - Subscriber setup (plain or JSON output, optional OTLP export)
//! - The tracing-backed mission log used by the binary

pub mod mission_log;
pub mod tracing_layer;

pub use mission_log::TracingMissionLog;
pub use tracing_layer::configure_tracing;
