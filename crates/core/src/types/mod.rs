//! Core type definitions for the swarm mission system.
//!
//! Broken down into submodules by concern:
//! - `memory`: episodic and semantic memory records
//! - `mission`: plans, tasks and tool results
//! - `agent`: runtime agent state and mission reports

pub mod agent;
pub mod memory;
pub mod mission;

pub use agent::*;
pub use memory::*;
pub use mission::*;
