//! Capability traits for the swarm mission system.
//!
//! Traits are organized by the collaborator they abstract:
//! - `llm`: reasoning capability (structured completion, embeddings)
//! - `actuation`: vehicle control (connect, takeoff, goto, land)
//! - `store`: persistence backend of the vector memory
//! - `log`: injected mission log

pub mod actuation;
pub mod llm;
pub mod log;
pub mod store;

pub use actuation::*;
pub use llm::*;
pub use log::*;
pub use store::*;
