#![deny(unused)]
//! Core types, capability traits, and error definitions for the swarm mission system.
//!
//! This crate provides the building blocks shared by the memory store, the
//! planner/executor controller, and the external capability adapters.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result, SchemaError};
pub use traits::*;
pub use types::*;
