#![deny(unused)]
//! Shared fleet memory.
//!
//! Episodic outcomes and semantic rules, each carrying an embedding and a
//! poisoned flag, ranked by cosine similarity. Backends are swappable: SQLite
//! for persistence across runs, in-process vectors for tests.

pub mod injector;
pub mod memory;
pub mod sqlite;
pub mod vector;

use std::sync::Arc;

use swarm_core::{config::MemoryConfig, traits::MemoryBackend, Result};

pub use injector::AdversarialInjector;
pub use memory::InMemoryMemoryBackend;
pub use sqlite::SqliteMemoryBackend;
pub use vector::{cosine_similarity, VectorMemoryStore};

/// Build the backend selected by configuration.
pub fn backend_from_config(config: &MemoryConfig) -> Result<Arc<dyn MemoryBackend>> {
    if config.in_memory {
        tracing::info!("Using in-process memory backend");
        Ok(Arc::new(InMemoryMemoryBackend::new()))
    } else {
        Ok(Arc::new(SqliteMemoryBackend::open(&config.database_path)?))
    }
}
