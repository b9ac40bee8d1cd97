//! Memory persistence traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Episode, EpisodeDraft, MemoryCounts, Rule, RuleDraft};

/// Persistence backend of the vector memory store.
///
/// Implementations serialize writes themselves; reads may run alongside them.
/// Records are append-only: nothing ever rewrites or clears a stored record.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Append an episode and return it with its assigned id and timestamp.
    async fn insert_episode(&self, draft: EpisodeDraft, embedding: Vec<f32>, poisoned: bool) -> Result<Episode>;

    /// Append a rule and return it with its assigned id.
    async fn insert_rule(&self, draft: RuleDraft, embedding: Vec<f32>, poisoned: bool) -> Result<Rule>;

    /// Every stored episode in insertion order.
    async fn episodes(&self) -> Result<Vec<Episode>>;

    /// Every stored rule in insertion order.
    async fn rules(&self) -> Result<Vec<Rule>>;

    /// Aggregate counts.
    async fn counts(&self) -> Result<MemoryCounts>;

    /// The `limit` most recent episodes, newest first.
    async fn recent_episodes(&self, limit: usize) -> Result<Vec<Episode>>;

    /// The `limit` most recent rules, newest first.
    async fn recent_rules(&self, limit: usize) -> Result<Vec<Rule>>;
}
