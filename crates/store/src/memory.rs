//! In-process memory backend.
//!
//! Suitable for tests and throwaway runs; nothing survives the process.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use swarm_core::{
    traits::MemoryBackend,
    types::{Episode, EpisodeDraft, MemoryCounts, Rule, RuleDraft},
    Result,
};

/// Append-only backend holding both collections in vectors.
#[derive(Default)]
pub struct InMemoryMemoryBackend {
    episodes: Arc<RwLock<Vec<Episode>>>,
    rules: Arc<RwLock<Vec<Rule>>>,
}

impl InMemoryMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items.iter().rev().take(limit).cloned().collect()
}

#[async_trait]
impl MemoryBackend for InMemoryMemoryBackend {
    async fn insert_episode(&self, draft: EpisodeDraft, embedding: Vec<f32>, poisoned: bool) -> Result<Episode> {
        let mut episodes = self.episodes.write().await;
        let episode = Episode {
            id: episodes.len() as i64 + 1,
            timestamp: Utc::now(),
            agent_id: draft.agent_id,
            action_type: draft.action_type,
            state: draft.state,
            outcome_text: draft.outcome_text,
            embedding,
            poisoned,
        };
        episodes.push(episode.clone());
        tracing::debug!(id = episode.id, total = episodes.len(), "Episode stored");
        Ok(episode)
    }

    async fn insert_rule(&self, draft: RuleDraft, embedding: Vec<f32>, poisoned: bool) -> Result<Rule> {
        let mut rules = self.rules.write().await;
        let rule = Rule {
            id: rules.len() as i64 + 1,
            rule_text: draft.rule_text,
            rule_type: draft.rule_type,
            location: draft.location,
            confidence: draft.confidence,
            embedding,
            poisoned,
        };
        rules.push(rule.clone());
        tracing::debug!(id = rule.id, total = rules.len(), "Rule stored");
        Ok(rule)
    }

    async fn episodes(&self) -> Result<Vec<Episode>> {
        Ok(self.episodes.read().await.clone())
    }

    async fn rules(&self) -> Result<Vec<Rule>> {
        Ok(self.rules.read().await.clone())
    }

    async fn counts(&self) -> Result<MemoryCounts> {
        let episodes = self.episodes.read().await;
        let rules = self.rules.read().await;
        Ok(MemoryCounts {
            episodes: episodes.len(),
            poisoned_episodes: episodes.iter().filter(|e| e.poisoned).count(),
            rules: rules.len(),
            poisoned_rules: rules.iter().filter(|r| r.poisoned).count(),
        })
    }

    async fn recent_episodes(&self, limit: usize) -> Result<Vec<Episode>> {
        Ok(newest_first(&self.episodes.read().await, limit))
    }

    async fn recent_rules(&self, limit: usize) -> Result<Vec<Rule>> {
        Ok(newest_first(&self.rules.read().await, limit))
    }
}
