//! Vector-similarity memory store.
//!
//! Holds episodic outcomes and semantic rules behind a pluggable backend and
//! ranks them by cosine similarity with a linear scan. There is no index;
//! the fleet's memory stays small enough for a full scan per query.

use std::cmp::Ordering;
use std::sync::Arc;

use swarm_core::{
    config::MemoryConfig,
    traits::{MemoryBackend, ReasoningClient},
    types::{
        Episode, EpisodeDraft, MemoryCounts, MemoryHit, MemoryKind, MemoryRecord, MemorySnapshot,
        NewRecord, Rule, RuleDraft,
    },
    Result,
};

/// Calculate cosine similarity between two vectors.
///
/// Returns `None` when the similarity is undefined: mismatched or empty
/// vectors, or either side with zero norm.
pub fn cosine_similarity(v1: &[f32], v2: &[f32]) -> Option<f32> {
    if v1.len() != v2.len() || v1.is_empty() {
        return None;
    }

    let dot_product: f32 = v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum();
    let magnitude1: f32 = v1.iter().map(|a| a * a).sum::<f32>().sqrt();
    let magnitude2: f32 = v2.iter().map(|a| a * a).sum::<f32>().sqrt();

    if magnitude1 == 0.0 || magnitude2 == 0.0 {
        return None;
    }

    let similarity = dot_product / (magnitude1 * magnitude2);
    similarity.is_finite().then_some(similarity)
}

/// Rank records against a query: similarity descending, newest first on ties, at most `k`.
///
/// Records whose similarity is undefined are dropped rather than scored zero.
pub fn rank(query: &[f32], records: Vec<MemoryRecord>, k: usize) -> Vec<MemoryHit> {
    let mut hits: Vec<MemoryHit> = records
        .into_iter()
        .filter_map(|record| {
            cosine_similarity(query, record.embedding()).map(|similarity| MemoryHit { record, similarity })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.record.id().cmp(&a.record.id()))
    });
    hits.truncate(k);
    hits
}

/// Shared memory of the fleet: episodic outcomes plus semantic rules.
///
/// The store records provenance (the poisoned flag) but applies no trust
/// policy; deciding what to believe is the planner's job.
pub struct VectorMemoryStore {
    backend: Arc<dyn MemoryBackend>,
    reasoning: Arc<dyn ReasoningClient>,
    embedding_dim: usize,
}

impl VectorMemoryStore {
    /// Create a store over a backend, embedding through `reasoning`.
    pub fn new(backend: Arc<dyn MemoryBackend>, reasoning: Arc<dyn ReasoningClient>, embedding_dim: usize) -> Self {
        Self {
            backend,
            reasoning,
            embedding_dim,
        }
    }

    pub fn from_config(
        backend: Arc<dyn MemoryBackend>,
        reasoning: Arc<dyn ReasoningClient>,
        config: &MemoryConfig,
    ) -> Self {
        Self::new(backend, reasoning, config.embedding_dim)
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Embed text. Never fails: a failed request degrades to a zero vector,
    /// which similarity search treats as irrelevant.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        match self.reasoning.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "Embedding failed, substituting zero vector");
                vec![0.0; self.embedding_dim]
            }
        }
    }

    /// Append a record with a precomputed embedding.
    pub async fn insert(&self, record: NewRecord, embedding: Vec<f32>, poisoned: bool) -> Result<MemoryRecord> {
        match record {
            NewRecord::Episode(draft) => self
                .backend
                .insert_episode(draft, embedding, poisoned)
                .await
                .map(MemoryRecord::Episode),
            NewRecord::Rule(draft) => self
                .backend
                .insert_rule(draft, embedding, poisoned)
                .await
                .map(MemoryRecord::Rule),
        }
    }

    /// Embed and store an episode.
    pub async fn log_experience(&self, draft: EpisodeDraft, poisoned: bool) -> Result<Episode> {
        let embedding = self.embed(&draft.embedding_text()).await;
        let agent_id = draft.agent_id;
        let episode = self.backend.insert_episode(draft, embedding, poisoned).await?;

        let tag = if poisoned { "[POISON]" } else { "[Memory]" };
        tracing::info!(agent_id, episode_id = episode.id, "{} Logged episode", tag);
        Ok(episode)
    }

    /// Embed and store a semantic rule.
    pub async fn add_rule(&self, draft: RuleDraft, poisoned: bool) -> Result<Rule> {
        let embedding = self.embed(&draft.rule_text).await;
        let rule = self.backend.insert_rule(draft, embedding, poisoned).await?;

        let tag = if poisoned { "[POISON_RULE]" } else { "[Rule]" };
        tracing::info!(rule_id = rule.id, rule_type = %rule.rule_type, "{} Added semantic rule: {}", tag, rule.rule_text);
        Ok(rule)
    }

    /// Top `k` records of one kind by cosine similarity to `query`.
    pub async fn similar(&self, query: &[f32], kind: MemoryKind, k: usize) -> Result<Vec<MemoryHit>> {
        let records: Vec<MemoryRecord> = match kind {
            MemoryKind::Episodic => self
                .backend
                .episodes()
                .await?
                .into_iter()
                .map(MemoryRecord::Episode)
                .collect(),
            MemoryKind::Semantic => self
                .backend
                .rules()
                .await?
                .into_iter()
                .map(MemoryRecord::Rule)
                .collect(),
        };

        let scanned = records.len();
        let hits = rank(query, records, k);
        tracing::debug!(?kind, scanned, returned = hits.len(), "Similarity search");
        Ok(hits)
    }

    pub async fn counts(&self) -> Result<MemoryCounts> {
        self.backend.counts().await
    }

    /// The `n` most recent episodes and rules, newest first.
    pub async fn recent(&self, n: usize) -> Result<MemorySnapshot> {
        Ok(MemorySnapshot {
            episodes: self.backend.recent_episodes(n).await?,
            rules: self.backend.recent_rules(n).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMemoryBackend;
    use swarm_core::mocks::{FailingBackend, MockReasoning};
    use swarm_core::types::{ActionType, RuleLocation, RuleType};

    fn store_with(reasoning: MockReasoning) -> VectorMemoryStore {
        VectorMemoryStore::new(Arc::new(InMemoryMemoryBackend::new()), Arc::new(reasoning), 3)
    }

    fn episode(agent_id: u32, outcome: &str) -> NewRecord {
        NewRecord::Episode(EpisodeDraft::new(agent_id, ActionType::Move, outcome))
    }

    #[test]
    fn test_cosine_similarity_undefined_cases() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[], &[]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]), Some(1.0));
    }

    #[tokio::test]
    async fn test_similar_ranks_and_truncates() {
        let store = store_with(MockReasoning::unavailable());
        store.insert(episode(1, "east"), vec![1.0, 0.0, 0.0], false).await.unwrap();
        store.insert(episode(1, "north"), vec![0.0, 1.0, 0.0], false).await.unwrap();
        store.insert(episode(2, "north-east"), vec![0.7, 0.7, 0.0], false).await.unwrap();
        store.insert(episode(2, "zero"), vec![0.0, 0.0, 0.0], false).await.unwrap();

        let hits = store.similar(&[0.9, 0.1, 0.0], MemoryKind::Episodic, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text(), "east");
        assert_eq!(hits[1].text(), "north-east");

        let all = store.similar(&[0.9, 0.1, 0.0], MemoryKind::Episodic, 10).await.unwrap();
        assert_eq!(all.len(), 3, "zero-norm vector must be excluded");
        assert!(all.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert!(all.iter().all(|h| h.text() != "zero"));
    }

    #[tokio::test]
    async fn test_ties_prefer_most_recent() {
        let store = store_with(MockReasoning::unavailable());
        store.insert(episode(1, "older"), vec![1.0, 0.0, 0.0], false).await.unwrap();
        store.insert(episode(1, "newer"), vec![1.0, 0.0, 0.0], false).await.unwrap();

        let hits = store.similar(&[1.0, 0.0, 0.0], MemoryKind::Episodic, 2).await.unwrap();
        assert_eq!(hits[0].text(), "newer");
        assert_eq!(hits[1].text(), "older");
    }

    #[tokio::test]
    async fn test_zero_query_yields_no_hits() {
        let store = store_with(MockReasoning::unavailable());
        store.insert(episode(1, "east"), vec![1.0, 0.0, 0.0], false).await.unwrap();

        let hits = store.similar(&[0.0, 0.0, 0.0], MemoryKind::Episodic, 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_embed_failure_degrades_to_zero_vector() {
        let store = store_with(MockReasoning::unavailable().with_failing_embeddings());
        assert_eq!(store.embed("anything").await, vec![0.0; 3]);

        // The episode is still written, it just never ranks.
        let ep = store
            .log_experience(EpisodeDraft::new(1, ActionType::Scan, "Scan completed."), false)
            .await
            .unwrap();
        assert_eq!(ep.embedding, vec![0.0; 3]);
        assert_eq!(store.counts().await.unwrap().episodes, 1);
        assert!(store.similar(&[1.0, 0.0, 0.0], MemoryKind::Episodic, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poisoned_rule_keeps_flag() {
        let store = store_with(MockReasoning::unavailable().with_embedder(|_| vec![0.0, 1.0, 0.0]));
        let location = RuleLocation { lat: 47.4, lon: 8.55, radius: 50.0 };
        store
            .add_rule(RuleDraft::new("Hazard: jamming near 47.4,8.55", RuleType::Hazard, location, 0.6), true)
            .await
            .unwrap();
        store
            .add_rule(RuleDraft::new("Wind drains batteries", RuleType::Energy, location, 0.4), false)
            .await
            .unwrap();

        let hits = store.similar(&[0.0, 1.0, 0.0], MemoryKind::Semantic, 3).await.unwrap();
        assert_eq!(hits.len(), 2);
        let poisoned: Vec<_> = hits.iter().filter(|h| h.poisoned()).collect();
        assert_eq!(poisoned.len(), 1);
        assert!(poisoned[0].text().starts_with("Hazard"));

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.rules, 2);
        assert_eq!(counts.poisoned_rules, 1);
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_for_that_call() {
        let store = VectorMemoryStore::new(Arc::new(FailingBackend), Arc::new(MockReasoning::unavailable()), 3);
        assert!(store.insert(episode(1, "x"), vec![1.0, 0.0, 0.0], false).await.is_err());
        assert!(store.similar(&[1.0, 0.0, 0.0], MemoryKind::Semantic, 3).await.is_err());
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let store = store_with(MockReasoning::unavailable());
        for outcome in ["a", "b", "c"] {
            store.insert(episode(1, outcome), vec![1.0, 0.0, 0.0], false).await.unwrap();
        }
        let snapshot = store.recent(2).await.unwrap();
        let outcomes: Vec<_> = snapshot.episodes.iter().map(|e| e.outcome_text.as_str()).collect();
        assert_eq!(outcomes, vec!["c", "b"]);
        assert!(snapshot.rules.is_empty());
    }
}
