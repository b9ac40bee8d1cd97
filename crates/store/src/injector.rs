//! Adversarial memory injection for poisoning experiments.
//!
//! Injected records go through the normal write path and are stored with
//! `poisoned = true` unless a control record is asked for.

use std::sync::Arc;

use swarm_core::{
    types::{Episode, EpisodeDraft, Rule, RuleDraft},
    Result,
};

use crate::vector::VectorMemoryStore;

/// Writes deliberately misleading memories into a store.
pub struct AdversarialInjector {
    store: Arc<VectorMemoryStore>,
}

impl AdversarialInjector {
    pub fn new(store: Arc<VectorMemoryStore>) -> Self {
        Self { store }
    }

    /// Store a fabricated episode, flagged as poisoned.
    pub async fn inject_episode(&self, draft: EpisodeDraft) -> Result<Episode> {
        self.inject_episode_with_flag(draft, true).await
    }

    /// Store a fabricated episode. `poisoned = false` writes a control record.
    pub async fn inject_episode_with_flag(&self, draft: EpisodeDraft, poisoned: bool) -> Result<Episode> {
        tracing::warn!(agent_id = draft.agent_id, outcome = %draft.outcome_text, poisoned, "Injecting episode");
        self.store.log_experience(draft, poisoned).await
    }

    /// Store a fabricated rule, flagged as poisoned.
    pub async fn inject_rule(&self, draft: RuleDraft) -> Result<Rule> {
        self.inject_rule_with_flag(draft, true).await
    }

    /// Store a fabricated rule. `poisoned = false` writes a control record.
    pub async fn inject_rule_with_flag(&self, draft: RuleDraft, poisoned: bool) -> Result<Rule> {
        tracing::warn!(rule_type = %draft.rule_type, text = %draft.rule_text, poisoned, "Injecting rule");
        self.store.add_rule(draft, poisoned).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMemoryBackend;
    use swarm_core::mocks::MockReasoning;
    use swarm_core::types::{ActionType, MemoryKind, RuleLocation, RuleType};

    #[tokio::test]
    async fn test_injected_records_are_poisoned_and_retrievable() {
        let store = Arc::new(VectorMemoryStore::new(
            Arc::new(InMemoryMemoryBackend::new()),
            Arc::new(MockReasoning::unavailable()),
            8,
        ));
        let injector = AdversarialInjector::new(store.clone());

        let episode = injector
            .inject_episode(
                EpisodeDraft::new(1, ActionType::Move, "CRITICAL FAILURE near 47.396716, 8.549858")
                    .with_state("lat", 47.396716)
                    .with_state("lon", 8.549858),
            )
            .await
            .unwrap();
        assert!(episode.poisoned);

        let loc = RuleLocation { lat: 47.396716, lon: 8.549858, radius: 20.0 };
        let rule = injector
            .inject_rule(RuleDraft::new("UNSAFE airspace", RuleType::Hazard, loc, 0.95))
            .await
            .unwrap();
        assert!(rule.poisoned);

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.poisoned_episodes, 1);
        assert_eq!(counts.poisoned_rules, 1);

        let query = store.embed("sector A").await;
        let hits = store.similar(&query, MemoryKind::Episodic, 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].poisoned());
    }

    #[tokio::test]
    async fn test_control_records_are_not_poisoned() {
        let store = Arc::new(VectorMemoryStore::new(
            Arc::new(InMemoryMemoryBackend::new()),
            Arc::new(MockReasoning::unavailable()),
            8,
        ));
        let injector = AdversarialInjector::new(store.clone());

        let episode = injector
            .inject_episode_with_flag(EpisodeDraft::new(2, ActionType::Scan, "Sector B clear"), false)
            .await
            .unwrap();
        assert!(!episode.poisoned);

        let loc = RuleLocation { lat: 47.39, lon: 8.54, radius: 50.0 };
        let rule = injector
            .inject_rule_with_flag(RuleDraft::new("Keep SOC above 30%", RuleType::Energy, loc, 0.5), false)
            .await
            .unwrap();
        assert!(!rule.poisoned);

        let counts = store.counts().await.unwrap();
        assert_eq!((counts.episodes, counts.poisoned_episodes), (1, 0));
        assert_eq!((counts.rules, counts.poisoned_rules), (1, 0));
    }
}
