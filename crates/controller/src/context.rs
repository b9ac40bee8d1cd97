//! Retrieval context for mission planning.
//!
//! Embeds the mission text once, pulls the top episodic and semantic hits,
//! and renders them both as prompt text and as a structured list that keeps
//! each hit's provenance.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use swarm_core::{
    config::MemoryConfig,
    types::{MemoryHit, MemoryKind},
    Result,
};
use swarm_store::VectorMemoryStore;

/// Rendered when neither memory kind produced a hit.
pub const NO_CONTEXT: &str = "No relevant past experiences or rules found.";

/// One retrieved record as the planner sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextHit {
    pub text: String,
    pub similarity: f32,
    pub poisoned: bool,
}

impl From<&MemoryHit> for ContextHit {
    fn from(hit: &MemoryHit) -> Self {
        Self {
            text: hit.text().to_string(),
            similarity: hit.similarity,
            poisoned: hit.poisoned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredContext {
    pub episodic: Vec<ContextHit>,
    pub rules: Vec<ContextHit>,
}

impl StructuredContext {
    pub fn has_poisoned(&self) -> bool {
        self.episodic.iter().chain(self.rules.iter()).any(|h| h.poisoned)
    }

    pub fn usage(&self) -> ContextUsage {
        ContextUsage {
            episodic_hits: self.episodic.len(),
            poisoned_episodic: self.episodic.iter().filter(|h| h.poisoned).count(),
            rule_hits: self.rules.len(),
            poisoned_rules: self.rules.iter().filter(|h| h.poisoned).count(),
        }
    }

    /// Prompt text: one section per non-empty kind, separated by a blank line.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        if !self.episodic.is_empty() {
            sections.push(render_section("Past Experiences:", &self.episodic));
        }
        if !self.rules.is_empty() {
            sections.push(render_section("Relevant Rules:", &self.rules));
        }

        if sections.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            sections.join("\n\n")
        }
    }
}

fn render_section(title: &str, hits: &[ContextHit]) -> String {
    let mut out = String::from(title);
    for hit in hits {
        out.push_str("\n- ");
        out.push_str(&hit.text);
    }
    out
}

/// How much memory went into a plan, and how much of it was poisoned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContextUsage {
    pub episodic_hits: usize,
    pub poisoned_episodic: usize,
    pub rule_hits: usize,
    pub poisoned_rules: usize,
}

impl fmt::Display for ContextUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Context] Episodic hits: {} (poisoned: {}); Rules hits: {} (poisoned: {})",
            self.episodic_hits, self.poisoned_episodic, self.rule_hits, self.poisoned_rules
        )
    }
}

/// Context handed to the planner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalContext {
    pub text: String,
    pub structured: StructuredContext,
}

impl RetrievalContext {
    pub fn from_structured(structured: StructuredContext) -> Self {
        Self {
            text: structured.render(),
            structured,
        }
    }

    /// Context with no hits.
    pub fn empty() -> Self {
        Self::from_structured(StructuredContext::default())
    }

    pub fn has_poisoned(&self) -> bool {
        self.structured.has_poisoned()
    }

    pub fn usage(&self) -> ContextUsage {
        self.structured.usage()
    }
}

/// Builds planning context from the shared memory store.
pub struct RetrievalContextBuilder {
    store: Arc<VectorMemoryStore>,
    top_k: usize,
}

impl RetrievalContextBuilder {
    pub fn new(store: Arc<VectorMemoryStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    pub fn from_config(store: Arc<VectorMemoryStore>, config: &MemoryConfig) -> Self {
        Self::new(store, config.top_k)
    }

    /// Retrieve up to `top_k` hits of each kind for `query`.
    pub async fn build(&self, query: &str) -> Result<RetrievalContext> {
        let embedding = self.store.embed(query).await;

        let episodic = self.store.similar(&embedding, MemoryKind::Episodic, self.top_k).await?;
        let rules = self.store.similar(&embedding, MemoryKind::Semantic, self.top_k).await?;

        let structured = StructuredContext {
            episodic: episodic.iter().map(ContextHit::from).collect(),
            rules: rules.iter().map(ContextHit::from).collect(),
        };

        let context = RetrievalContext::from_structured(structured);
        tracing::debug!(usage = %context.usage(), "Retrieved planning context");
        Ok(context)
    }
}
