use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Identifier of one agent in the fleet.
pub type AgentId = u32;

/// Free-form key/value snapshot of an agent (lat, lon, alt, soc, ...).
pub type StateSnapshot = serde_json::Map<String, Value>;

// =============================================================================
// Actions
// =============================================================================

/// The closed set of actions an agent can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Move,
    Scan,
    Return,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Scan => "scan",
            Self::Return => "return",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "move" => Ok(Self::Move),
            "scan" => Ok(Self::Scan),
            "return" => Ok(Self::Return),
            other => Err(Error::storage(format!("unknown action type '{}'", other))),
        }
    }
}

// =============================================================================
// Episodic Memory
// =============================================================================

/// One recorded task outcome. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub agent_id: AgentId,
    pub action_type: ActionType,
    pub state: StateSnapshot,
    pub outcome_text: String,
    pub embedding: Vec<f32>,
    pub poisoned: bool,
}

/// An episode before the store assigns id, timestamp and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeDraft {
    pub agent_id: AgentId,
    pub action_type: ActionType,
    pub state: StateSnapshot,
    pub outcome_text: String,
}

impl EpisodeDraft {
    pub fn new(agent_id: AgentId, action_type: ActionType, outcome_text: impl Into<String>) -> Self {
        Self {
            agent_id,
            action_type,
            state: StateSnapshot::new(),
            outcome_text: outcome_text.into(),
        }
    }

    /// Add one key to the state snapshot.
    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    /// Replace the whole state snapshot.
    pub fn with_snapshot(mut self, state: StateSnapshot) -> Self {
        self.state = state;
        self
    }

    /// Text the embedding of this episode is computed from.
    pub fn embedding_text(&self) -> String {
        format!(
            "Agent {} performed {} at {}. Result: {}",
            self.agent_id,
            self.action_type,
            Value::Object(self.state.clone()),
            self.outcome_text
        )
    }
}

// =============================================================================
// Semantic Rules
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleType {
    Hazard,
    Energy,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hazard => "HAZARD",
            Self::Energy => "ENERGY",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HAZARD" => Ok(Self::Hazard),
            "ENERGY" => Ok(Self::Energy),
            other => Err(Error::storage(format!("unknown rule type '{}'", other))),
        }
    }
}

/// Where a rule applies. Radius is in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleLocation {
    pub lat: f64,
    pub lon: f64,
    pub radius: f64,
}

/// A standing hazard or energy fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub rule_text: String,
    pub rule_type: RuleType,
    pub location: RuleLocation,
    pub confidence: f64,
    pub embedding: Vec<f32>,
    pub poisoned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    pub rule_text: String,
    pub rule_type: RuleType,
    pub location: RuleLocation,
    pub confidence: f64,
}

impl RuleDraft {
    /// Confidence is clamped into [0, 1].
    pub fn new(
        rule_text: impl Into<String>,
        rule_type: RuleType,
        location: RuleLocation,
        confidence: f64,
    ) -> Self {
        Self {
            rule_text: rule_text.into(),
            rule_type,
            location,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

// =============================================================================
// Records & Retrieval
// =============================================================================

/// Which collection a similarity query scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Episodic,
    Semantic,
}

/// A record to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum NewRecord {
    Episode(EpisodeDraft),
    Rule(RuleDraft),
}

impl NewRecord {
    pub fn kind(&self) -> MemoryKind {
        match self {
            Self::Episode(_) => MemoryKind::Episodic,
            Self::Rule(_) => MemoryKind::Semantic,
        }
    }
}

/// A stored record of either kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MemoryRecord {
    Episode(Episode),
    Rule(Rule),
}

impl MemoryRecord {
    pub fn id(&self) -> i64 {
        match self {
            Self::Episode(e) => e.id,
            Self::Rule(r) => r.id,
        }
    }

    /// Text shown to the planner: outcome for episodes, rule text for rules.
    pub fn text(&self) -> &str {
        match self {
            Self::Episode(e) => &e.outcome_text,
            Self::Rule(r) => &r.rule_text,
        }
    }

    pub fn embedding(&self) -> &[f32] {
        match self {
            Self::Episode(e) => &e.embedding,
            Self::Rule(r) => &r.embedding,
        }
    }

    pub fn poisoned(&self) -> bool {
        match self {
            Self::Episode(e) => e.poisoned,
            Self::Rule(r) => r.poisoned,
        }
    }
}

/// One ranked similarity result. Carries provenance; the store applies no trust policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub record: MemoryRecord,
    pub similarity: f32,
}

impl MemoryHit {
    pub fn text(&self) -> &str {
        self.record.text()
    }

    pub fn poisoned(&self) -> bool {
        self.record.poisoned()
    }
}

/// Aggregate counts over both collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCounts {
    pub episodes: usize,
    pub poisoned_episodes: usize,
    pub rules: usize,
    pub poisoned_rules: usize,
}

/// Most recent records, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub episodes: Vec<Episode>,
    pub rules: Vec<Rule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_round_trip_names() {
        assert_eq!("MOVE".parse::<ActionType>().unwrap(), ActionType::Move);
        assert_eq!(ActionType::Return.to_string(), "return");
        assert!("hover".parse::<ActionType>().is_err());
    }

    #[test]
    fn test_rule_confidence_clamped() {
        let loc = RuleLocation { lat: 0.0, lon: 0.0, radius: 10.0 };
        assert_eq!(RuleDraft::new("x", RuleType::Hazard, loc, 1.7).confidence, 1.0);
        assert_eq!(RuleDraft::new("x", RuleType::Energy, loc, -0.2).confidence, 0.0);
    }

    #[test]
    fn test_episode_embedding_text() {
        let draft = EpisodeDraft::new(2, ActionType::Scan, "Scan completed.").with_state("soc", 0.9);
        let text = draft.embedding_text();
        assert!(text.starts_with("Agent 2 performed scan at {"));
        assert!(text.ends_with("Result: Scan completed."));
    }
}
