use serde::{Deserialize, Serialize};

use super::memory::AgentId;

/// Flight phase of one agent. `Landed` routes exactly like `Grounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightPhase {
    Grounded,
    Airborne,
    Landed,
}

/// Runtime state of one agent. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: AgentId,
    pub phase: FlightPhase,
    /// State of charge in [0, 1].
    pub soc: f64,
}

impl AgentState {
    pub fn new(agent_id: AgentId, soc: f64) -> Self {
        Self {
            agent_id,
            phase: FlightPhase::Grounded,
            soc: soc.clamp(0.0, 1.0),
        }
    }

    pub fn is_airborne(&self) -> bool {
        self.phase == FlightPhase::Airborne
    }

    /// Deduct energy, never below zero. SOC only ever decreases.
    pub fn drain(&mut self, cost: f64) {
        self.soc = (self.soc - cost.max(0.0)).max(0.0);
    }
}
