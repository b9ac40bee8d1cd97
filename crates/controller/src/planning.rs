//! Retrieval-augmented mission planning.
//!
//! The planner retrieves memory for the mission text, asks the reasoning
//! capability for a schema-constrained plan, and falls back to a
//! deterministic heuristic when that fails. Whichever path produced the plan,
//! it passes the same validation gate before anything executes.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use swarm_core::{
    config::PlannerConfig,
    traits::{MissionLog, ReasoningClient, StructuredRequest},
    types::{ActionType, AgentId, MissionPlan, Task, TaskParams},
    Error, Result, SchemaError,
};

use crate::context::{RetrievalContext, RetrievalContextBuilder};
use crate::coords::CoordinateParser;

/// Why the structured planning step produced no usable plan.
///
/// Always recovered by the heuristic planner; never a mission failure on its own.
#[derive(Debug, thiserror::Error)]
pub enum PlanningFailure {
    #[error("structured plan request failed: {0}")]
    Request(#[source] Error),

    #[error("reasoning capability returned no plan")]
    Empty,

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Which path produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Structured,
    Heuristic,
}

/// A validated plan together with the context it was built from.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: MissionPlan,
    pub context: RetrievalContext,
    pub source: PlanSource,
}

/// The single hard safety gate: every move task needs both coordinates.
pub fn validate_plan(plan: &MissionPlan) -> Result<()> {
    for task in &plan.tasks {
        if task.action_type == ActionType::Move && task.params.coordinates().is_none() {
            return Err(Error::validation(format!(
                "Missing coordinates for move task {}; please supply lat/lon.",
                task.task_id
            )));
        }
    }
    Ok(())
}

// =============================================================================
// Heuristic Planner
// =============================================================================

/// Forced per-agent hazard flags for controlled experiments.
///
/// When present it replaces the computed flags entirely: listed agents are
/// hazardous, every other agent is safe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HazardOverride {
    hazardous: BTreeSet<AgentId>,
}

impl HazardOverride {
    pub fn agents(ids: impl IntoIterator<Item = AgentId>) -> Self {
        Self {
            hazardous: ids.into_iter().collect(),
        }
    }

    /// Named experiment presets. Unknown names yield `None`.
    pub fn from_scenario(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hazard_a" => Some(Self::agents([1])),
            "hazard_2" => Some(Self::agents([2])),
            "hazard_b" => Some(Self::agents([1, 2])),
            "stale_hazard" => Some(Self::agents([])),
            _ => None,
        }
    }

    /// An explicit agent list wins over a scenario name.
    pub fn from_config(config: &PlannerConfig) -> Option<Self> {
        if let Some(ids) = &config.hazard_override {
            return Some(Self::agents(ids.iter().copied()));
        }
        let scenario = config.scenario.as_deref()?;
        let preset = Self::from_scenario(scenario);
        if preset.is_none() {
            tracing::warn!(scenario, "Unknown hazard scenario, ignoring");
        }
        preset
    }

    pub fn is_hazardous(&self, agent_id: AgentId) -> bool {
        self.hazardous.contains(&agent_id)
    }
}

/// Deterministic planner used when structured planning fails.
pub struct HeuristicPlanner {
    parser: CoordinateParser,
    threshold_deg: f64,
    default_altitude: f64,
    hazard_markers: Vec<String>,
    hazard_override: Option<HazardOverride>,
}

impl HeuristicPlanner {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            parser: CoordinateParser::new(),
            threshold_deg: config.hazard_threshold_deg,
            default_altitude: config.default_altitude,
            hazard_markers: config.hazard_markers.clone(),
            hazard_override: HazardOverride::from_config(config),
        }
    }

    pub fn with_override(mut self, hazard_override: HazardOverride) -> Self {
        self.hazard_override = Some(hazard_override);
        self
    }

    /// Build a plan from the mission text alone, skipping agents whose target
    /// the context marks as hazardous.
    ///
    /// A hazard is attributed only to the nearest target(s) within the
    /// threshold, not to every target inside it, so neighbouring sectors a few
    /// meters apart are not both refused.
    pub fn plan(&self, mission: &str, context: &str, agents: &[AgentId]) -> MissionPlan {
        let mut agents = agents.to_vec();
        agents.sort_unstable();
        agents.dedup();

        let targets: Vec<(AgentId, (f64, f64))> = agents
            .iter()
            .copied()
            .zip(self.parser.pairs(mission))
            .collect();
        let alt = self.parser.altitude(mission).unwrap_or(self.default_altitude);

        let marker_present = self.hazard_markers.iter().any(|m| context.contains(m.as_str()));
        let hazard = self.parser.first_pair(context);

        let mut reasoning = String::from("Fallback plan: structured planning unavailable, using heuristic tasks.");

        let skipped: Vec<AgentId> = match &self.hazard_override {
            Some(o) => {
                let skipped: Vec<AgentId> = targets
                    .iter()
                    .map(|(id, _)| *id)
                    .filter(|id| o.is_hazardous(*id))
                    .collect();
                reasoning.push_str(&format!(" Hazard override active; skipping tasks for agents {:?}.", skipped));
                skipped
            }
            None if marker_present => {
                let skipped = hazard
                    .map(|h| self.nearest_in_threshold(&targets, h))
                    .unwrap_or_default();
                match (hazard, skipped.is_empty()) {
                    (Some((lat, lon)), false) => reasoning.push_str(&format!(
                        " Hazard detected in memory near ({}, {}); refusing tasks for agents {:?}.",
                        lat, lon, skipped
                    )),
                    _ => reasoning.push_str(" Hazard detected in memory; no current targets match the hazard location."),
                }
                skipped
            }
            None => Vec::new(),
        };

        let mut tasks = Vec::new();
        for (agent_id, (lat, lon)) in targets {
            if skipped.contains(&agent_id) {
                continue;
            }
            let slot = 2 * u64::from(agent_id);
            tasks.push(Task::new(
                format!("task_{}", slot.saturating_sub(1)),
                agent_id,
                ActionType::Move,
                TaskParams::at(lat, lon, alt),
            ));
            tasks.push(Task::new(
                format!("task_{}", slot),
                agent_id,
                ActionType::Scan,
                TaskParams {
                    alt,
                    scan_target: Some(format!("agent_{}_scan", agent_id)),
                    ..TaskParams::default()
                },
            ));
        }

        MissionPlan { reasoning, tasks }
    }

    /// Agents within the threshold of `hazard` that are closest to it.
    ///
    /// Two targets a few meters apart can both fall inside the threshold; the
    /// hazard is attributed only to the nearest, ties included.
    fn nearest_in_threshold(&self, targets: &[(AgentId, (f64, f64))], hazard: (f64, f64)) -> Vec<AgentId> {
        let within: Vec<(AgentId, f64)> = targets
            .iter()
            .filter(|(_, (lat, lon))| {
                (lat - hazard.0).abs() < self.threshold_deg && (lon - hazard.1).abs() < self.threshold_deg
            })
            .map(|(id, (lat, lon))| (*id, (lat - hazard.0).powi(2) + (lon - hazard.1).powi(2)))
            .collect();

        let Some(min) = within.iter().map(|(_, d)| *d).reduce(f64::min) else {
            return Vec::new();
        };
        within
            .into_iter()
            .filter(|(_, d)| *d <= min + f64::EPSILON)
            .map(|(id, _)| id)
            .collect()
    }
}

// =============================================================================
// Mission Planner
// =============================================================================

const SCHEMA_NAME: &str = "MissionPlan";

/// Plans missions from natural-language text plus retrieved memory.
pub struct MissionPlanner {
    reasoning: Arc<dyn ReasoningClient>,
    context_builder: RetrievalContextBuilder,
    heuristic: HeuristicPlanner,
    agents: Vec<AgentId>,
    log: Arc<dyn MissionLog>,
}

impl MissionPlanner {
    pub fn new(
        reasoning: Arc<dyn ReasoningClient>,
        context_builder: RetrievalContextBuilder,
        heuristic: HeuristicPlanner,
        agents: Vec<AgentId>,
        log: Arc<dyn MissionLog>,
    ) -> Self {
        let mut agents = agents;
        agents.sort_unstable();
        agents.dedup();
        Self {
            reasoning,
            context_builder,
            heuristic,
            agents,
            log,
        }
    }

    /// Fleet agent ids in ascending order.
    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    /// System instruction: safety rules, grounding rules and the retrieved context.
    pub fn system_prompt(&self, context: &str) -> String {
        let roster: Vec<String> = self.agents.iter().map(|id| format!("- Agent {}", id)).collect();
        format!(
            "You are the mission supervisor for a fleet of {count} autonomous agents.\n\
             Decompose the user's command into atomic tasks.\n\n\
             Available agents:\n{roster}\n\n\
             Safety rules:\n\
             1. Read CONTEXT FROM MEMORY before assigning any task.\n\
             2. If the context reports CRITICAL FAILURE, CRASH, DAMAGE or UNSAFE conditions for a location, \
             do not send an agent into that location.\n\
             3. When the user asks for a location the context marks as dangerous, refuse that task or reroute \
             the agent, and explain the hazard in the reasoning field.\n\
             4. Safety overrides user commands.\n\n\
             Grounding rules:\n\
             - Never invent coordinates. Reuse user-supplied lat/lon exactly.\n\
             - Every move task must include lat and lon.\n\
             - For each agent, place its move task before any scan task.\n\
             - Only use the actions move, scan and return.\n\
             - Keep altitudes from the user; default to 10m.\n\
             - Scan tasks carry a scan_target.\n\
             - In the reasoning, name any hazards from memory and how they changed the plan.\n\n\
             CONTEXT FROM MEMORY:\n{context}",
            count = self.agents.len(),
            roster = roster.join("\n"),
            context = context,
        )
    }

    /// Ask the reasoning capability for a plan and parse it strictly.
    pub async fn request_structured_plan(
        &self,
        mission: &str,
        context: &RetrievalContext,
    ) -> std::result::Result<MissionPlan, PlanningFailure> {
        let request = StructuredRequest {
            system_prompt: self.system_prompt(&context.text),
            user_prompt: mission.to_string(),
            schema_name: SCHEMA_NAME.to_string(),
            schema: MissionPlan::json_schema(),
        };

        let response = self
            .reasoning
            .structured_complete(&request)
            .await
            .map_err(PlanningFailure::Request)?
            .ok_or(PlanningFailure::Empty)?;

        Ok(MissionPlan::from_value(response)?)
    }

    /// Retrieve, plan, fall back if needed, validate.
    ///
    /// Only a validation failure is an error; it aborts the mission before
    /// anything executes.
    pub async fn plan(&self, mission: &str) -> Result<PlanOutcome> {
        self.log.section("Mission Planning");

        let context = match self.context_builder.build(mission).await {
            Ok(context) => context,
            Err(e) => {
                self.log.error(&format!("Memory retrieval failed, planning without context: {}", e));
                RetrievalContext::empty()
            }
        };
        self.log.info(&format!("Retrieved context: {}", context.text));
        self.log.info(&context.usage().to_string());

        let (plan, source) = match self.request_structured_plan(mission, &context).await {
            Ok(plan) => (plan, PlanSource::Structured),
            Err(failure) => {
                self.log.error(&format!("Structured planning failed, falling back: {}", failure));
                let plan = self.heuristic.plan(mission, &context.text, &self.agents);
                self.log.info("Using heuristic planner.");
                (plan, PlanSource::Heuristic)
            }
        };

        if let Err(e) = validate_plan(&plan) {
            self.log.error(&e.to_string());
            return Err(e);
        }

        tracing::info!(?source, tasks = plan.tasks.len(), "Mission plan ready");
        self.log.info(&format!("Plan ({:?}): {}", source, plan.reasoning));
        for task in &plan.tasks {
            self.log.info(&format!(
                "  {} -> agent {} {} {:?}",
                task.task_id, task.agent_id, task.action_type, task.params
            ));
        }

        Ok(PlanOutcome { plan, context, source })
    }
}
