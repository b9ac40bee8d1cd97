#![deny(unused)]
//! Mission controller for the agent fleet.
//!
//! Retrieval-augmented planning, per-agent task execution with an energy
//! model, and the orchestrator that runs agents concurrently and classifies
//! how adversarial memory affected the plan.

pub mod context;
pub mod coords;
pub mod executor;
pub mod orchestrator;
pub mod planning;
pub mod verdict;

pub use context::{ContextHit, ContextUsage, RetrievalContext, RetrievalContextBuilder, StructuredContext};
pub use coords::CoordinateParser;
pub use executor::{EnergyModel, TaskExecutor};
pub use orchestrator::{AgentReport, AgentStatus, MissionOrchestrator, MissionReport, TaskOutcome, TaskStatus};
pub use planning::{
    validate_plan, HazardOverride, HeuristicPlanner, MissionPlanner, PlanOutcome, PlanSource, PlanningFailure,
};
pub use verdict::Verdict;
