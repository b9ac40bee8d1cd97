#![deny(unused)]
//! swarm-mission: retrieval-augmented mission planning for an agent fleet.
//!
//! Usage: `swarm-mission [--json] [MISSION TEXT...]`. Without mission text the
//! configured default mission is flown.

use std::sync::Arc;

use swarm_controller::{
    HeuristicPlanner, MissionOrchestrator, MissionPlanner, MissionReport, RetrievalContextBuilder, TaskExecutor,
};
use swarm_core::config::AppConfig;
use swarm_core::traits::{Actuator, MissionLog, ReasoningClient};
use swarm_fleet::SimulatedVehicle;
use swarm_governance::TracingMissionLog;
use swarm_model_gateway::OpenAiCompatClient;
use swarm_store::VectorMemoryStore;

/// Records shown from memory before planning.
const RECENT_MEMORY: usize = 5;

struct Args {
    json: bool,
    mission: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let mut json = false;
    let mut words = Vec::new();
    for arg in args {
        if arg == "--json" {
            json = true;
        } else {
            words.push(arg);
        }
    }
    let mission = (!words.is_empty()).then(|| words.join(" "));
    Args { json, mission }
}

fn print_report(report: &MissionReport) {
    println!("Mission {} ({:?} plan)", report.mission_id, report.plan_source);
    for agent in &report.agents {
        let soc = agent
            .final_soc
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "n/a".into());
        println!("  Agent {}: {} (SOC {})", agent.agent_id, agent.status, soc);
    }
    println!("  {}", report.context);
    println!("  Attack effect: {}", report.verdict);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1));
    let config = AppConfig::load()?;

    swarm_governance::configure_tracing(&config.logging)?;
    tracing::info!("Starting swarm-mission v{}", env!("CARGO_PKG_VERSION"));

    let log: Arc<dyn MissionLog> = Arc::new(TracingMissionLog::new());

    // =========================================================================
    // Reasoning + Memory
    // =========================================================================
    let reasoning: Arc<dyn ReasoningClient> = Arc::new(OpenAiCompatClient::new(config.model_gateway.clone()));
    tracing::info!(api_base = %config.model_gateway.api_base, model = %config.model_gateway.model, "Model gateway configured");

    let backend = swarm_store::backend_from_config(&config.memory)?;
    let store = Arc::new(VectorMemoryStore::from_config(backend, reasoning.clone(), &config.memory));

    let counts = store.counts().await?;
    tracing::info!(
        episodes = counts.episodes,
        poisoned_episodes = counts.poisoned_episodes,
        rules = counts.rules,
        poisoned_rules = counts.poisoned_rules,
        "Memory loaded"
    );
    let recent = store.recent(RECENT_MEMORY).await?;
    for episode in &recent.episodes {
        tracing::debug!(
            id = episode.id,
            agent_id = episode.agent_id,
            action = %episode.action_type,
            poisoned = episode.poisoned,
            "{}",
            episode.outcome_text
        );
    }
    for rule in &recent.rules {
        tracing::debug!(id = rule.id, poisoned = rule.poisoned, "{}", rule.rule_text);
    }

    // =========================================================================
    // Fleet
    // =========================================================================
    let agent_ids = config.fleet.agent_ids();
    let executors = config
        .fleet
        .agents
        .iter()
        .map(|agent| {
            let vehicle: Arc<dyn Actuator> =
                Arc::new(SimulatedVehicle::from_config(agent, config.fleet.simulated_latency_ms));
            TaskExecutor::from_config(agent.id, &config.energy, vehicle, store.clone(), log.clone())
        })
        .collect();

    let planner = MissionPlanner::new(
        reasoning,
        RetrievalContextBuilder::from_config(store.clone(), &config.memory),
        HeuristicPlanner::new(&config.planner),
        agent_ids,
        log.clone(),
    );
    let orchestrator = MissionOrchestrator::new(planner, executors, &config.orchestrator, log);

    // =========================================================================
    // Mission
    // =========================================================================
    orchestrator.connect_fleet().await?;

    let mission = args.mission.unwrap_or(config.mission.default_text);
    let report = orchestrator.run_mission(&mission).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Args {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&[]);
        assert!(!parsed.json);
        assert!(parsed.mission.is_none());

        let parsed = args(&["--json", "Agent", "1", "goes", "home"]);
        assert!(parsed.json);
        assert_eq!(parsed.mission.as_deref(), Some("Agent 1 goes home"));
    }
}
