use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::{Deserialize, Serialize};

use crate::types::AgentId;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub memory: MemoryConfig,
    pub planner: PlannerConfig,
    pub energy: EnergyConfig,
    pub orchestrator: OrchestratorConfig,
    pub fleet: FleetConfig,
    pub model_gateway: ModelGatewayConfig,
    pub logging: LoggingConfig,
    pub mission: MissionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemoryConfig {
    /// SQLite file holding both memory tables.
    pub database_path: String,
    /// Keep memory in process instead of SQLite.
    pub in_memory: bool,
    /// Dimensionality of embeddings (and of the zero-vector fallback).
    pub embedding_dim: usize,
    /// Hits retrieved per memory kind when building planning context.
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlannerConfig {
    /// Per-axis absolute difference, in degrees, under which a target counts as near a hazard.
    pub hazard_threshold_deg: f64,
    pub default_altitude: f64,
    /// Context substrings that mark a location as dangerous.
    pub hazard_markers: Vec<String>,
    /// Agents forced hazardous in the heuristic planner; every other agent is forced safe.
    pub hazard_override: Option<Vec<AgentId>>,
    /// Named experiment whose hazard flags override computed proximity.
    pub scenario: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnergyConfig {
    pub initial_soc: f64,
    /// Non-return tasks are refused at or below this state of charge.
    pub low_soc_threshold: f64,
    pub move_cost: f64,
    pub scan_cost: f64,
    pub return_cost: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OrchestratorConfig {
    /// Delay between consecutive agents' start, in seconds.
    pub stagger_secs: f64,
    /// Pause after connecting the fleet, in seconds.
    pub settle_secs: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FleetConfig {
    pub agents: Vec<AgentConfig>,
    pub simulated_latency_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    pub id: AgentId,
    pub endpoint: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelGatewayConfig {
    /// Base URL of an OpenAI-compatible server.
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
    pub json: bool,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MissionConfig {
    pub default_text: String,
}

impl FleetConfig {
    /// Agent ids in ascending order.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

impl AppConfig {
    /// Layer built-in defaults, config files and `SWARM__*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("SWARM_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map SWARM__ORCHESTRATOR__STAGGER_SECS=2.0 to orchestrator.stagger_secs
            .add_source(Environment::with_prefix("SWARM").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            database_path: "mission_memory.db".into(),
            in_memory: false,
            embedding_dim: 1536,
            top_k: 3,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            hazard_threshold_deg: 1e-3,
            default_altitude: crate::types::DEFAULT_ALTITUDE,
            hazard_markers: vec!["CRITICAL FAILURE".into(), "UNSAFE".into(), "CRASH".into()],
            hazard_override: None,
            scenario: None,
        }
    }
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial_soc: 1.0,
            low_soc_threshold: 0.10,
            move_cost: 0.08,
            scan_cost: 0.02,
            return_cost: 0.05,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stagger_secs: 1.5,
            settle_secs: 3.0,
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            agents: vec![
                AgentConfig {
                    id: 1,
                    endpoint: "localhost:50051".into(),
                },
                AgentConfig {
                    id: 2,
                    endpoint: "localhost:50052".into(),
                },
            ],
            simulated_latency_ms: 200,
        }
    }
}

impl Default for ModelGatewayConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:11434/v1".into(),
            api_key: None,
            model: "gpt-oss:20b".into(),
            embedding_model: "nomic-embed-text".into(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,swarm=debug".into(),
            json: false,
            otlp_endpoint: None,
        }
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            default_text: "Takeoff and scan the area. \
                Agent 1 goes to Sector A (Lat 47.396716, Lon 8.549858). \
                Agent 2 goes to Sector B (Lat 47.396735, Lon 8.549883)."
                .into(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            planner: PlannerConfig::default(),
            energy: EnergyConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            fleet: FleetConfig::default(),
            model_gateway: ModelGatewayConfig::default(),
            logging: LoggingConfig::default(),
            mission: MissionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_mission_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.memory.top_k, 3);
        assert_eq!(cfg.memory.embedding_dim, 1536);
        assert_eq!(cfg.planner.hazard_threshold_deg, 1e-3);
        assert_eq!(cfg.orchestrator.stagger_secs, 1.5);
        assert_eq!(cfg.fleet.agent_ids(), vec![1, 2]);
    }

    #[test]
    fn test_defaults_survive_config_layering() {
        let layered = Config::builder()
            .add_source(Config::try_from(&AppConfig::default()).unwrap())
            .set_override("memory.top_k", 5)
            .unwrap()
            .build()
            .unwrap();
        let cfg: AppConfig = layered.try_deserialize().unwrap();
        assert_eq!(cfg.memory.top_k, 5);
        assert_eq!(cfg.energy.move_cost, 0.08);
        assert!(cfg.model_gateway.api_key.is_none());
    }
}
