//! Per-agent task executor.
//!
//! Routes one task at a time to the actuation capability, tracks flight phase
//! and state of charge, and writes every attempt back into shared memory.

use serde_json::json;
use std::sync::Arc;

use swarm_core::{
    config::EnergyConfig,
    traits::{Actuator, MissionLog},
    types::{ActionType, AgentId, AgentState, EpisodeDraft, FlightPhase, Task, TaskParams, ToolResult},
    Error, Result,
};
use swarm_store::VectorMemoryStore;

/// Energy cost per action and the refusal threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyModel {
    pub move_cost: f64,
    pub scan_cost: f64,
    pub return_cost: f64,
    /// Non-return tasks are refused at or below this state of charge.
    pub low_soc_threshold: f64,
}

impl EnergyModel {
    pub fn from_config(config: &EnergyConfig) -> Self {
        Self {
            move_cost: config.move_cost,
            scan_cost: config.scan_cost,
            return_cost: config.return_cost,
            low_soc_threshold: config.low_soc_threshold,
        }
    }

    pub fn cost(&self, action: ActionType) -> f64 {
        match action {
            ActionType::Move => self.move_cost,
            ActionType::Scan => self.scan_cost,
            ActionType::Return => self.return_cost,
        }
    }
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self::from_config(&EnergyConfig::default())
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Executes tasks for exactly one agent.
pub struct TaskExecutor {
    state: AgentState,
    energy: EnergyModel,
    actuator: Arc<dyn Actuator>,
    memory: Arc<VectorMemoryStore>,
    log: Arc<dyn MissionLog>,
}

impl TaskExecutor {
    pub fn new(
        agent_id: AgentId,
        initial_soc: f64,
        energy: EnergyModel,
        actuator: Arc<dyn Actuator>,
        memory: Arc<VectorMemoryStore>,
        log: Arc<dyn MissionLog>,
    ) -> Self {
        Self {
            state: AgentState::new(agent_id, initial_soc),
            energy,
            actuator,
            memory,
            log,
        }
    }

    pub fn from_config(
        agent_id: AgentId,
        config: &EnergyConfig,
        actuator: Arc<dyn Actuator>,
        memory: Arc<VectorMemoryStore>,
        log: Arc<dyn MissionLog>,
    ) -> Self {
        Self::new(
            agent_id,
            config.initial_soc,
            EnergyModel::from_config(config),
            actuator,
            memory,
            log,
        )
    }

    pub fn agent_id(&self) -> AgentId {
        self.state.agent_id
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub async fn connect(&self) -> Result<()> {
        self.actuator.connect().await?;
        self.log.info(&format!("[Agent {}] Connected", self.agent_id()));
        Ok(())
    }

    /// Execute one task. Never errors: failures come back as a failed result.
    pub async fn execute(&mut self, task: &Task) -> ToolResult {
        let agent_id = self.agent_id();
        tracing::info!(agent_id, task_id = %task.task_id, action = %task.action_type, "Executing task");

        if task.action_type != ActionType::Return && self.state.soc <= self.energy.low_soc_threshold {
            // Outcome text is retrieved as planning context; keep decimals out of it.
            let result = ToolResult::failure(format!(
                "Low battery (SOC {:.0}%); refusing {} task {}",
                self.state.soc * 100.0,
                task.action_type,
                task.task_id
            ));
            self.log.error(&format!("[Agent {}] {}", agent_id, result.message));
            self.record(task, &result).await;
            return result;
        }

        let outcome = match task.action_type {
            ActionType::Move => self.move_to(&task.params).await,
            ActionType::Scan => self.scan(&task.params).await,
            ActionType::Return => self.return_home().await,
        };
        self.state.drain(self.energy.cost(task.action_type));

        let result = match outcome {
            Ok(message) => {
                self.log.info(&format!("[Agent {}] {}: {}", agent_id, task.task_id, message));
                ToolResult::ok(message)
            }
            Err(e) => {
                self.log.error(&format!("[Agent {}] {} failed: {}", agent_id, task.task_id, e));
                ToolResult::failure(e.to_string())
            }
        }
        .with_data(json!({ "soc": round3(self.state.soc), "phase": self.state.phase }));

        self.record(task, &result).await;
        result
    }

    async fn move_to(&mut self, params: &TaskParams) -> Result<String> {
        let (lat, lon) = params
            .coordinates()
            .ok_or_else(|| Error::actuation("move task is missing lat/lon"))?;

        self.actuator.arm_and_takeoff(params.alt).await?;
        self.state.phase = FlightPhase::Airborne;
        self.actuator.goto_location(lat, lon, params.alt).await
    }

    async fn scan(&mut self, params: &TaskParams) -> Result<String> {
        if !self.state.is_airborne() {
            self.actuator.arm_and_takeoff(params.alt).await?;
            self.state.phase = FlightPhase::Airborne;
        }
        Ok("Scan completed.".to_string())
    }

    async fn return_home(&mut self) -> Result<String> {
        let message = self.actuator.land().await?;
        self.state.phase = FlightPhase::Landed;
        Ok(message)
    }

    /// Write the attempt to memory. A failed write never changes the result.
    async fn record(&self, task: &Task, result: &ToolResult) {
        let mut draft = EpisodeDraft::new(self.agent_id(), task.action_type, result.message.clone())
            .with_state("soc", round3(self.state.soc))
            .with_state("alt", task.params.alt);
        if let Some((lat, lon)) = task.params.coordinates() {
            draft = draft.with_state("lat", lat).with_state("lon", lon);
        }
        if let Some(target) = &task.params.scan_target {
            draft = draft.with_state("scan_target", target.clone());
        }

        if let Err(e) = self.memory.log_experience(draft, false).await {
            tracing::warn!(agent_id = self.agent_id(), error = %e, "Failed to record episode");
            self.log.error(&format!("[Agent {}] Memory write failed: {}", self.agent_id(), e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::mocks::{ActuatorOp, FailingBackend, MockActuator, MockReasoning, RecordingLog};
    use swarm_store::InMemoryMemoryBackend;

    fn memory() -> Arc<VectorMemoryStore> {
        Arc::new(VectorMemoryStore::new(
            Arc::new(InMemoryMemoryBackend::new()),
            Arc::new(MockReasoning::unavailable()),
            8,
        ))
    }

    fn executor(actuator: Arc<MockActuator>, soc: f64, memory: Arc<VectorMemoryStore>) -> TaskExecutor {
        TaskExecutor::new(1, soc, EnergyModel::default(), actuator, memory, Arc::new(RecordingLog::new()))
    }

    fn move_task() -> Task {
        Task::new("task_1", 1, ActionType::Move, TaskParams::at(47.3967, 8.5498, 15.0))
    }

    #[tokio::test]
    async fn test_move_then_scan_then_return() {
        let actuator = Arc::new(MockActuator::new());
        let mem = memory();
        let mut exec = executor(actuator.clone(), 1.0, mem.clone());

        assert!(exec.execute(&move_task()).await.success);
        assert!(exec.state().is_airborne());

        let scan = Task::new("task_2", 1, ActionType::Scan, TaskParams::default());
        let result = exec.execute(&scan).await;
        assert_eq!(result.message, "Scan completed.");

        let ret = Task::new("task_3", 1, ActionType::Return, TaskParams::default());
        assert_eq!(exec.execute(&ret).await.message, "Landing initiated");
        assert_eq!(exec.state().phase, FlightPhase::Landed);

        assert_eq!(
            actuator.calls(),
            vec!["arm_and_takeoff(15)", "goto_location(47.3967, 8.5498, 15)", "land()"]
        );
        assert!((exec.state().soc - (1.0 - 0.08 - 0.02 - 0.05)).abs() < 1e-9);
        assert_eq!(mem.counts().await.unwrap().episodes, 3);
    }

    #[tokio::test]
    async fn test_scan_while_grounded_takes_off_first() {
        let actuator = Arc::new(MockActuator::new());
        let mut exec = executor(actuator.clone(), 1.0, memory());
        let scan = Task::new("task_2", 1, ActionType::Scan, TaskParams::default());
        assert!(exec.execute(&scan).await.success);
        assert_eq!(actuator.calls(), vec!["arm_and_takeoff(10)"]);
    }

    #[tokio::test]
    async fn test_low_soc_refuses_without_actuation() {
        let actuator = Arc::new(MockActuator::new());
        let mem = memory();
        let mut exec = executor(actuator.clone(), 0.10, mem.clone());

        let result = exec.execute(&move_task()).await;
        assert!(!result.success);
        assert_eq!(result.message, "Low battery (SOC 10%); refusing move task task_1");
        assert_eq!(actuator.call_count(), 0);
        assert_eq!(exec.state().soc, 0.10);

        // Refusals are still remembered.
        assert_eq!(mem.counts().await.unwrap().episodes, 1);

        // Returning home is always allowed.
        let ret = Task::new("task_9", 1, ActionType::Return, TaskParams::default());
        assert!(exec.execute(&ret).await.success);
        assert!(exec.state().soc >= 0.0);
    }

    #[tokio::test]
    async fn test_actuation_failure_still_costs_energy() {
        let actuator = Arc::new(MockActuator::new().failing_on(ActuatorOp::Goto));
        let mut exec = executor(actuator, 1.0, memory());

        let result = exec.execute(&move_task()).await;
        assert!(!result.success);
        assert!(result.message.contains("rejected by vehicle"));
        assert!((exec.state().soc - 0.92).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_move_without_coordinates_fails() {
        let actuator = Arc::new(MockActuator::new());
        let mut exec = executor(actuator.clone(), 1.0, memory());
        let task = Task::new("task_1", 1, ActionType::Move, TaskParams::default());
        let result = exec.execute(&task).await;
        assert!(!result.success);
        assert_eq!(actuator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_write_failure_does_not_change_result() {
        let mem = Arc::new(VectorMemoryStore::new(
            Arc::new(FailingBackend),
            Arc::new(MockReasoning::unavailable()),
            8,
        ));
        let log = Arc::new(RecordingLog::new());
        let mut exec = TaskExecutor::new(1, 1.0, EnergyModel::default(), Arc::new(MockActuator::new()), mem, log.clone());

        let result = exec.execute(&move_task()).await;
        assert!(result.success);
        assert!(log.contains("Memory write failed"));
    }
}
