//! Mission orchestrator.
//!
//! Plans once, then runs one task loop per agent concurrently. Agents start
//! on a fixed stagger; within an agent tasks run strictly in plan order and
//! the first failure halts that agent only.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use swarm_core::{
    config::OrchestratorConfig,
    traits::MissionLog,
    types::{AgentId, MissionPlan, Task, ToolResult},
    Error, Result,
};

use crate::context::ContextUsage;
use crate::coords::CoordinateParser;
use crate::executor::TaskExecutor;
use crate::planning::{MissionPlanner, PlanSource};
use crate::verdict::{expected_targets, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    Success,
    Failed,
    /// The plan assigned this agent nothing.
    Idle,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Idle => "IDLE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    /// Not attempted because an earlier task of the same agent failed.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task: Task,
    pub status: TaskStatus,
    /// `None` for skipped tasks.
    pub result: Option<ToolResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub agent_id: AgentId,
    pub status: AgentStatus,
    pub tasks: Vec<TaskOutcome>,
    /// `None` when the plan addressed an agent with no executor.
    pub final_soc: Option<f64>,
}

impl AgentReport {
    fn from_outcomes(agent_id: AgentId, tasks: Vec<TaskOutcome>, final_soc: Option<f64>) -> Self {
        let status = if tasks.is_empty() {
            AgentStatus::Idle
        } else if tasks.iter().all(|t| t.status == TaskStatus::Succeeded) {
            AgentStatus::Success
        } else {
            AgentStatus::Failed
        };
        Self {
            agent_id,
            status,
            tasks,
            final_soc,
        }
    }
}

/// Everything a finished mission produced.
#[derive(Debug, Clone, Serialize)]
pub struct MissionReport {
    pub mission_id: String,
    pub mission: String,
    pub plan: MissionPlan,
    pub plan_source: PlanSource,
    pub context: ContextUsage,
    /// Ascending agent id.
    pub agents: Vec<AgentReport>,
    pub verdict: Verdict,
}

impl MissionReport {
    pub fn agent(&self, agent_id: AgentId) -> Option<&AgentReport> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }
}

/// Runs missions across the fleet.
pub struct MissionOrchestrator {
    planner: MissionPlanner,
    executors: BTreeMap<AgentId, Arc<Mutex<TaskExecutor>>>,
    parser: CoordinateParser,
    stagger: Duration,
    settle: Duration,
    log: Arc<dyn MissionLog>,
}

impl MissionOrchestrator {
    pub fn new(
        planner: MissionPlanner,
        executors: Vec<TaskExecutor>,
        config: &OrchestratorConfig,
        log: Arc<dyn MissionLog>,
    ) -> Self {
        let executors = executors
            .into_iter()
            .map(|e| (e.agent_id(), Arc::new(Mutex::new(e))))
            .collect();
        Self {
            planner,
            executors,
            parser: CoordinateParser::new(),
            stagger: Duration::from_secs_f64(config.stagger_secs.max(0.0)),
            settle: Duration::from_secs_f64(config.settle_secs.max(0.0)),
            log,
        }
    }

    /// Agents with an executor, ascending.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.executors.keys().copied().collect()
    }

    /// Connect every agent concurrently, then let the links settle.
    pub async fn connect_fleet(&self) -> Result<()> {
        self.log.section("Connecting Fleet");

        let attempts = self.executors.iter().map(|(id, executor)| async move {
            let executor = executor.lock().await;
            (*id, executor.connect().await)
        });
        let failures: Vec<String> = join_all(attempts)
            .await
            .into_iter()
            .filter_map(|(id, res)| res.err().map(|e| format!("agent {}: {}", id, e)))
            .collect();

        if !failures.is_empty() {
            let msg = failures.join("; ");
            self.log.error(&format!("Fleet connection failed: {}", msg));
            return Err(Error::actuation(msg));
        }

        tracing::info!(agents = self.executors.len(), settle = ?self.settle, "Fleet connected");
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Plan and execute one mission.
    ///
    /// Errors only when planning fails validation, in which case nothing
    /// has been actuated.
    pub async fn run_mission(&self, mission: &str) -> Result<MissionReport> {
        let mission_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(mission_id = %mission_id, "Starting mission");

        let outcome = self.planner.plan(mission).await?;

        let mut by_agent: BTreeMap<AgentId, Vec<Task>> = BTreeMap::new();
        for task in &outcome.plan.tasks {
            by_agent.entry(task.agent_id).or_default().push(task.clone());
        }

        self.log.section("Mission Execution");

        let runs = self.executors.iter().enumerate().map(|(i, (agent_id, executor))| {
            let tasks = by_agent.get(agent_id).cloned().unwrap_or_default();
            let delay = self.stagger.mul_f64(i as f64);
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                self.run_agent(*agent_id, executor, tasks).await
            }
        });
        let mut agents = join_all(runs).await;

        // Tasks addressed to agents the fleet does not have.
        for (agent_id, tasks) in by_agent.iter().filter(|(id, _)| !self.executors.contains_key(*id)) {
            self.log.error(&format!("[Agent {}] No such agent in fleet; failing its tasks", agent_id));
            let outcomes = tasks
                .iter()
                .map(|task| TaskOutcome {
                    task: task.clone(),
                    status: TaskStatus::Failed,
                    result: Some(ToolResult::failure(format!("No executor for agent {}", agent_id))),
                })
                .collect();
            agents.push(AgentReport::from_outcomes(*agent_id, outcomes, None));
        }
        agents.sort_by_key(|a| a.agent_id);

        let expected = expected_targets(&self.parser, mission, self.planner.agents());
        let verdict = Verdict::classify(&outcome.plan, &expected, outcome.context.has_poisoned());

        self.log.section("Mission Report");
        for agent in &agents {
            self.log.info(&format!("Agent {}: {}", agent.agent_id, agent.status));
        }
        self.log.info(&outcome.context.usage().to_string());
        self.log.info(&format!("Attack effect: {}", verdict));

        Ok(MissionReport {
            mission_id,
            mission: mission.to_string(),
            plan: outcome.plan,
            plan_source: outcome.source,
            context: outcome.context.usage(),
            agents,
            verdict,
        })
    }

    async fn run_agent(&self, agent_id: AgentId, executor: &Mutex<TaskExecutor>, tasks: Vec<Task>) -> AgentReport {
        let mut executor = executor.lock().await;
        if tasks.is_empty() {
            self.log.info(&format!("[Agent {}] No tasks assigned", agent_id));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut halted = false;
        for task in tasks {
            if halted {
                outcomes.push(TaskOutcome {
                    task,
                    status: TaskStatus::Skipped,
                    result: None,
                });
                continue;
            }

            let result = executor.execute(&task).await;
            let status = if result.success {
                TaskStatus::Succeeded
            } else {
                halted = true;
                self.log.error(&format!(
                    "[Agent {}] Halting after failed task {}",
                    agent_id, task.task_id
                ));
                TaskStatus::Failed
            };
            outcomes.push(TaskOutcome {
                task,
                status,
                result: Some(result),
            });
        }

        AgentReport::from_outcomes(agent_id, outcomes, Some(executor.state().soc))
    }
}
