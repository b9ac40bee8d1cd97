//! Mission narrative routed through `tracing`.

use swarm_core::traits::MissionLog;

/// Writes mission narrative as `tracing` events under the `mission` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMissionLog;

impl TracingMissionLog {
    pub fn new() -> Self {
        Self
    }
}

impl MissionLog for TracingMissionLog {
    fn info(&self, message: &str) {
        tracing::info!(target: "mission", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "mission", "{}", message);
    }

    fn section(&self, title: &str) {
        tracing::info!(target: "mission", section = title, "===== {} =====", title);
    }
}
