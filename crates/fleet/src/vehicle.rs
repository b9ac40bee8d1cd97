//! Simulated vehicle implementing the `Actuator` capability.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::RwLock;

use swarm_core::{
    config::AgentConfig,
    traits::Actuator,
    types::{AgentId, FlightPhase},
    Error, Result,
};

// =============================================================================
// Vehicle State
// =============================================================================

/// Point-in-time view of a simulated vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSnapshot {
    pub connected: bool,
    pub phase: FlightPhase,
    pub armed: bool,
    pub altitude: f64,
    pub position: Option<(f64, f64)>,
}

impl Default for VehicleSnapshot {
    fn default() -> Self {
        Self {
            connected: false,
            phase: FlightPhase::Grounded,
            armed: false,
            altitude: 0.0,
            position: None,
        }
    }
}

// =============================================================================
// Simulated Vehicle
// =============================================================================

/// In-process vehicle. Every command waits `latency` before it takes effect.
pub struct SimulatedVehicle {
    agent_id: AgentId,
    endpoint: String,
    latency: Duration,
    state: RwLock<VehicleSnapshot>,
}

impl SimulatedVehicle {
    pub fn new(agent_id: AgentId, endpoint: impl Into<String>, latency: Duration) -> Self {
        Self {
            agent_id,
            endpoint: endpoint.into(),
            latency,
            state: RwLock::new(VehicleSnapshot::default()),
        }
    }

    pub fn from_config(agent: &AgentConfig, latency_ms: u64) -> Self {
        Self::new(agent.id, agent.endpoint.clone(), Duration::from_millis(latency_ms))
    }

    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    pub async fn snapshot(&self) -> VehicleSnapshot {
        self.state.read().await.clone()
    }

    async fn settle(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn not_connected(&self) -> Error {
        Error::actuation(format!("vehicle {} is not connected", self.agent_id))
    }
}

#[async_trait]
impl Actuator for SimulatedVehicle {
    async fn connect(&self) -> Result<()> {
        self.settle().await;
        self.state.write().await.connected = true;
        tracing::info!(agent_id = self.agent_id, endpoint = %self.endpoint, "Vehicle link established");
        Ok(())
    }

    async fn arm_and_takeoff(&self, altitude: f64) -> Result<String> {
        if !altitude.is_finite() || altitude <= 0.0 {
            return Err(Error::actuation(format!("invalid takeoff altitude {}", altitude)));
        }
        self.settle().await;

        let mut state = self.state.write().await;
        if !state.connected {
            return Err(self.not_connected());
        }
        state.armed = true;
        state.phase = FlightPhase::Airborne;
        state.altitude = altitude;
        tracing::debug!(agent_id = self.agent_id, altitude, "Takeoff complete");
        Ok(format!("Reached target altitude {}m", altitude))
    }

    async fn goto_location(&self, lat: f64, lon: f64, alt: f64) -> Result<String> {
        self.settle().await;

        let mut state = self.state.write().await;
        if !state.connected {
            return Err(self.not_connected());
        }
        if state.phase != FlightPhase::Airborne {
            return Err(Error::actuation(format!(
                "vehicle {} cannot move while grounded",
                self.agent_id
            )));
        }
        state.position = Some((lat, lon));
        state.altitude = alt;
        tracing::debug!(agent_id = self.agent_id, lat, lon, alt, "Goto accepted");
        Ok("Move command sent".into())
    }

    async fn land(&self) -> Result<String> {
        self.settle().await;

        let mut state = self.state.write().await;
        if !state.connected {
            return Err(self.not_connected());
        }
        state.phase = FlightPhase::Landed;
        state.armed = false;
        state.altitude = 0.0;
        Ok("Landing initiated".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_require_connection() {
        let vehicle = SimulatedVehicle::new(1, "localhost:50051", Duration::ZERO);
        assert!(vehicle.arm_and_takeoff(10.0).await.is_err());
        assert!(vehicle.land().await.is_err());

        vehicle.connect().await.unwrap();
        let snapshot = vehicle.snapshot().await;
        assert!(snapshot.connected);
        assert_eq!(snapshot.phase, FlightPhase::Grounded);
    }

    #[tokio::test]
    async fn test_rejects_invalid_altitude() {
        let vehicle = SimulatedVehicle::new(1, "sim", Duration::ZERO);
        vehicle.connect().await.unwrap();
        assert!(vehicle.arm_and_takeoff(0.0).await.is_err());
        assert!(vehicle.arm_and_takeoff(f64::NAN).await.is_err());
        assert!(!vehicle.snapshot().await.armed);
    }
}
