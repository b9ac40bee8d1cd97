//! Actuation capability trait.

use async_trait::async_trait;

use crate::error::Result;

/// Vehicle control for one agent. Retry and timeout policy belong to implementors.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Establish the link to the vehicle.
    async fn connect(&self) -> Result<()>;

    /// Arm and climb to `altitude` meters. Returns an acknowledgement message.
    async fn arm_and_takeoff(&self, altitude: f64) -> Result<String>;

    /// Fly to a position. Returns an acknowledgement message.
    async fn goto_location(&self, lat: f64, lon: f64, alt: f64) -> Result<String>;

    /// Land at the current position. Returns an acknowledgement message.
    async fn land(&self) -> Result<String>;
}
