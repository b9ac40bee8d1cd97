#![deny(unused)]
//! Fleet actuation backends.
//!
//! `SimulatedVehicle` stands in for a flight controller link so missions can
//! run end to end without hardware.

pub mod vehicle;

pub use vehicle::{SimulatedVehicle, VehicleSnapshot};
