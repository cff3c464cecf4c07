//! Actuator drivers over `embedded-hal` digital outputs.

pub mod relay;
pub mod sim_pin;
