//! Zone agent library.
//!
//! A periodic control loop for building zones (HVAC + lighting) and drones
//! (GPS + battery telemetry), coordinated over a pub/sub broker.  Exposes
//! the pure-logic modules for integration testing.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod model;
pub mod safety;
pub mod scheduler;
pub mod sensors;
pub mod topic;
