//! Application core: agent logic with no direct I/O.
//!
//! Everything that decides what the agent does lives here: inbound command
//! parsing, the control loop, status encoding.  All interaction with
//! sensors, actuators and the broker happens through the **port traits** in
//! [`ports`], so this layer runs unchanged against mocks.

pub mod commands;
pub mod events;
pub mod inbound;
pub mod inbox;
pub mod ports;
pub mod service;
pub mod status;
