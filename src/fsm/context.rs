//! Agent state owned by the control loop.
//!
//! `AgentState` is the single struct every step of an iteration reads from
//! and writes to: applied actuator states, manual overrides, last-known-good
//! readings, derived flags, the drone's task and the failure counters.  It
//! is touched by the loop thread only and never persisted.

use crate::app::commands::TaskId;
use crate::model::{ActuatorCommand, ActuatorId, CommandSource, DerivedFlags, DesiredState, ReadingSet};

/// Monotonic failure counters, logged on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopCounters {
    pub sensor_faults: u64,
    pub actuator_faults: u64,
    pub publish_failures: u64,
    /// Inbound messages dropped for any reason, rate limiting included.
    pub dropped_commands: u64,
    pub rate_limited: u64,
    pub overruns: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// Last successfully applied state per actuator.  `None` until the
    /// driver has been initialised.
    actuators: [Option<DesiredState>; ActuatorId::COUNT],
    /// Manual overrides set by external commands, held until released.
    overrides: [Option<DesiredState>; ActuatorId::COUNT],
    /// Latest valid reading per metric.
    pub last_readings: ReadingSet,
    /// Most recent external command that reached an actuator.
    pub last_external: Option<ActuatorCommand>,
    pub flags: DerivedFlags,
    pub assigned_task: Option<TaskId>,
    /// Completed iterations.
    pub iteration: u64,
    pub counters: LoopCounters,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actuator(&self, id: ActuatorId) -> Option<DesiredState> {
        self.actuators[id.index()]
    }

    pub fn override_for(&self, id: ActuatorId) -> Option<DesiredState> {
        self.overrides[id.index()]
    }

    pub fn set_override(&mut self, id: ActuatorId, state: Option<DesiredState>) {
        self.overrides[id.index()] = state;
    }

    /// Record a command the driver accepted.
    pub fn record_applied(&mut self, cmd: &ActuatorCommand) {
        self.actuators[cmd.id.index()] = Some(cmd.desired);
        if cmd.source == CommandSource::External {
            self.overrides[cmd.id.index()] = Some(cmd.desired);
            self.last_external = Some(*cmd);
        }
    }

    /// `(id, state)` for every actuator with a known state.
    pub fn applied(&self) -> impl Iterator<Item = (ActuatorId, DesiredState)> + '_ {
        ActuatorId::ALL
            .into_iter()
            .filter_map(|id| self.actuator(id).map(|s| (id, s)))
    }
}
