//! Decision policies.
//!
//! A [`Policy`] maps the latest readings, the prior agent state and the
//! pending external commands to desired actuator states and derived flags.
//! Policies are pure: same inputs, same [`Decision`].  Time enters only
//! through the explicit `now` argument.

pub mod telemetry;
pub mod threshold;

use crate::app::commands::{ActuatorDirective, PendingCommands};
use crate::fsm::context::AgentState;
use crate::model::{ActuatorCommand, ActuatorId, CommandSource, DerivedFlags, DesiredState, ReadingSet, Timestamp};

pub use telemetry::TelemetryPolicy;
pub use threshold::ThresholdPolicy;

/// Output of one policy evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// At most one command per actuator.
    pub commands: heapless::Vec<ActuatorCommand, { ActuatorId::COUNT }>,
    pub flags: DerivedFlags,
}

impl Decision {
    pub fn command_for(&self, id: ActuatorId) -> Option<&ActuatorCommand> {
        self.commands.iter().find(|c| c.id == id)
    }

    fn push(&mut self, cmd: Option<ActuatorCommand>) {
        if let Some(cmd) = cmd {
            // One slot per actuator id; a second command for the same id replaces the first.
            match self.commands.iter_mut().find(|c| c.id == cmd.id) {
                Some(slot) => *slot = cmd,
                None => {
                    let _ = self.commands.push(cmd);
                }
            }
        }
    }
}

pub trait Policy {
    fn decide(
        &self,
        readings: &ReadingSet,
        prior: &AgentState,
        pending: &PendingCommands,
        now: Timestamp,
    ) -> Decision;
}

/// Resolve the command for one actuator.
///
/// Precedence: a pending `Set` wins, then a held manual override (unless a
/// pending `Release` drops it), then the automatic decision `auto`.  When
/// the policy could not decide, the prior applied state is re-emitted.
/// `None` only when nothing is known about the actuator.
pub fn resolve(
    id: ActuatorId,
    auto: Option<DesiredState>,
    prior: &AgentState,
    pending: &PendingCommands,
    now: Timestamp,
) -> Option<ActuatorCommand> {
    let held = match pending.actuator(id) {
        Some(ActuatorDirective::Set(state)) => {
            return Some(ActuatorCommand::new(id, state, CommandSource::External, now));
        }
        Some(ActuatorDirective::Release) => None,
        None => prior.override_for(id),
    };
    if let Some(state) = held {
        return Some(ActuatorCommand::new(id, state, CommandSource::External, now));
    }
    auto.or_else(|| prior.actuator(id))
        .map(|state| ActuatorCommand::new(id, state, CommandSource::Policy, now))
}
