//! Outbound application events.
//!
//! The [`ControlLoop`](super::service::ControlLoop) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them; the stock one logs them.

use core::fmt;

use crate::config::SafeStatePolicy;
use crate::error::{ActuatorError, SensorError, TransportError};
use crate::fsm::LoopPhase;
use crate::fsm::context::LoopCounters;
use crate::model::ActuatorId;

use super::commands::ExternalCommand;

/// Why an inbound message never reached the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Payload could not be parsed.
    Malformed(TransportError),
    /// Target names another zone or drone.
    NotAddressed,
    /// Target names an actuator this agent does not own.
    UnknownActuator(ActuatorId),
    /// Inbound flood guard had no tokens left.
    RateLimited,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "{e}"),
            Self::NotAddressed => f.write_str("not addressed to this agent"),
            Self::UnknownActuator(id) => write!(f, "unknown actuator {id}"),
            Self::RateLimited => f.write_str("rate limited"),
        }
    }
}

/// Structured events emitted by the control loop.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The loop reached `Idle` for the first time.
    Started { agent_id: String },

    /// The loop moved between phases.
    PhaseChanged { from: LoopPhase, to: LoopPhase },

    /// An inbound command was folded into the pending set.
    CommandAccepted(ExternalCommand),

    /// An inbound message was dropped.
    CommandDropped { topic: String, reason: DropReason },

    SensorFault(SensorError),
    ActuatorFault(ActuatorError),
    PublishFailed(TransportError),

    /// One iteration finished and its status went out (or failed to).
    IterationCompleted {
        iteration: u64,
        degraded: bool,
        elapsed_ms: u64,
    },

    /// An iteration ran past its tick deadline.
    Overrun { late_by_ms: u64, skipped_ticks: u64 },

    /// Actuators were released to the safe state on shutdown.
    SafeStateApplied { policy: SafeStatePolicy, failures: usize },

    /// Terminal: the loop will not tick again.
    Stopped { iterations: u64, counters: LoopCounters },
}
