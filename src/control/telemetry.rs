//! Drone policy: no automatic actuation, only the low-battery flag.

use crate::app::commands::PendingCommands;
use crate::fsm::context::AgentState;
use crate::model::{ActuatorId, DerivedFlags, Metric, ReadingSet, Timestamp};

use super::{Decision, Policy, resolve};

pub struct TelemetryPolicy {
    low_battery_pct: f64,
}

impl TelemetryPolicy {
    pub fn new(low_battery_pct: f64) -> Self {
        Self { low_battery_pct }
    }
}

impl Policy for TelemetryPolicy {
    fn decide(&self, readings: &ReadingSet, prior: &AgentState, pending: &PendingCommands, now: Timestamp) -> Decision {
        let mut decision = Decision {
            flags: DerivedFlags {
                occupant: None,
                low_battery: readings
                    .valid_value(Metric::Battery)
                    .map(|pct| pct < self.low_battery_pct),
            },
            ..Decision::default()
        };
        // External commands still reach any actuator the drone has been given.
        for id in ActuatorId::ALL {
            if prior.actuator(id).is_some() {
                decision.push(resolve(id, None, prior, pending, now));
            }
        }
        decision
    }
}
