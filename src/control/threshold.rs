//! Building zone policy: HVAC on heat or humidity, lights on occupancy.

use crate::app::commands::PendingCommands;
use crate::config::ThresholdConfig;
use crate::fsm::context::AgentState;
use crate::model::{ActuatorId, DerivedFlags, DesiredState, Metric, ReadingSet, Timestamp};

use super::{Decision, Policy, resolve};

pub struct ThresholdPolicy {
    thresholds: ThresholdConfig,
}

impl ThresholdPolicy {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    /// `Some(on)` when the valid readings settle the question.
    fn hvac(&self, temp: Option<f64>, hum: Option<f64>) -> Option<DesiredState> {
        let hot = temp.map(|t| t > self.thresholds.hvac_temp_on_c);
        let humid = hum.map(|h| h > self.thresholds.hvac_humidity_on_pct);
        match (hot, humid) {
            (Some(true), _) | (_, Some(true)) => Some(DesiredState::On),
            (Some(false), Some(false)) => Some(DesiredState::Off),
            _ => None,
        }
    }
}

impl Policy for ThresholdPolicy {
    fn decide(&self, readings: &ReadingSet, prior: &AgentState, pending: &PendingCommands, now: Timestamp) -> Decision {
        let temp = readings.valid_value(Metric::Temperature);
        let hum = readings.valid_value(Metric::Humidity);
        let occupant = temp.map(|t| t > self.thresholds.occupancy_temp_c);

        let mut decision = Decision {
            flags: DerivedFlags {
                occupant,
                low_battery: None,
            },
            ..Decision::default()
        };
        decision.push(resolve(ActuatorId::Hvac, self.hvac(temp, hum), prior, pending, now));
        decision.push(resolve(
            ActuatorId::Light,
            occupant.map(DesiredState::from_bool),
            prior,
            pending,
            now,
        ));
        decision
    }
}
