//! Status payloads published once per iteration.
//!
//! [`StatusMessage`] is the typed projection of the agent state; the
//! [`StatusFormat`] for the agent kind turns it into the flat JSON the
//! dashboards consume:
//!
//! ```json
//! {"temp":23.4,"hum":41.0,"occupant":true,"zone":"Floor3_ZoneA","ts":1700000000000,
//!  "actuators":{"hvac":false,"light":true},"degraded":false}
//! {"gps":{"lat":40.712776,"lng":-74.005974},"battery":87.5,"drone":"Drone1",
//!  "ts":1700000000000,"low_battery":false,"task":"survey-7","degraded":false}
//! ```
//!
//! Temperature, humidity and battery carry one decimal place, GPS six.
//! Values that are unknown or invalid serialize as `null`.

use serde::{Deserialize, Serialize, Serializer};

use crate::config::AgentKind;
use crate::error::{ActuatorError, SensorError, TransportError};
use crate::fsm::context::AgentState;
use crate::model::{ActuatorId, DerivedFlags, DesiredState, Metric, ReadingSet, Timestamp};

// ---------------------------------------------------------------------------
// Fault reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultSource {
    Sensor,
    Actuator,
    Transport,
}

/// One failure carried in the status `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultReport {
    pub source: FaultSource,
    pub kind: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actuator: Option<ActuatorId>,
}

impl From<&SensorError> for FaultReport {
    fn from(e: &SensorError) -> Self {
        Self {
            source: FaultSource::Sensor,
            kind: e.kind.as_str().into(),
            detail: e.detail.as_str().into(),
            actuator: None,
        }
    }
}

impl From<&ActuatorError> for FaultReport {
    fn from(e: &ActuatorError) -> Self {
        Self {
            source: FaultSource::Actuator,
            kind: e.kind.as_str().into(),
            detail: e.detail.as_str().into(),
            actuator: e.actuator,
        }
    }
}

impl From<&TransportError> for FaultReport {
    fn from(e: &TransportError) -> Self {
        Self {
            source: FaultSource::Transport,
            kind: e.kind.as_str().into(),
            detail: e.detail.as_str().into(),
            actuator: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed status
// ---------------------------------------------------------------------------

/// Read-only projection of [`AgentState`] for one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub agent_id: String,
    pub timestamp: Timestamp,
    pub readings: ReadingSet,
    pub actuators: heapless::Vec<(ActuatorId, DesiredState), { ActuatorId::COUNT }>,
    pub flags: DerivedFlags,
    pub task: Option<String>,
    pub degraded: bool,
    pub faults: Vec<FaultReport>,
}

impl StatusMessage {
    pub fn from_state(agent_id: &str, state: &AgentState, faults: Vec<FaultReport>, now: Timestamp) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            timestamp: now,
            readings: state.last_readings.clone(),
            actuators: state.applied().collect(),
            flags: state.flags,
            task: state.assigned_task.as_ref().map(|t| t.as_str().to_string()),
            degraded: !faults.is_empty(),
            faults,
        }
    }

    fn actuator(&self, id: ActuatorId) -> Option<DesiredState> {
        self.actuators.iter().find(|(a, _)| *a == id).map(|(_, s)| *s)
    }
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFormat {
    Building,
    Drone,
}

impl StatusFormat {
    pub fn for_kind(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Building => Self::Building,
            AgentKind::Drone => Self::Drone,
        }
    }

    pub fn encode(self, msg: &StatusMessage) -> Result<Vec<u8>, TransportError> {
        let encoded = match self {
            Self::Building => serde_json::to_vec(&BuildingStatus::from(msg)),
            Self::Drone => serde_json::to_vec(&DroneStatus::from(msg)),
        };
        encoded.map_err(|e| TransportError::publish_failed(&e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActuatorStates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hvac: Option<DesiredState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<DesiredState>,
}

/// Building zone status payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingStatus {
    #[serde(serialize_with = "one_decimal")]
    pub temp: Option<f64>,
    #[serde(serialize_with = "one_decimal")]
    pub hum: Option<f64>,
    pub occupant: Option<bool>,
    pub zone: String,
    pub ts: Timestamp,
    pub actuators: ActuatorStates,
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FaultReport>,
}

impl From<&StatusMessage> for BuildingStatus {
    fn from(msg: &StatusMessage) -> Self {
        Self {
            temp: msg.readings.valid_value(Metric::Temperature),
            hum: msg.readings.valid_value(Metric::Humidity),
            occupant: msg.flags.occupant,
            zone: msg.agent_id.clone(),
            ts: msg.timestamp,
            actuators: ActuatorStates {
                hvac: msg.actuator(ActuatorId::Hvac),
                light: msg.actuator(ActuatorId::Light),
            },
            degraded: msg.degraded,
            errors: msg.faults.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    #[serde(serialize_with = "six_decimals")]
    pub lat: f64,
    #[serde(serialize_with = "six_decimals")]
    pub lng: f64,
}

/// Drone status payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneStatus {
    pub gps: Option<GpsFix>,
    #[serde(serialize_with = "one_decimal")]
    pub battery: Option<f64>,
    pub drone: String,
    pub ts: Timestamp,
    pub low_battery: Option<bool>,
    pub task: Option<String>,
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FaultReport>,
}

impl From<&StatusMessage> for DroneStatus {
    fn from(msg: &StatusMessage) -> Self {
        let lat = msg.readings.valid_value(Metric::Latitude);
        let lng = msg.readings.valid_value(Metric::Longitude);
        Self {
            gps: lat.zip(lng).map(|(lat, lng)| GpsFix { lat, lng }),
            battery: msg.readings.valid_value(Metric::Battery),
            drone: msg.agent_id.clone(),
            ts: msg.timestamp,
            low_battery: msg.flags.low_battery,
            task: msg.task.clone(),
            degraded: msg.degraded,
            errors: msg.faults.clone(),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

fn one_decimal<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => s.serialize_some(&round_to(*v, 1)),
        None => s.serialize_none(),
    }
}

fn six_decimals<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(round_to(*value, 6))
}
