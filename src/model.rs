//! Value types that flow through one control-loop iteration.
//!
//! ```text
//!  SensorReader ──▶ ReadingSet ──▶ Policy ──▶ ActuatorCommand ──▶ ActuatorDriver
//! ```
//!
//! Readings are immutable once produced and are discarded after the
//! iteration that consumed them.  Actuator commands are superseded by the
//! next command for the same [`ActuatorId`].

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Milliseconds since the UNIX epoch.
pub type Timestamp = u64;

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Physical quantity carried by a [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Air temperature (°C).
    Temperature,
    /// Relative humidity (%).
    Humidity,
    /// GPS latitude (decimal degrees).
    Latitude,
    /// GPS longitude (decimal degrees).
    Longitude,
    /// Battery state of charge (%).
    Battery,
}

impl Metric {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temp",
            Self::Humidity => "hum",
            Self::Latitude => "lat",
            Self::Longitude => "lng",
            Self::Battery => "battery",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub metric: Metric,
    pub value: f64,
    pub timestamp: Timestamp,
    /// `false` when the value must not drive any decision.
    pub valid: bool,
}

impl Reading {
    /// A reading whose validity follows from the value being finite.
    pub fn new(metric: Metric, value: f64, timestamp: Timestamp) -> Self {
        Self {
            metric,
            value,
            timestamp,
            valid: value.is_finite(),
        }
    }

    /// A reading the sensor produced but could not vouch for.
    pub fn invalid(metric: Metric, value: f64, timestamp: Timestamp) -> Self {
        Self {
            metric,
            value,
            timestamp,
            valid: false,
        }
    }
}

/// Maximum number of distinct metrics one sensor read can return.
pub const MAX_READINGS: usize = 8;

/// The readings produced by one [`SensorReader::read`](crate::app::ports::SensorReader::read)
/// call, at most one per [`Metric`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingSet {
    readings: heapless::Vec<Reading, MAX_READINGS>,
}

impl ReadingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reading, replacing any previous reading of the same metric.
    /// Returns `false` if the set is full.
    pub fn push(&mut self, reading: Reading) -> bool {
        if let Some(slot) = self.readings.iter_mut().find(|r| r.metric == reading.metric) {
            *slot = reading;
            return true;
        }
        self.readings.push(reading).is_ok()
    }

    pub fn get(&self, metric: Metric) -> Option<&Reading> {
        self.readings.iter().find(|r| r.metric == metric)
    }

    /// Value of `metric` if present and valid.
    pub fn valid_value(&self, metric: Metric) -> Option<f64> {
        self.get(metric).filter(|r| r.valid).map(|r| r.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// True if no reading in the set is usable.
    pub fn all_invalid(&self) -> bool {
        self.readings.iter().all(|r| !r.valid)
    }

    /// Mark every reading taken before `cutoff` as invalid.
    /// Returns the number of readings that expired.
    pub fn expire_older_than(&mut self, cutoff: Timestamp) -> usize {
        let mut expired = 0;
        for r in self.readings.iter_mut().filter(|r| r.valid && r.timestamp < cutoff) {
            r.valid = false;
            expired += 1;
        }
        expired
    }

    /// Fold the valid readings of `fresh` into this set (last-known-good).
    pub fn absorb(&mut self, fresh: &ReadingSet) {
        for r in fresh.iter().filter(|r| r.valid) {
            self.push(*r);
        }
    }
}

impl FromIterator<Reading> for ReadingSet {
    fn from_iter<I: IntoIterator<Item = Reading>>(iter: I) -> Self {
        let mut set = Self::new();
        for r in iter {
            set.push(r);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Every actuator a zone agent can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ActuatorId {
    Hvac = 0,
    Light = 1,
}

impl ActuatorId {
    /// Number of actuator ids; sizes per-actuator arrays.
    pub const COUNT: usize = 2;

    pub const ALL: [ActuatorId; Self::COUNT] = [Self::Hvac, Self::Light];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Hvac => "hvac",
            Self::Light => "light",
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActuatorId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hvac" => Ok(Self::Hvac),
            "light" | "lights" | "lighting" => Ok(Self::Light),
            _ => Err(()),
        }
    }
}

/// Requested output of an actuator.
///
/// Serialized as `true`/`false` for switches and as a bare number for levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StateRepr", into = "StateRepr")]
pub enum DesiredState {
    Off,
    On,
    /// Analog level, 0–100 %.
    Level(u8),
}

impl DesiredState {
    pub const fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    /// Level clamped to 0–100, with 0 folded into `Off`.
    pub fn level(pct: u8) -> Self {
        match pct.min(100) {
            0 => Self::Off,
            p => Self::Level(p),
        }
    }

    pub const fn is_on(self) -> bool {
        match self {
            Self::Off => false,
            Self::On => true,
            Self::Level(p) => p > 0,
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
            Self::Level(p) => write!(f, "{p}%"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StateRepr {
    Switch(bool),
    Level(u8),
}

impl From<StateRepr> for DesiredState {
    fn from(repr: StateRepr) -> Self {
        match repr {
            StateRepr::Switch(on) => Self::from_bool(on),
            StateRepr::Level(p) => Self::level(p),
        }
    }
}

impl From<DesiredState> for StateRepr {
    fn from(state: DesiredState) -> Self {
        match state {
            DesiredState::Off => Self::Switch(false),
            DesiredState::On => Self::Switch(true),
            DesiredState::Level(p) => Self::Level(p),
        }
    }
}

/// Who asked for an actuator change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    Policy,
    External,
    SafeState,
}

/// One request to drive one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub id: ActuatorId,
    pub desired: DesiredState,
    pub source: CommandSource,
    pub issued_at: Timestamp,
}

impl ActuatorCommand {
    pub fn new(id: ActuatorId, desired: DesiredState, source: CommandSource, issued_at: Timestamp) -> Self {
        Self {
            id,
            desired,
            source,
            issued_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived flags
// ---------------------------------------------------------------------------

/// Booleans a policy derives from readings.  `None` means "could not be
/// derived this iteration"; the previous value is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedFlags {
    pub occupant: Option<bool>,
    pub low_battery: Option<bool>,
}

impl DerivedFlags {
    /// Overwrite every flag `fresh` was able to derive.
    pub fn merge(&mut self, fresh: DerivedFlags) {
        if fresh.occupant.is_some() {
            self.occupant = fresh.occupant;
        }
        if fresh.low_battery.is_some() {
            self.low_battery = fresh.low_battery;
        }
    }
}
