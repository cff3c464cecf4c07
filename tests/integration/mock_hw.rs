//! Mock hardware and event sink for integration tests.
//!
//! `MockHardware` plays back scripted sensor reads and records every
//! actuator call so tests can assert on the full command history without
//! touching GPIO.

use std::collections::VecDeque;
use std::sync::Arc;

use zoneagent::app::events::AppEvent;
use zoneagent::app::ports::{ActuatorDriver, EventSink, SensorReader};
use zoneagent::error::{ActuatorError, SensorError};
use zoneagent::model::{ActuatorCommand, ActuatorId, DesiredState, Metric, Reading, ReadingSet};
use zoneagent::scheduler::Shutdown;

// ── Reading helpers ───────────────────────────────────────────

pub fn climate(temp: f64, hum: f64, ts: u64) -> ReadingSet {
    [
        Reading::new(Metric::Temperature, temp, ts),
        Reading::new(Metric::Humidity, hum, ts),
    ]
    .into_iter()
    .collect()
}

pub fn telemetry(lat: f64, lng: f64, battery: f64, ts: u64) -> ReadingSet {
    [
        Reading::new(Metric::Latitude, lat, ts),
        Reading::new(Metric::Longitude, lng, ts),
        Reading::new(Metric::Battery, battery, ts),
    ]
    .into_iter()
    .collect()
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    owned: Vec<ActuatorId>,
    /// Played back in order; the last entry repeats once the script runs out.
    script: VecDeque<Result<ReadingSet, SensorError>>,
    last: Result<ReadingSet, SensorError>,
    /// Every apply attempt, failed ones included.
    pub calls: Vec<ActuatorCommand>,
    /// Commands the mock accepted.
    pub accepted: Vec<ActuatorCommand>,
    pub reads: usize,
    failing: Vec<ActuatorId>,
    init_error: Option<ActuatorError>,
    /// Requested from inside `read`, i.e. partway through an iteration.
    shutdown_on_read: Option<Arc<Shutdown>>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new(owned: &[ActuatorId]) -> Self {
        Self {
            owned: owned.to_vec(),
            script: VecDeque::new(),
            last: Ok(ReadingSet::new()),
            calls: Vec::new(),
            accepted: Vec::new(),
            reads: 0,
            failing: Vec::new(),
            init_error: None,
            shutdown_on_read: None,
        }
    }

    pub fn building() -> Self {
        Self::new(&ActuatorId::ALL)
    }

    pub fn drone() -> Self {
        Self::new(&[])
    }

    pub fn push_reading(&mut self, readings: ReadingSet) {
        self.script.push_back(Ok(readings));
    }

    pub fn push_error(&mut self, err: SensorError) {
        self.script.push_back(Err(err));
    }

    pub fn fail_actuator(&mut self, id: ActuatorId, failing: bool) {
        self.failing.retain(|f| *f != id);
        if failing {
            self.failing.push(id);
        }
    }

    pub fn fail_init(&mut self, err: ActuatorError) {
        self.init_error = Some(err);
    }

    pub fn request_shutdown_on_read(&mut self, shutdown: Arc<Shutdown>) {
        self.shutdown_on_read = Some(shutdown);
    }

    /// Last state the driver accepted for `id`.
    pub fn state_of(&self, id: ActuatorId) -> Option<DesiredState> {
        self.accepted.iter().rev().find(|c| c.id == id).map(|c| c.desired)
    }

    pub fn calls_for(&self, id: ActuatorId) -> Vec<ActuatorCommand> {
        self.calls.iter().filter(|c| c.id == id).copied().collect()
    }
}

impl SensorReader for MockHardware {
    fn read(&mut self) -> Result<ReadingSet, SensorError> {
        self.reads += 1;
        if let Some(shutdown) = &self.shutdown_on_read {
            shutdown.request();
        }
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last.clone()
    }
}

impl ActuatorDriver for MockHardware {
    fn actuators(&self) -> &[ActuatorId] {
        &self.owned
    }

    fn init(&mut self) -> Result<(), ActuatorError> {
        match self.init_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply(&mut self, cmd: &ActuatorCommand) -> Result<(), ActuatorError> {
        self.calls.push(*cmd);
        if self.failing.contains(&cmd.id) {
            return Err(ActuatorError::hardware(Some(cmd.id), "relay stuck"));
        }
        self.accepted.push(*cmd);
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
