//! GPS and battery telemetry stand-in for a drone companion computer.
//!
//! Each read drains the battery by a fixed step.  A latitude outside
//! ±90°, a longitude outside ±180° or a charge outside 0..100 % is returned
//! as an invalid reading.

use std::sync::Arc;
use core::time::Duration;

use crate::app::ports::{Clock, SensorReader};
use crate::error::SensorError;
use crate::model::{Metric, Reading, ReadingSet};

use super::{AtomicF64, SimBus, SimFault};

#[derive(Debug)]
struct TelemetryState {
    lat: AtomicF64,
    lng: AtomicF64,
    battery_pct: AtomicF64,
    drain_per_read_pct: AtomicF64,
    bus: SimBus,
}

/// Clones share the simulated drone.
#[derive(Debug, Clone)]
pub struct SimTelemetrySensor<K> {
    timeout: Duration,
    clock: K,
    state: Arc<TelemetryState>,
}

impl<K: Clock> SimTelemetrySensor<K> {
    pub fn new(timeout: Duration, clock: K) -> Self {
        Self {
            timeout,
            clock,
            state: Arc::new(TelemetryState {
                lat: AtomicF64::new(40.712_776),
                lng: AtomicF64::new(-74.005_974),
                battery_pct: AtomicF64::new(100.0),
                drain_per_read_pct: AtomicF64::new(0.0),
                bus: SimBus::default(),
            }),
        }
    }

    pub fn set_position(&self, lat: f64, lng: f64) {
        self.state.lat.store(lat);
        self.state.lng.store(lng);
    }

    pub fn set_battery(&self, pct: f64) {
        self.state.battery_pct.store(pct);
    }

    pub fn battery(&self) -> f64 {
        self.state.battery_pct.load()
    }

    pub fn set_drain(&self, pct_per_read: f64) {
        self.state.drain_per_read_pct.store(pct_per_read);
    }

    pub fn set_fault(&self, fault: SimFault) {
        self.state.bus.set_fault(fault);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.bus.set_latency(latency);
    }
}

fn bounded(metric: Metric, value: f64, limit: f64, ts: u64) -> Reading {
    if value.abs() <= limit {
        Reading::new(metric, value, ts)
    } else {
        Reading::invalid(metric, value, ts)
    }
}

impl<K: Clock> SensorReader for SimTelemetrySensor<K> {
    fn read(&mut self) -> Result<ReadingSet, SensorError> {
        self.state.bus.check("telemetry", self.timeout)?;
        let ts = self.clock.now_ms();

        let battery = self.state.battery_pct.load();
        let drained = (battery - self.state.drain_per_read_pct.load()).max(0.0);
        self.state.battery_pct.store(drained);

        let battery_reading = if (0.0..=100.0).contains(&battery) {
            Reading::new(Metric::Battery, battery, ts)
        } else {
            Reading::invalid(Metric::Battery, battery, ts)
        };
        Ok([
            bounded(Metric::Latitude, self.state.lat.load(), 90.0, ts),
            bounded(Metric::Longitude, self.state.lng.load(), 180.0, ts),
            battery_reading,
        ]
        .into_iter()
        .collect())
    }
}
