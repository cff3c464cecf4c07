//! DHT22 temperature/humidity sensor stand-in.
//!
//! The DHT22 reports -40..80 °C and 0..100 %RH.  Anything outside that
//! range, or a non-finite value, is a bad conversion and is returned as an
//! invalid reading rather than an error.

use std::sync::Arc;
use core::time::Duration;

use crate::app::ports::{Clock, SensorReader};
use crate::error::SensorError;
use crate::model::{Metric, Reading, ReadingSet};

use super::{AtomicF64, SimBus, SimFault};

const TEMP_RANGE_C: core::ops::RangeInclusive<f64> = -40.0..=80.0;
const HUMIDITY_RANGE_PCT: core::ops::RangeInclusive<f64> = 0.0..=100.0;

#[derive(Debug)]
struct ClimateState {
    temp_c: AtomicF64,
    humidity_pct: AtomicF64,
    bus: SimBus,
}

/// Clones share the simulated environment.
#[derive(Debug, Clone)]
pub struct SimClimateSensor<K> {
    gpio: u8,
    timeout: Duration,
    clock: K,
    state: Arc<ClimateState>,
}

impl<K: Clock> SimClimateSensor<K> {
    pub fn new(gpio: u8, timeout: Duration, clock: K) -> Self {
        Self {
            gpio,
            timeout,
            clock,
            state: Arc::new(ClimateState {
                temp_c: AtomicF64::new(22.0),
                humidity_pct: AtomicF64::new(45.0),
                bus: SimBus::default(),
            }),
        }
    }

    pub fn set(&self, temp_c: f64, humidity_pct: f64) {
        self.state.temp_c.store(temp_c);
        self.state.humidity_pct.store(humidity_pct);
    }

    pub fn set_fault(&self, fault: SimFault) {
        self.state.bus.set_fault(fault);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.bus.set_latency(latency);
    }
}

fn in_range(metric: Metric, value: f64, range: &core::ops::RangeInclusive<f64>, ts: u64) -> Reading {
    if range.contains(&value) {
        Reading::new(metric, value, ts)
    } else {
        Reading::invalid(metric, value, ts)
    }
}

impl<K: Clock> SensorReader for SimClimateSensor<K> {
    fn read(&mut self) -> Result<ReadingSet, SensorError> {
        self.state.bus.check(&format!("dht22@gpio{}", self.gpio), self.timeout)?;
        let ts = self.clock.now_ms();
        Ok([
            in_range(Metric::Temperature, self.state.temp_c.load(), &TEMP_RANGE_C, ts),
            in_range(Metric::Humidity, self.state.humidity_pct.load(), &HUMIDITY_RANGE_PCT, ts),
        ]
        .into_iter()
        .collect())
    }
}
