//! Wiring shared by the integration tests: a control loop on mock hardware,
//! an in-memory broker and a manual clock.

use std::time::Instant;

use zoneagent::adapters::broker::{BrokerClient, MemoryBroker};
use zoneagent::adapters::time::ManualClock;
use zoneagent::app::service::{ControlLoop, IterationReport, LoopSettings};
use zoneagent::app::status::{BuildingStatus, DroneStatus};
use zoneagent::config::AgentConfig;
use zoneagent::control::{Policy, TelemetryPolicy, ThresholdPolicy};
use zoneagent::error::StartupError;
use zoneagent::safety::SafeStateReport;
use zoneagent::scheduler::{Shutdown, Ticker};

use super::mock_hw::{MockHardware, RecordingSink};

pub const ZONE: &str = "Floor3_ZoneA";
pub const ZONE_COMMANDS: &str = "building/commands/Floor3_ZoneA";
pub const ZONE_STATUS: &str = "building/status/Floor3_ZoneA";
pub const DRONE_TASKS: &str = "drone/tasks";
pub const DRONE_STATUS: &str = "Drone1/status";

/// Wall-clock start of every test, in epoch ms.
pub const T0: u64 = 1_700_000_000_000;

pub struct Harness<P: Policy> {
    pub agent: ControlLoop<MockHardware, BrokerClient, P, ManualClock>,
    pub broker: MemoryBroker,
    pub clock: ManualClock,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl<P: Policy> Harness<P> {
    pub fn try_start(
        hw: MockHardware,
        policy: P,
        settings: LoopSettings,
        broker: MemoryBroker,
        clock: ManualClock,
    ) -> Result<Self, StartupError> {
        let client = broker.connect(&settings.agent_id);
        let mut sink = RecordingSink::new();
        let agent = ControlLoop::start(hw, client, policy, clock.clone(), settings, &mut sink)?;
        Ok(Self {
            agent,
            broker,
            clock,
            sink,
        })
    }

    pub fn iterate(&mut self) -> IterationReport {
        self.agent.iterate(&mut self.sink)
    }

    pub fn send(&self, topic: &str, payload: &str) -> usize {
        self.broker.inject(topic, payload.as_bytes())
    }

    pub fn hw(&self) -> &MockHardware {
        self.agent.hardware()
    }

    pub fn hw_mut(&mut self) -> &mut MockHardware {
        self.agent.hardware_mut()
    }

    /// Run the async loop to completion on a local executor.
    pub fn run(&mut self, shutdown: &Shutdown) -> SafeStateReport {
        let mut ticker = Ticker::new(self.agent.settings().poll_interval, Instant::now());
        let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
        futures_lite::future::block_on(executor.run(self.agent.run(&mut ticker, shutdown, &mut self.sink)))
    }

    pub fn last_building_status(&self) -> BuildingStatus {
        let payloads = self.broker.published_on(ZONE_STATUS);
        let last = payloads.last().expect("no building status published");
        serde_json::from_slice(last).expect("building status is valid JSON")
    }

    pub fn last_drone_status(&self) -> DroneStatus {
        let payloads = self.broker.published_on(DRONE_STATUS);
        let last = payloads.last().expect("no drone status published");
        serde_json::from_slice(last).expect("drone status is valid JSON")
    }
}

pub fn building_settings() -> LoopSettings {
    LoopSettings::from_config(&AgentConfig::building())
}

pub fn drone_settings() -> LoopSettings {
    LoopSettings::from_config(&AgentConfig::drone())
}

pub fn building(hw: MockHardware) -> Harness<ThresholdPolicy> {
    building_with(hw, building_settings())
}

pub fn building_with(hw: MockHardware, settings: LoopSettings) -> Harness<ThresholdPolicy> {
    let clock = ManualClock::new(T0);
    let broker = MemoryBroker::with_clock(clock.clone());
    let policy = ThresholdPolicy::new(AgentConfig::building().thresholds);
    Harness::try_start(hw, policy, settings, broker, clock).expect("building agent starts")
}

pub fn drone(hw: MockHardware) -> Harness<TelemetryPolicy> {
    let clock = ManualClock::new(T0);
    let broker = MemoryBroker::with_clock(clock.clone());
    let policy = TelemetryPolicy::new(AgentConfig::drone().thresholds.low_battery_pct);
    Harness::try_start(hw, policy, drone_settings(), broker, clock).expect("drone agent starts")
}
