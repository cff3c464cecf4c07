//! Zone agent entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │                                                               │
//! │  HardwareAdapter     BrokerClient     LogEventSink  SystemClock│
//! │  (Sensor+Actuator)   (CommandChannel) (EventSink)   (Clock)   │
//! │                                                               │
//! │  ──────────────── Port Trait Boundary ──────────────────      │
//! │                                                               │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │            ControlLoop (pure logic)                     │  │
//! │  │  Fsm · Policy · AgentState                              │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │                                                               │
//! │  Ticker + Shutdown (scheduler) · operator console thread      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Configuration comes from the environment (see `config`).  The operator
//! console reads `<topic> <json>` lines from stdin and injects them as
//! remote publishes; `stop` or end of input shuts the agent down.

#![deny(unused_must_use)]

use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{info, warn};

use zoneagent::adapters::broker::{BrokerClient, MemoryBroker};
use zoneagent::adapters::hardware::{HardwareAdapter, NoActuators};
use zoneagent::adapters::log_sink::LogEventSink;
use zoneagent::adapters::time::SystemClock;
use zoneagent::app::ports::{ActuatorDriver, SensorReader};
use zoneagent::app::service::{ControlLoop, LoopSettings};
use zoneagent::config::{AgentConfig, AgentKind};
use zoneagent::control::{Policy, TelemetryPolicy, ThresholdPolicy};
use zoneagent::drivers::relay::RelayBank;
use zoneagent::drivers::sim_pin::SimPin;
use zoneagent::model::ActuatorId;
use zoneagent::scheduler::{Shutdown, Ticker};
use zoneagent::sensors::{SimClimateSensor, SimTelemetrySensor};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── 2. Configuration ──────────────────────────────────────
    let config = AgentConfig::load().context("invalid agent configuration")?;

    info!("╔══════════════════════════════════════╗");
    info!("║  zoneagent v{}", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    info!(
        "{:?} agent {} | broker {}:{} | every {:?}",
        config.kind,
        config.agent_id,
        config.broker.host,
        config.broker.port,
        config.poll_interval()
    );

    // ── 3. Broker session + shutdown signal ───────────────────
    let broker = MemoryBroker::new();
    let client = broker.connect(&config.agent_id);
    let shutdown = Arc::new(Shutdown::new());

    if config.console {
        spawn_console(broker.clone(), Arc::clone(&shutdown))?;
    } else {
        info!("console disabled");
    }

    // ── 4. Hardware + policy per agent kind ───────────────────
    match config.kind {
        AgentKind::Building => {
            let sensor = SimClimateSensor::new(config.dht_gpio, config.sensor_timeout(), SystemClock);
            let relays = RelayBank::new()
                .with_relay(ActuatorId::Hvac, config.hvac_gpio, SimPin::new(config.hvac_gpio))
                .with_relay(ActuatorId::Light, config.light_gpio, SimPin::new(config.light_gpio));
            let policy = ThresholdPolicy::new(config.thresholds);
            run_agent(HardwareAdapter::new(sensor, relays), client, policy, &config, &shutdown)
        }
        AgentKind::Drone => {
            let sensor = SimTelemetrySensor::new(config.sensor_timeout(), SystemClock);
            sensor.set_drain(0.5);
            let policy = TelemetryPolicy::new(config.thresholds.low_battery_pct);
            run_agent(HardwareAdapter::new(sensor, NoActuators), client, policy, &config, &shutdown)
        }
    }
}

// ── Control loop ──────────────────────────────────────────────

fn run_agent<H, P>(hw: H, client: BrokerClient, policy: P, config: &AgentConfig, shutdown: &Shutdown) -> Result<()>
where
    H: SensorReader + ActuatorDriver,
    P: Policy,
{
    let mut sink = LogEventSink::new();
    let settings = LoopSettings::from_config(config);
    let mut control = ControlLoop::start(hw, client, policy, SystemClock, settings, &mut sink)
        .context("agent failed to start")?;

    let mut ticker = Ticker::new(config.poll_interval(), Instant::now());
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let report = futures_lite::future::block_on(executor.run(control.run(&mut ticker, shutdown, &mut sink)));

    if !report.is_clean() {
        warn!("{} actuator(s) could not be released to the safe state", report.failures.len());
    }
    info!("agent stopped");
    Ok(())
}

// ── Operator console ──────────────────────────────────────────

fn spawn_console(broker: MemoryBroker, shutdown: Arc<Shutdown>) -> Result<()> {
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("stop") {
                    break;
                }
                match line.split_once(char::is_whitespace) {
                    Some((topic, payload)) => {
                        let delivered = broker.inject(topic, payload.trim().as_bytes());
                        info!("console: {topic} -> {delivered} subscriber(s)");
                    }
                    None => warn!("console: expected `<topic> <json>` or `stop`"),
                }
            }
            info!("console closed, requesting shutdown");
            shutdown.request();
        })
        .context("failed to spawn console thread")?;
    Ok(())
}
