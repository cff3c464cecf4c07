//! Integration tests for the ControlLoop → policy → actuators → status
//! pipeline.
//!
//! Every test drives single iterations by hand against `MockHardware` and an
//! in-memory broker, then asserts on the actuator history and on the status
//! payload that went out.

use zoneagent::adapters::broker::MemoryBroker;
use zoneagent::adapters::time::ManualClock;
use zoneagent::app::events::{AppEvent, DropReason};
use zoneagent::app::status::FaultSource;
use zoneagent::control::ThresholdPolicy;
use zoneagent::config::AgentConfig;
use zoneagent::error::{ActuatorError, SensorError, StartupError, TransportErrorKind};
use zoneagent::fsm::LoopPhase;
use zoneagent::model::{ActuatorId, CommandSource, DesiredState, Metric, Reading, ReadingSet};

use super::harness::{self, DRONE_TASKS, Harness, T0, ZONE, ZONE_COMMANDS};
use super::mock_hw::{MockHardware, climate, telemetry};

fn hot_zone() -> MockHardware {
    let mut hw = MockHardware::building();
    hw.push_reading(climate(27.0, 50.0, T0));
    hw
}

// ── Normal operation ──────────────────────────────────────────

#[test]
fn startup_records_actuators_off_and_reaches_idle() {
    let h = harness::building(MockHardware::building());
    assert_eq!(h.agent.phase(), LoopPhase::Idle);
    assert_eq!(h.agent.state().actuator(ActuatorId::Hvac), Some(DesiredState::Off));
    assert_eq!(h.agent.state().actuator(ActuatorId::Light), Some(DesiredState::Off));
    assert!(matches!(h.sink.events.first(), Some(AppEvent::Started { agent_id }) if agent_id == ZONE));
}

#[test]
fn hot_zone_turns_hvac_and_lights_on() {
    let mut h = harness::building(hot_zone());
    let report = h.iterate();

    assert!(report.published);
    assert!(!report.degraded);
    assert_eq!(report.applied, 2);
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::On));
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::On));

    let status = h.last_building_status();
    assert_eq!(status.zone, ZONE);
    assert_eq!(status.temp, Some(27.0));
    assert_eq!(status.hum, Some(50.0));
    assert_eq!(status.occupant, Some(true));
    assert_eq!(status.actuators.hvac, Some(DesiredState::On));
    assert_eq!(status.ts, T0);
    assert!(!status.degraded);
    assert!(status.errors.is_empty());
}

#[test]
fn iteration_walks_every_phase_in_order() {
    let mut h = harness::building(hot_zone());
    h.sink.clear();
    h.iterate();

    let phases: Vec<LoopPhase> = h
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PhaseChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        [
            LoopPhase::Reading,
            LoopPhase::Deciding,
            LoopPhase::Actuating,
            LoopPhase::Publishing,
            LoopPhase::Idle
        ]
    );
    assert_eq!(h.agent.state().iteration, 1);
}

#[test]
fn status_is_published_every_iteration() {
    let mut h = harness::building(hot_zone());
    for _ in 0..4 {
        h.iterate();
        h.clock.advance(10_000);
    }
    assert_eq!(h.broker.published_on(harness::ZONE_STATUS).len(), 4);
    // Our own status never loops back as a command.
    assert_eq!(h.agent.state().counters.dropped_commands, 0);
}

// ── Sensor faults and stale data ──────────────────────────────

#[test]
fn sensor_timeout_publishes_degraded_status_and_leaves_actuators() {
    let mut h = harness::building(hot_zone());
    h.iterate();
    let calls_before = h.hw().calls.len();

    h.hw_mut().push_error(SensorError::timeout("dht22@gpio4: no response"));
    h.clock.advance(10_000);
    let report = h.iterate();

    assert!(report.degraded);
    assert!(report.published);
    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.faults[0].source, FaultSource::Sensor);
    assert_eq!(h.hw().calls.len(), calls_before, "no actuator writes on a sensor fault");
    assert_eq!(h.agent.phase(), LoopPhase::Idle);
    assert_eq!(h.agent.state().counters.sensor_faults, 1);

    let status = h.last_building_status();
    assert!(status.degraded);
    assert_eq!(status.errors[0].kind, "timeout");
    assert_eq!(status.actuators.hvac, Some(DesiredState::On));
}

#[test]
fn commands_wait_out_a_sensor_fault() {
    let mut h = harness::building(hot_zone());
    h.iterate();

    h.hw_mut().push_error(SensorError::hardware("bus fault"));
    h.send(ZONE_COMMANDS, r#"{"target":"hvac","action":"off"}"#);
    let report = h.iterate();
    assert_eq!(report.accepted, 1);
    assert!(!h.agent.pending().is_empty());

    h.hw_mut().push_reading(climate(27.0, 50.0, T0));
    h.iterate();
    assert!(h.agent.pending().is_empty());
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::Off));
}

#[test]
fn stale_readings_do_not_drive_decisions() {
    let mut hw = MockHardware::building();
    hw.push_reading(climate(27.0, 50.0, T0));
    let mut h = harness::building(hw);
    // Advance well past max_reading_age_ms before the first read.
    h.clock.advance(60_000);
    h.iterate();

    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::Off));
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::Off));
    let status = h.last_building_status();
    assert_eq!(status.temp, None);
    assert_eq!(status.occupant, None);
}

#[test]
fn invalid_reading_keeps_prior_actuator_state() {
    let mut h = harness::building(hot_zone());
    h.iterate();

    let garbage: ReadingSet = [
        Reading::invalid(Metric::Temperature, 250.0, T0),
        Reading::new(Metric::Humidity, f64::NAN, T0),
    ]
    .into_iter()
    .collect();
    h.hw_mut().push_reading(garbage);
    h.iterate();

    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::On));
    assert_eq!(h.agent.state().flags.occupant, Some(true));
    // Last-known-good reading is still reported.
    assert_eq!(h.last_building_status().temp, Some(27.0));
}

// ── Inbound commands ──────────────────────────────────────────

#[test]
fn malformed_payload_is_dropped_and_state_unchanged() {
    let mut h = harness::building(hot_zone());
    h.iterate();
    let before = h.agent.state().clone();

    h.send(ZONE_COMMANDS, "{not json");
    h.send(ZONE_COMMANDS, r#"{"target":"hvac","action":"set","value":250}"#);
    let report = h.iterate();

    assert_eq!(report.accepted, 0);
    assert_eq!(report.dropped, 2);
    assert_eq!(h.agent.state().counters.dropped_commands, 2);
    assert_eq!(h.agent.state().actuator(ActuatorId::Hvac), before.actuator(ActuatorId::Hvac));
    assert_eq!(h.agent.state().override_for(ActuatorId::Hvac), None);
    assert_eq!(
        h.sink.count(|e| matches!(
            e,
            AppEvent::CommandDropped { reason: DropReason::Malformed(err), .. }
                if err.kind == TransportErrorKind::MalformedMessage
        )),
        2
    );
}

#[test]
fn latest_command_for_an_actuator_wins() {
    let mut h = harness::building(hot_zone());
    h.send(ZONE_COMMANDS, r#"{"target":"hvac","action":"on"}"#);
    h.send(ZONE_COMMANDS, r#"{"target":"hvac","action":"set","value":false}"#);
    let report = h.iterate();

    assert_eq!(report.accepted, 2);
    let hvac = h.hw().calls_for(ActuatorId::Hvac);
    assert_eq!(hvac.len(), 1, "one apply per actuator per iteration");
    assert_eq!(hvac[0].desired, DesiredState::Off);
    assert_eq!(hvac[0].source, CommandSource::External);
    // Light is untouched by the hvac commands.
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::On));
}

#[test]
fn override_holds_until_auto() {
    let mut h = harness::building(hot_zone());
    h.send(ZONE_COMMANDS, r#"{"target":"light","action":"off"}"#);
    h.iterate();
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::Off));

    h.iterate();
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::Off));
    let last = *h.hw().calls_for(ActuatorId::Light).last().unwrap();
    assert_eq!(last.source, CommandSource::External);

    h.send(ZONE_COMMANDS, r#"{"target":"light","action":"auto"}"#);
    h.iterate();
    let last = *h.hw().calls_for(ActuatorId::Light).last().unwrap();
    assert_eq!(last.desired, DesiredState::On);
    assert_eq!(last.source, CommandSource::Policy);
    assert_eq!(h.agent.state().override_for(ActuatorId::Light), None);
}

#[test]
fn zone_commands_address_by_id_or_wildcard() {
    let mut h = harness::building(hot_zone());
    h.send(ZONE_COMMANDS, r#"{"target":"Floor3_ZoneA","action":"off"}"#);
    h.iterate();
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::Off));
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::Off));

    h.send(ZONE_COMMANDS, r#"{"target":"*","action":"auto"}"#);
    h.iterate();
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::On));
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::On));
}

#[test]
fn commands_for_other_zones_are_ignored() {
    let mut h = harness::building(hot_zone());
    h.send("building/commands/Floor9_ZoneC", r#"{"target":"Floor9_ZoneC","action":"off"}"#);
    let report = h.iterate();

    assert_eq!(report.dropped, 1);
    assert_eq!(h.sink.count(|e| matches!(e, AppEvent::CommandDropped { reason: DropReason::NotAddressed, .. })), 1);
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::On));
}

#[test]
fn unowned_actuator_is_rejected() {
    let mut hw = MockHardware::new(&[ActuatorId::Hvac]);
    hw.push_reading(climate(27.0, 50.0, T0));
    let mut h = harness::building(hw);
    h.send(ZONE_COMMANDS, r#"{"target":"light","action":"on"}"#);
    h.iterate();

    assert!(h.hw().calls_for(ActuatorId::Light).is_empty());
    assert_eq!(
        h.sink.count(|e| matches!(
            e,
            AppEvent::CommandDropped { reason: DropReason::UnknownActuator(ActuatorId::Light), .. }
        )),
        1
    );
}

#[test]
fn inbound_flood_is_rate_limited() {
    let mut settings = harness::building_settings();
    settings.inbound_rate_per_sec = 2;
    settings.inbound_burst = 2;
    let mut h = harness::building_with(hot_zone(), settings);

    for _ in 0..6 {
        h.send(ZONE_COMMANDS, r#"{"target":"hvac","action":"on"}"#);
    }
    let report = h.iterate();

    assert_eq!(report.accepted, 2);
    assert_eq!(report.dropped, 4);
    assert_eq!(h.agent.state().counters.rate_limited, 4);
    assert_eq!(h.agent.state().counters.dropped_commands, 4);
}

// ── Actuator and transport faults ─────────────────────────────

#[test]
fn actuator_failure_does_not_abort_the_iteration() {
    let mut h = harness::building(hot_zone());
    h.hw_mut().fail_actuator(ActuatorId::Hvac, true);
    let report = h.iterate();

    assert!(report.degraded);
    assert!(report.published);
    assert_eq!(report.applied, 1);
    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.faults[0].actuator, Some(ActuatorId::Hvac));
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::On));
    // Failed actuator keeps its last applied state.
    assert_eq!(h.agent.state().actuator(ActuatorId::Hvac), Some(DesiredState::Off));
    assert_eq!(h.agent.state().counters.actuator_faults, 1);
    assert_eq!(h.agent.phase(), LoopPhase::Idle);

    let status = h.last_building_status();
    assert!(status.degraded);
    assert_eq!(status.actuators.hvac, Some(DesiredState::Off));
    assert_eq!(status.errors[0].kind, "hardware_fault");

    h.hw_mut().fail_actuator(ActuatorId::Hvac, false);
    assert!(!h.iterate().degraded);
    assert_eq!(h.agent.state().actuator(ActuatorId::Hvac), Some(DesiredState::On));
}

#[test]
fn publish_failure_is_counted_not_fatal() {
    let mut h = harness::building(hot_zone());
    h.broker.set_publish_fault(true);
    let report = h.iterate();

    assert!(!report.published);
    assert_eq!(h.agent.state().counters.publish_failures, 1);
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::On));
    assert_eq!(h.sink.count(|e| matches!(e, AppEvent::PublishFailed(_))), 1);

    h.broker.set_publish_fault(false);
    assert!(h.iterate().published);
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn driver_init_failure_is_fatal() {
    let mut hw = MockHardware::building();
    hw.fail_init(ActuatorError::hardware(None, "gpio claim failed"));
    let clock = ManualClock::new(T0);
    let broker = MemoryBroker::with_clock(clock.clone());
    let policy = ThresholdPolicy::new(AgentConfig::building().thresholds);

    let result = Harness::try_start(hw, policy, harness::building_settings(), broker, clock);
    assert!(matches!(result.err(), Some(StartupError::DriverInitFailed(_))));
}

#[test]
fn subscribe_failure_is_fatal() {
    let clock = ManualClock::new(T0);
    let broker = MemoryBroker::with_clock(clock.clone());
    broker.set_reachable(false);
    let policy = ThresholdPolicy::new(AgentConfig::building().thresholds);

    let result = Harness::try_start(MockHardware::building(), policy, harness::building_settings(), broker, clock);
    assert!(matches!(
        result.err(),
        Some(StartupError::SubscribeFailed(e)) if e.kind == TransportErrorKind::Disconnected
    ));
}

// ── Drone ─────────────────────────────────────────────────────

#[test]
fn drone_reports_position_and_low_battery() {
    let mut hw = MockHardware::drone();
    hw.push_reading(telemetry(40.712_776, -74.005_974, 15.0, T0));
    let mut h = harness::drone(hw);
    h.iterate();

    let status = h.last_drone_status();
    assert_eq!(status.drone, "Drone1");
    let gps = status.gps.expect("gps fix");
    assert!((gps.lat - 40.712_776).abs() < 1e-9);
    assert_eq!(status.battery, Some(15.0));
    assert_eq!(status.low_battery, Some(true));
    assert!(h.hw().calls.is_empty());
}

#[test]
fn drone_task_assign_and_cancel() {
    let mut hw = MockHardware::drone();
    hw.push_reading(telemetry(40.0, -74.0, 80.0, T0));
    let mut h = harness::drone(hw);

    h.send(DRONE_TASKS, r#"{"target":"Drone1","action":"assign","value":"survey-7"}"#);
    h.iterate();
    assert_eq!(h.last_drone_status().task.as_deref(), Some("survey-7"));

    h.send(DRONE_TASKS, r#"{"target":"Drone2","action":"assign","value":"other"}"#);
    h.iterate();
    assert_eq!(h.last_drone_status().task.as_deref(), Some("survey-7"));

    h.send(DRONE_TASKS, r#"{"target":"*","action":"cancel"}"#);
    h.iterate();
    let status = h.last_drone_status();
    assert_eq!(status.task, None);
    assert_eq!(status.low_battery, Some(false));
}
