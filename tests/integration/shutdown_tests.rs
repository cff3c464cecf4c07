//! Scheduler-driven runs and the shutdown path.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use zoneagent::app::events::AppEvent;
use zoneagent::config::SafeStatePolicy;
use zoneagent::fsm::LoopPhase;
use zoneagent::model::{ActuatorId, CommandSource, DesiredState};
use zoneagent::scheduler::Shutdown;

use super::harness::{self, T0};
use super::mock_hw::{MockHardware, climate};

fn fast_settings() -> zoneagent::app::service::LoopSettings {
    let mut settings = harness::building_settings();
    settings.poll_interval = Duration::from_millis(10);
    settings
}

fn hot_zone() -> MockHardware {
    let mut hw = MockHardware::building();
    hw.push_reading(climate(27.0, 50.0, T0));
    hw
}

#[test]
fn iteration_limit_stops_and_releases_to_off() {
    let mut settings = fast_settings();
    settings.max_iterations = Some(3);
    let mut h = harness::building_with(hot_zone(), settings);

    let report = h.run(&Shutdown::new());

    assert!(report.is_clean());
    assert_eq!(h.hw().reads, 3);
    assert_eq!(h.agent.phase(), LoopPhase::Stopped);
    for id in ActuatorId::ALL {
        let last = *h.hw().calls_for(id).last().unwrap();
        assert_eq!(last.desired, DesiredState::Off);
        assert_eq!(last.source, CommandSource::SafeState);
    }
    assert!(matches!(
        h.sink.events.last(),
        Some(AppEvent::Stopped { iterations: 3, .. })
    ));
}

#[test]
fn shutdown_before_first_tick_runs_no_iteration() {
    let mut h = harness::building_with(hot_zone(), fast_settings());
    let shutdown = Shutdown::new();
    shutdown.request();

    let report = h.run(&shutdown);

    assert_eq!(h.hw().reads, 0);
    assert_eq!(report.applied.len(), 2);
    assert!(h.broker.published_on(harness::ZONE_STATUS).is_empty());
    assert_eq!(h.agent.phase(), LoopPhase::Stopped);
}

#[test]
fn shutdown_from_another_thread_wakes_the_wait() {
    let mut settings = fast_settings();
    settings.poll_interval = Duration::from_secs(60);
    let mut h = harness::building_with(hot_zone(), settings);
    let shutdown = Arc::new(Shutdown::new());

    let trigger = Arc::clone(&shutdown);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        trigger.request();
    });
    let report = h.run(&shutdown);
    handle.join().unwrap();

    // One tick ran, then the loop slept until shutdown cut the wait short.
    assert_eq!(h.hw().reads, 1);
    assert!(report.is_clean());
    assert_eq!(h.agent.phase(), LoopPhase::Stopped);
}

#[test]
fn shutdown_during_an_iteration_lets_it_finish() {
    let mut settings = fast_settings();
    settings.poll_interval = Duration::from_secs(60);
    let shutdown = Arc::new(Shutdown::new());
    let mut hw = hot_zone();
    hw.request_shutdown_on_read(Arc::clone(&shutdown));
    let mut h = harness::building_with(hw, settings);

    let report = h.run(&shutdown);

    // The cycle in flight decided, applied and published before the release.
    assert_eq!(h.hw().reads, 1);
    assert_eq!(h.broker.published_on(harness::ZONE_STATUS).len(), 1);
    let hvac = h.hw().calls_for(ActuatorId::Hvac);
    assert_eq!(hvac.len(), 2);
    assert_eq!((hvac[0].desired, hvac[0].source), (DesiredState::On, CommandSource::Policy));
    assert_eq!((hvac[1].desired, hvac[1].source), (DesiredState::Off, CommandSource::SafeState));
    assert_eq!(h.hw().state_of(ActuatorId::Light), Some(DesiredState::Off));
    assert_eq!(
        report.applied.as_slice(),
        &[(ActuatorId::Hvac, DesiredState::Off), (ActuatorId::Light, DesiredState::Off)]
    );
    assert_eq!(h.agent.phase(), LoopPhase::Stopped);
}

#[test]
fn last_known_good_reapplies_applied_state() {
    let mut settings = fast_settings();
    settings.max_iterations = Some(1);
    settings.safe_state = SafeStatePolicy::LastKnownGood;
    let mut h = harness::building_with(hot_zone(), settings);

    let report = h.run(&Shutdown::new());

    assert_eq!(report.policy, SafeStatePolicy::LastKnownGood);
    let last = *h.hw().calls_for(ActuatorId::Hvac).last().unwrap();
    assert_eq!(last.desired, DesiredState::On);
    assert_eq!(last.source, CommandSource::SafeState);
}

#[test]
fn failing_actuator_does_not_block_release_of_the_rest() {
    let mut h = harness::building(hot_zone());
    h.iterate();
    h.hw_mut().fail_actuator(ActuatorId::Light, true);

    let report = h.agent.shutdown(&mut h.sink);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].actuator, Some(ActuatorId::Light));
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::Off));
    assert!(matches!(
        h.sink.events.iter().rev().nth(1),
        Some(AppEvent::PhaseChanged { to: LoopPhase::Stopped, .. })
    ));
}

#[test]
fn shutdown_is_idempotent() {
    let mut h = harness::building(hot_zone());
    h.iterate();
    let first = h.agent.shutdown(&mut h.sink);
    let calls = h.hw().calls.len();

    let second = h.agent.shutdown(&mut h.sink);

    assert_eq!(first.applied.len(), 2);
    assert!(second.applied.is_empty());
    assert_eq!(h.hw().calls.len(), calls);
}
