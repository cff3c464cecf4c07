//! Broker session loss, reconnect and queue overflow as seen by the loop.

use zoneagent::app::inbox::INBOX_DEPTH;
use zoneagent::model::{ActuatorId, DesiredState};

use super::harness::{self, T0, ZONE, ZONE_COMMANDS};
use super::mock_hw::{MockHardware, climate};

fn hot_zone() -> MockHardware {
    let mut hw = MockHardware::building();
    hw.push_reading(climate(27.0, 50.0, T0));
    hw
}

#[test]
fn unreachable_broker_degrades_publish_only() {
    let mut h = harness::building(hot_zone());
    h.iterate();

    h.broker.set_reachable(false);
    assert_eq!(h.send(ZONE_COMMANDS, r#"{"target":"hvac","action":"off"}"#), 0);
    let report = h.iterate();

    assert!(!report.published);
    assert_eq!(h.agent.state().counters.publish_failures, 1);
    // Control keeps running on local readings.
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::On));

    h.broker.set_reachable(true);
    assert!(h.iterate().published);
    assert_eq!(h.broker.subscription_count(), 1);
}

#[test]
fn dropped_session_is_resubscribed_on_next_iteration() {
    let mut h = harness::building(hot_zone());
    h.iterate();

    h.broker.disconnect(ZONE);
    assert_eq!(h.send(ZONE_COMMANDS, r#"{"target":"hvac","action":"off"}"#), 0, "lost while down");

    assert!(h.iterate().published);
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::On));

    assert_eq!(h.send(ZONE_COMMANDS, r#"{"target":"hvac","action":"off"}"#), 1);
    let report = h.iterate();
    assert_eq!(report.accepted, 1);
    assert_eq!(h.hw().state_of(ActuatorId::Hvac), Some(DesiredState::Off));
}

#[test]
fn full_inbox_drops_overflow_at_the_broker() {
    let mut settings = harness::building_settings();
    settings.inbound_rate_per_sec = 100;
    settings.inbound_burst = 100;
    let mut h = harness::building_with(hot_zone(), settings);

    let sent = INBOX_DEPTH + 4;
    for _ in 0..sent {
        h.send(ZONE_COMMANDS, r#"{"target":"light","action":"on"}"#);
    }
    assert_eq!(h.broker.dropped(), 4);

    let report = h.iterate();
    assert_eq!(report.accepted, INBOX_DEPTH);
    assert_eq!(report.dropped, 0);
    assert!(h.agent.pending().is_empty());
}

#[test]
fn status_goes_out_on_the_configured_topic() {
    let mut h = harness::building(hot_zone());
    h.iterate();
    let published = h.broker.published();
    let status = published.last().unwrap();
    assert_eq!(status.topic, harness::ZONE_STATUS);
    assert_eq!(status.client_id.as_deref(), Some(ZONE));
    assert_eq!(status.at, T0);
}
