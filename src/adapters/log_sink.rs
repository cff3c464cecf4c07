//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as a single
//! tagged log record.  Routine per-phase noise goes to `debug`.

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { agent_id } => info!("START | agent={agent_id}"),
            AppEvent::PhaseChanged { from, to } => debug!("PHASE | {from} -> {to}"),
            AppEvent::CommandAccepted(cmd) => info!("CMD   | accepted {cmd:?}"),
            AppEvent::CommandDropped { topic, reason } => {
                warn!("CMD   | dropped on {topic}: {reason}");
            }
            AppEvent::SensorFault(e) => warn!("FAULT | sensor {e}"),
            AppEvent::ActuatorFault(e) => warn!("FAULT | actuator {e}"),
            AppEvent::PublishFailed(e) => warn!("FAULT | publish {e}"),
            AppEvent::IterationCompleted {
                iteration,
                degraded,
                elapsed_ms,
            } => {
                debug!(
                    "TICK  | #{iteration} {} in {elapsed_ms}ms",
                    if *degraded { "DEGRADED" } else { "ok" }
                );
            }
            AppEvent::Overrun {
                late_by_ms,
                skipped_ticks,
            } => warn!("TICK  | overrun by {late_by_ms}ms, {skipped_ticks} tick(s) skipped"),
            AppEvent::SafeStateApplied { policy, failures } => {
                if *failures == 0 {
                    info!("SAFE  | {policy:?} applied");
                } else {
                    error!("SAFE  | {policy:?} applied with {failures} failure(s)");
                }
            }
            AppEvent::Stopped { iterations, counters } => {
                info!(
                    "STOP  | iterations={iterations} sensor_faults={} actuator_faults={} \
                     publish_failures={} dropped={} rate_limited={} overruns={}",
                    counters.sensor_faults,
                    counters.actuator_faults,
                    counters.publish_failures,
                    counters.dropped_commands,
                    counters.rate_limited,
                    counters.overruns,
                );
            }
        }
    }
}
