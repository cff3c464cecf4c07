//! Port traits: the hexagonal boundary between the control loop and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! Sensors, actuators, the broker session, the event sink and the clock are
//! all reached through these traits.  The
//! [`ControlLoop`](super::service::ControlLoop) consumes them via generics,
//! so the domain core never touches hardware or sockets directly.
//!
//! All port errors are typed; callers handle every variant explicitly.

use crate::error::{ActuatorError, SensorError, TransportError};
use crate::model::{ActuatorCommand, ActuatorId, ReadingSet, Timestamp};

use super::inbox::Inbox;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per iteration.
pub trait SensorReader {
    /// Read every sensor.
    ///
    /// Bounded by the sensor timeout; on timeout or hardware fault returns a
    /// [`SensorError`].  No internal retry.
    fn read(&mut self) -> Result<ReadingSet, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to drive outputs.
pub trait ActuatorDriver {
    /// Actuators this driver owns.  Empty for telemetry-only agents.
    fn actuators(&self) -> &[ActuatorId];

    /// Drive every output to a known-off level.  Called once before `Idle`.
    fn init(&mut self) -> Result<(), ActuatorError>;

    /// Apply one command.  Applying the current state again is a no-op.
    fn apply(&mut self, cmd: &ActuatorCommand) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Command channel port (driving + driven: broker ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Pub/sub session with the broker.
pub trait CommandChannel {
    /// Subscribe to `filter`.  Messages matching it are queued on the
    /// returned [`Inbox`] from whatever thread the transport runs on.
    fn subscribe(&mut self, filter: &str) -> Result<Inbox, TransportError>;

    /// Publish one message.  Fails fast while disconnected.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Housekeeping called at the top of every iteration (reconnect and
    /// resubscribe after a session loss).
    fn maintain(&mut self) {}

    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for reading timestamps and status `ts`.
pub trait Clock {
    /// Milliseconds since the UNIX epoch.
    fn now_ms(&self) -> Timestamp;
}
