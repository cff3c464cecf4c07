//! Error taxonomy for the agent.
//!
//! Every fallible port call returns one of the typed errors below.  Sensor,
//! actuator and transport errors are ordinary outcomes that the control loop
//! reports and survives; only [`StartupError`] ends the process.  All errors
//! carry a bounded, heap-free detail string so they can be copied into the
//! status payload without allocation.

use core::fmt;

use crate::config::ConfigError;
use crate::model::ActuatorId;

/// Capacity of an error detail string (bytes).
pub const DETAIL_CAP: usize = 64;

/// Short human-readable context attached to an error.
pub type Detail = heapless::String<DETAIL_CAP>;

/// Build a [`Detail`], truncating at a character boundary.
pub fn detail(msg: &str) -> Detail {
    let mut out = Detail::new();
    for ch in msg.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Any agent failure, for callers that do not care which layer failed.
/// Configuration loading returns it directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Sensor(SensorError),
    Actuator(ActuatorError),
    Transport(TransportError),
    Startup(StartupError),
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Startup(e) => write!(f, "startup: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorErrorKind {
    /// The sensor did not answer within its bounded timeout.
    Timeout,
    /// The bus or device reported a fault.
    HardwareFault,
}

impl SensorErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::HardwareFault => "hardware_fault",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorError {
    pub kind: SensorErrorKind,
    pub detail: Detail,
}

impl SensorError {
    pub fn timeout(msg: &str) -> Self {
        Self {
            kind: SensorErrorKind::Timeout,
            detail: detail(msg),
        }
    }

    pub fn hardware(msg: &str) -> Self {
        Self {
            kind: SensorErrorKind::HardwareFault,
            detail: detail(msg),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.as_str(), self.detail)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorErrorKind {
    /// The output could not be driven.
    HardwareFault,
    /// The requested state is not something this actuator can take.
    InvalidState,
}

impl ActuatorErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HardwareFault => "hardware_fault",
            Self::InvalidState => "invalid_state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorError {
    pub kind: ActuatorErrorKind,
    /// The actuator that failed, when known.
    pub actuator: Option<ActuatorId>,
    pub detail: Detail,
}

impl ActuatorError {
    pub fn hardware(actuator: Option<ActuatorId>, msg: &str) -> Self {
        Self {
            kind: ActuatorErrorKind::HardwareFault,
            actuator,
            detail: detail(msg),
        }
    }

    pub fn invalid_state(actuator: Option<ActuatorId>, msg: &str) -> Self {
        Self {
            kind: ActuatorErrorKind::InvalidState,
            actuator,
            detail: detail(msg),
        }
    }
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.actuator {
            Some(id) => write!(f, "{id}: {} ({})", self.kind.as_str(), self.detail),
            None => write!(f, "{} ({})", self.kind.as_str(), self.detail),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No broker session; publish fails fast.
    Disconnected,
    /// The broker rejected or lost the publish.
    PublishFailed,
    /// An inbound payload (or a topic) could not be understood.
    MalformedMessage,
}

impl TransportErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::PublishFailed => "publish_failed",
            Self::MalformedMessage => "malformed_message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: Detail,
}

impl TransportError {
    pub fn disconnected(msg: &str) -> Self {
        Self {
            kind: TransportErrorKind::Disconnected,
            detail: detail(msg),
        }
    }

    pub fn publish_failed(msg: &str) -> Self {
        Self {
            kind: TransportErrorKind::PublishFailed,
            detail: detail(msg),
        }
    }

    pub fn malformed(msg: &str) -> Self {
        Self {
            kind: TransportErrorKind::MalformedMessage,
            detail: detail(msg),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.as_str(), self.detail)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Startup errors
// ---------------------------------------------------------------------------

/// Failures that prevent the control loop from ever reaching `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    SubscribeFailed(TransportError),
    DriverInitFailed(ActuatorError),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscribeFailed(e) => write!(f, "command subscription failed: {e}"),
            Self::DriverInitFailed(e) => write!(f, "actuator driver init failed: {e}"),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<StartupError> for Error {
    fn from(e: StartupError) -> Self {
        Self::Startup(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
