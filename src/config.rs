//! Agent configuration.
//!
//! Every tunable the agent uses lives here: broker address, agent/zone id,
//! topics, polling cadence, GPIO assignments and policy thresholds.  Nothing
//! is hardcoded elsewhere.
//!
//! Load order: per-kind defaults → optional JSON file (`ZONEAGENT_CONFIG`)
//! → environment overrides.  Overrides go through an injectable lookup so
//! tests never touch the process environment.
//!
//! Some defaults are derived from other fields: the status topic from the
//! kind and id, the reading age limit from the poll interval.  A derived
//! value follows its inputs through every layer until something sets it
//! explicitly.

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::topic;

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_PATH_VAR: &str = "ZONEAGENT_CONFIG";

/// Readings stay usable for this many poll intervals unless configured.
pub const READING_AGE_INTERVALS: u32 = 3;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating an [`AgentConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(String),
    /// The configuration file is not valid JSON for [`AgentConfig`].
    Parse(String),
    /// An override could not be parsed; carries the variable name.
    InvalidValue(&'static str),
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "cannot read config file: {msg}"),
            Self::Parse(msg) => write!(f, "cannot parse config file: {msg}"),
            Self::InvalidValue(key) => write!(f, "invalid value for {key}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Which agent this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// HVAC + lighting for one building zone.
    Building,
    /// GPS/battery telemetry and task assignments for one drone.
    Drone,
}

impl FromStr for AgentKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "building" | "zone" => Ok(Self::Building),
            "drone" => Ok(Self::Drone),
            _ => Err(ConfigError::InvalidValue("AGENT_KIND")),
        }
    }
}

/// Actuator configuration applied on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafeStatePolicy {
    /// Drive every output off.
    AllOff,
    /// Hold the last successfully applied state.
    LastKnownGood,
}

impl FromStr for SafeStatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all_off" | "off" => Ok(Self::AllOff),
            "last_known_good" | "lkg" => Ok(Self::LastKnownGood),
            _ => Err(ConfigError::InvalidValue("SAFE_STATE")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Policy thresholds.  Comparisons are strict (`>` / `<`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// HVAC turns on above this temperature (°C).
    pub hvac_temp_on_c: f64,
    /// HVAC turns on above this relative humidity (%).
    pub hvac_humidity_on_pct: f64,
    /// A zone counts as occupied above this temperature (°C).
    pub occupancy_temp_c: f64,
    /// A drone reports low battery below this charge (%).
    pub low_battery_pct: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            hvac_temp_on_c: 26.0,
            hvac_humidity_on_pct: 75.0,
            occupancy_temp_c: 20.0,
            low_battery_pct: 20.0,
        }
    }
}

/// Where the broker lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.200".into(),
            port: 1883,
        }
    }
}

/// Core agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub kind: AgentKind,
    /// Zone id (building) or drone id; also the broker client id.
    pub agent_id: String,
    pub broker: BrokerConfig,

    // --- Topics ---
    /// Filter the agent subscribes to for inbound commands.
    pub command_topic: String,
    /// Topic the agent publishes status to.
    pub status_topic: String,

    // --- Timing ---
    /// Control loop period (milliseconds).
    pub poll_interval_ms: u32,
    /// Upper bound for one sensor read (milliseconds).
    pub sensor_timeout_ms: u32,
    /// Readings older than this are treated as invalid (milliseconds).
    pub max_reading_age_ms: u32,
    /// Stop after this many iterations (simulation runs).
    pub max_iterations: Option<u64>,

    // --- GPIO ---
    pub hvac_gpio: u8,
    pub light_gpio: u8,
    pub dht_gpio: u8,

    // --- Policy ---
    pub thresholds: ThresholdConfig,
    pub safe_state: SafeStatePolicy,

    // --- Inbound flood guard ---
    /// Sustained inbound commands per second.
    pub inbound_rate_per_sec: u32,
    /// Inbound commands accepted in one burst.
    pub inbound_burst: u32,

    /// Run the stdin operator console (binary only).
    pub console: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::building()
    }
}

fn default_status_topic(kind: AgentKind, agent_id: &str) -> String {
    match kind {
        AgentKind::Building => format!("building/status/{agent_id}"),
        AgentKind::Drone => format!("{agent_id}/status"),
    }
}

fn default_reading_age(poll_interval_ms: u32) -> u32 {
    poll_interval_ms.saturating_mul(READING_AGE_INTERVALS)
}

/// Replace `slot` with `new` if it still holds `old`.
fn follow<T: PartialEq>(slot: &mut T, old: T, new: T) {
    if *slot == old {
        *slot = new;
    }
}

/// Overlay `patch` onto `base`, descending into objects key by key.
fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

impl AgentConfig {
    /// Defaults for a building zone agent.
    pub fn building() -> Self {
        let agent_id = "Floor3_ZoneA".to_string();
        Self {
            kind: AgentKind::Building,
            status_topic: default_status_topic(AgentKind::Building, &agent_id),
            agent_id,
            broker: BrokerConfig::default(),
            command_topic: "building/commands/#".into(),
            poll_interval_ms: 10_000,
            sensor_timeout_ms: 2_000,
            max_reading_age_ms: default_reading_age(10_000),
            max_iterations: None,
            hvac_gpio: 18,
            light_gpio: 23,
            dht_gpio: 4,
            thresholds: ThresholdConfig::default(),
            safe_state: SafeStatePolicy::AllOff,
            inbound_rate_per_sec: 10,
            inbound_burst: 10,
            console: true,
        }
    }

    /// Defaults for a drone agent.
    pub fn drone() -> Self {
        let agent_id = "Drone1".to_string();
        Self {
            kind: AgentKind::Drone,
            status_topic: default_status_topic(AgentKind::Drone, &agent_id),
            agent_id,
            broker: BrokerConfig {
                host: "192.168.1.210".into(),
                ..BrokerConfig::default()
            },
            command_topic: "drone/tasks".into(),
            poll_interval_ms: 5_000,
            sensor_timeout_ms: 1_000,
            max_reading_age_ms: default_reading_age(5_000),
            ..Self::building()
        }
    }

    pub fn for_kind(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Building => Self::building(),
            AgentKind::Drone => Self::drone(),
        }
    }

    /// Load from the process environment.
    pub fn load() -> crate::error::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> crate::error::Result<Self> {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Io(format!("{path}: {e}")))?;
                Self::from_json(&text)?
            }
            None => Self::building(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document.
    ///
    /// Missing fields take the defaults of the document's `kind` (building
    /// when absent).  A missing `status_topic` or `max_reading_age_ms` is
    /// derived from the id and interval the document ends up with.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let parse = |e: serde_json::Error| ConfigError::Parse(e.to_string());
        let doc: Value = serde_json::from_str(text).map_err(parse)?;
        let Value::Object(fields) = &doc else {
            return Err(ConfigError::Parse("expected a JSON object".into()));
        };
        let kind = match fields.get("kind") {
            Some(k) => AgentKind::deserialize(k).map_err(parse)?,
            None => AgentKind::Building,
        };
        let mut merged = serde_json::to_value(Self::for_kind(kind)).map_err(parse)?;
        merge_json(&mut merged, &doc);
        let mut config: Self = serde_json::from_value(merged).map_err(parse)?;
        if !fields.contains_key("status_topic") {
            config.status_topic = default_status_topic(kind, &config.agent_id);
        }
        if !fields.contains_key("max_reading_age_ms") {
            config.max_reading_age_ms = default_reading_age(config.poll_interval_ms);
        }
        Ok(config)
    }

    /// Change the agent kind.  Fields still holding the old kind's defaults
    /// move to the new kind's; anything set explicitly stays.
    fn switch_kind(&mut self, kind: AgentKind) {
        if kind == self.kind {
            return;
        }
        let old = Self::for_kind(self.kind);
        let new = Self::for_kind(kind);
        let status_derived = self.status_topic == default_status_topic(self.kind, &self.agent_id);
        let age_derived = self.max_reading_age_ms == default_reading_age(self.poll_interval_ms);

        follow(&mut self.agent_id, old.agent_id, new.agent_id);
        follow(&mut self.broker.host, old.broker.host, new.broker.host);
        follow(&mut self.command_topic, old.command_topic, new.command_topic);
        follow(&mut self.poll_interval_ms, old.poll_interval_ms, new.poll_interval_ms);
        follow(&mut self.sensor_timeout_ms, old.sensor_timeout_ms, new.sensor_timeout_ms);
        if status_derived {
            self.status_topic = default_status_topic(kind, &self.agent_id);
        }
        if age_derived {
            self.max_reading_age_ms = default_reading_age(self.poll_interval_ms);
        }
        self.kind = kind;
    }

    /// Apply environment-style overrides on top of the current values.
    pub fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("AGENT_KIND") {
            self.switch_kind(v.parse()?);
        }
        if let Some(v) = lookup("AGENT_ID") {
            let id = v.trim().to_string();
            // Keep a derived status topic in step with the id.
            if self.status_topic == default_status_topic(self.kind, &self.agent_id) {
                self.status_topic = default_status_topic(self.kind, &id);
            }
            self.agent_id = id;
        }
        if let Some(v) = lookup("BROKER_HOST") {
            self.broker.host = v.trim().to_string();
        }
        override_parsed(lookup, "BROKER_PORT", &mut self.broker.port)?;
        if let Some(v) = lookup("COMMAND_TOPIC") {
            self.command_topic = v.trim().to_string();
        }
        if let Some(v) = lookup("STATUS_TOPIC") {
            self.status_topic = v.trim().to_string();
        }
        if let Some(v) = lookup("POLL_INTERVAL_SECS") {
            let secs: f64 = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("POLL_INTERVAL_SECS"))?;
            if !secs.is_finite() || secs <= 0.0 || secs > f64::from(u32::MAX) / 1000.0 {
                return Err(ConfigError::InvalidValue("POLL_INTERVAL_SECS"));
            }
            let ms = (secs * 1000.0).round() as u32;
            if self.max_reading_age_ms == default_reading_age(self.poll_interval_ms) {
                self.max_reading_age_ms = default_reading_age(ms);
            }
            self.poll_interval_ms = ms;
        }
        override_parsed(lookup, "SENSOR_TIMEOUT_MS", &mut self.sensor_timeout_ms)?;
        override_parsed(lookup, "MAX_READING_AGE_MS", &mut self.max_reading_age_ms)?;
        if let Some(v) = lookup("MAX_TICKS") {
            let n: u64 = v.trim().parse().map_err(|_| ConfigError::InvalidValue("MAX_TICKS"))?;
            self.max_iterations = Some(n);
        }
        override_parsed(lookup, "HVAC_GPIO", &mut self.hvac_gpio)?;
        override_parsed(lookup, "LIGHT_GPIO", &mut self.light_gpio)?;
        override_parsed(lookup, "DHT_GPIO", &mut self.dht_gpio)?;
        override_parsed(lookup, "HVAC_TEMP_ON_C", &mut self.thresholds.hvac_temp_on_c)?;
        override_parsed(lookup, "HVAC_HUMIDITY_ON_PCT", &mut self.thresholds.hvac_humidity_on_pct)?;
        override_parsed(lookup, "OCCUPANCY_TEMP_C", &mut self.thresholds.occupancy_temp_c)?;
        override_parsed(lookup, "LOW_BATTERY_PCT", &mut self.thresholds.low_battery_pct)?;
        if let Some(v) = lookup("SAFE_STATE") {
            self.safe_state = v.parse()?;
        }
        override_parsed(lookup, "INBOUND_RATE_PER_SEC", &mut self.inbound_rate_per_sec)?;
        override_parsed(lookup, "INBOUND_BURST", &mut self.inbound_burst)?;
        if let Some(v) = lookup("AGENT_CONSOLE") {
            self.console = parse_switch(&v).ok_or(ConfigError::InvalidValue("AGENT_CONSOLE"))?;
        }
        Ok(())
    }

    /// Reject values that would make the agent misbehave.
    /// Invalid ranges are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.is_empty() || self.agent_id.contains(['/', '+', '#']) {
            return Err(ConfigError::ValidationFailed(
                "agent_id must be non-empty and free of '/', '+', '#'",
            ));
        }
        if self.broker.host.is_empty() || self.broker.port == 0 {
            return Err(ConfigError::ValidationFailed("broker host/port must be set"));
        }
        if !topic::is_valid_filter(&self.command_topic) {
            return Err(ConfigError::ValidationFailed("command_topic is not a valid filter"));
        }
        if !topic::is_valid_topic(&self.status_topic) {
            return Err(ConfigError::ValidationFailed("status_topic must not contain wildcards"));
        }
        if topic::matches(&self.command_topic, &self.status_topic) {
            return Err(ConfigError::ValidationFailed(
                "status_topic must not fall under command_topic",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms must be > 0"));
        }
        if self.sensor_timeout_ms == 0 || self.sensor_timeout_ms >= self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "sensor_timeout_ms must be > 0 and below poll_interval_ms",
            ));
        }
        if self.max_reading_age_ms < self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "max_reading_age_ms must cover at least one poll interval",
            ));
        }
        if self.hvac_gpio == self.light_gpio
            || self.hvac_gpio == self.dht_gpio
            || self.light_gpio == self.dht_gpio
        {
            return Err(ConfigError::ValidationFailed("GPIO assignments must be distinct"));
        }
        let t = &self.thresholds;
        if ![t.hvac_temp_on_c, t.hvac_humidity_on_pct, t.occupancy_temp_c, t.low_battery_pct]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ConfigError::ValidationFailed("thresholds must be finite"));
        }
        if !(0.0..=100.0).contains(&t.hvac_humidity_on_pct) {
            return Err(ConfigError::ValidationFailed("hvac_humidity_on_pct must be 0-100"));
        }
        if !(0.0..=100.0).contains(&t.low_battery_pct) {
            return Err(ConfigError::ValidationFailed("low_battery_pct must be 0-100"));
        }
        if self.inbound_rate_per_sec == 0 || self.inbound_burst == 0 {
            return Err(ConfigError::ValidationFailed("inbound rate and burst must be > 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.sensor_timeout_ms))
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key))?;
    }
    Ok(())
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
