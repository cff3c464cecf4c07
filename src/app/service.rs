//! Control loop, the hexagonal core.
//!
//! [`ControlLoop`] owns the phase machine, the agent state and the pending
//! commands.  All I/O flows through port traits, so the whole loop runs
//! against mock adapters in tests.
//!
//! ```text
//!  CommandChannel ──▶ ┌─────────────────────────┐ ──▶ CommandChannel
//!   (inbox)           │       ControlLoop       │      (status)
//!  SensorReader ────▶ │ Fsm · Policy · State    │ ──▶ ActuatorDriver
//!                     └─────────────────────────┘ ──▶ EventSink
//! ```
//!
//! One iteration:
//!
//! 1. `maintain()` the channel, drain the inbox (rate limited), fold
//!    commands into the pending set.
//! 2. Read sensors and expire stale readings.  A sensor error skips
//!    straight to publishing a degraded status; pending commands wait.
//! 3. Evaluate the policy.
//! 4. Apply every command; failures are collected, not fatal.
//! 5. Publish the status.  Always.

use core::time::Duration;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::adapters::time::SystemClock;
use crate::config::{AgentConfig, SafeStatePolicy};
use crate::control::Policy;
use crate::error::StartupError;
use crate::fsm::context::AgentState;
use crate::fsm::{Fsm, LoopPhase};
use crate::model::{ActuatorCommand, ActuatorId, CommandSource, DesiredState, Timestamp};
use crate::safety::{self, SafeStateReport};
use crate::scheduler::{Shutdown, Ticker, Wake};

use super::commands::{ActuatorDirective, CommandParser, PendingCommands, TaskDirective};
use super::events::{AppEvent, DropReason};
use super::inbound::InboundGuard;
use super::inbox::Inbox;
use super::ports::{ActuatorDriver, Clock, CommandChannel, EventSink, SensorReader};
use super::status::{FaultReport, StatusFormat, StatusMessage};

// ───────────────────────────────────────────────────────────────
// Settings
// ───────────────────────────────────────────────────────────────

/// The slice of [`AgentConfig`] the loop needs at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub agent_id: String,
    pub command_filter: String,
    pub status_topic: String,
    pub poll_interval: Duration,
    pub max_reading_age_ms: u64,
    pub safe_state: SafeStatePolicy,
    pub status_format: StatusFormat,
    pub inbound_rate_per_sec: u32,
    pub inbound_burst: u32,
    /// Stop after this many iterations.
    pub max_iterations: Option<u64>,
}

impl LoopSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            command_filter: config.command_topic.clone(),
            status_topic: config.status_topic.clone(),
            poll_interval: config.poll_interval(),
            max_reading_age_ms: u64::from(config.max_reading_age_ms),
            safe_state: config.safe_state,
            status_format: StatusFormat::for_kind(config.kind),
            inbound_rate_per_sec: config.inbound_rate_per_sec,
            inbound_burst: config.inbound_burst,
            max_iterations: config.max_iterations,
        }
    }
}

/// What one call to [`ControlLoop::iterate`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub iteration: u64,
    pub accepted: usize,
    pub dropped: usize,
    /// Commands the driver accepted.
    pub applied: usize,
    pub faults: Vec<FaultReport>,
    pub degraded: bool,
    pub published: bool,
}

// ───────────────────────────────────────────────────────────────
// ControlLoop
// ───────────────────────────────────────────────────────────────

pub struct ControlLoop<H, C, P, K = SystemClock> {
    hw: H,
    channel: C,
    policy: P,
    clock: K,
    settings: LoopSettings,
    fsm: Fsm,
    state: AgentState,
    pending: PendingCommands,
    parser: CommandParser,
    guard: InboundGuard,
    inbox: Inbox,
}

impl<H, C, P, K> ControlLoop<H, C, P, K>
where
    H: SensorReader + ActuatorDriver,
    C: CommandChannel,
    P: Policy,
    K: Clock,
{
    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise the drivers, subscribe to the command filter and enter
    /// `Idle`.  Either failure is fatal.
    pub fn start(
        mut hw: H,
        mut channel: C,
        policy: P,
        clock: K,
        settings: LoopSettings,
        sink: &mut impl EventSink,
    ) -> Result<Self, StartupError> {
        hw.init().map_err(StartupError::DriverInitFailed)?;

        let now = clock.now_ms();
        let mut state = AgentState::new();
        for &id in hw.actuators() {
            state.record_applied(&ActuatorCommand::new(id, DesiredState::Off, CommandSource::SafeState, now));
        }

        let inbox = channel
            .subscribe(&settings.command_filter)
            .map_err(StartupError::SubscribeFailed)?;

        let parser = CommandParser::new(&settings.agent_id, hw.actuators());
        let guard = InboundGuard::new(settings.inbound_rate_per_sec, settings.inbound_burst);

        info!(
            "control loop for {} started: {} actuator(s), subscribed to {}, status on {}",
            settings.agent_id,
            hw.actuators().len(),
            settings.command_filter,
            settings.status_topic
        );
        sink.emit(&AppEvent::Started {
            agent_id: settings.agent_id.clone(),
        });

        Ok(Self {
            hw,
            channel,
            policy,
            clock,
            settings,
            fsm: Fsm::new(),
            state,
            pending: PendingCommands::new(),
            parser,
            guard,
            inbox,
        })
    }

    /// Run until shutdown is requested or `max_iterations` is reached,
    /// then release to the safe state.
    pub async fn run(&mut self, ticker: &mut Ticker, shutdown: &Shutdown, sink: &mut impl EventSink) -> SafeStateReport {
        loop {
            if shutdown.is_requested() {
                info!("shutdown requested");
                break;
            }

            let report = self.iterate(sink);

            if let Some(overrun) = ticker.complete_iteration(Instant::now()) {
                self.state.counters.overruns += 1;
                sink.emit(&AppEvent::Overrun {
                    late_by_ms: overrun.late_by.as_millis() as u64,
                    skipped_ticks: overrun.skipped_ticks,
                });
            }

            if self
                .settings
                .max_iterations
                .is_some_and(|max| report.iteration >= max)
            {
                info!("iteration limit reached");
                break;
            }

            if ticker.wait(shutdown).await == Wake::Shutdown {
                info!("shutdown requested");
                break;
            }
        }
        self.shutdown(sink)
    }

    /// Release actuators to the safe state and enter `Stopped`.
    pub fn shutdown(&mut self, sink: &mut impl EventSink) -> SafeStateReport {
        let policy = self.settings.safe_state;
        if self.fsm.is_stopped() {
            warn!("shutdown called on a stopped loop");
            return SafeStateReport {
                policy,
                applied: heapless::Vec::new(),
                failures: Vec::new(),
            };
        }

        let now = self.clock.now_ms();
        let report = safety::release_to_safe_state(&mut self.hw, &mut self.state, policy, now);
        for failure in &report.failures {
            sink.emit(&AppEvent::ActuatorFault(failure.clone()));
        }
        sink.emit(&AppEvent::SafeStateApplied {
            policy,
            failures: report.failures.len(),
        });

        self.enter(LoopPhase::Stopped, sink);
        sink.emit(&AppEvent::Stopped {
            iterations: self.state.iteration,
            counters: self.state.counters,
        });
        report
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full iteration: inbound → read → decide → actuate → publish.
    pub fn iterate(&mut self, sink: &mut impl EventSink) -> IterationReport {
        let started = Instant::now();
        let now = self.clock.now_ms();
        let mut faults = Vec::new();

        // 1. Inbound commands
        self.channel.maintain();
        let (accepted, dropped) = self.drain_inbound(sink);

        // 2. Sensors
        self.enter(LoopPhase::Reading, sink);
        let mut applied = 0;
        match self.hw.read() {
            Err(e) => {
                self.state.counters.sensor_faults += 1;
                faults.push(FaultReport::from(&e));
                sink.emit(&AppEvent::SensorFault(e));
                self.enter(LoopPhase::Error, sink);
            }
            Ok(mut readings) => {
                let cutoff = now.saturating_sub(self.settings.max_reading_age_ms);
                let stale = readings.expire_older_than(cutoff);
                if stale > 0 {
                    debug!("{stale} stale reading(s) ignored");
                }
                self.state.last_readings.absorb(&readings);
                self.state.last_readings.expire_older_than(cutoff);

                // 3. Policy
                self.enter(LoopPhase::Deciding, sink);
                let pending = core::mem::take(&mut self.pending);
                let decision = self.policy.decide(&readings, &self.state, &pending, now);
                self.state.flags.merge(decision.flags);
                self.absorb_task(&pending);
                for id in ActuatorId::ALL {
                    if pending.actuator(id) == Some(ActuatorDirective::Release) {
                        self.state.set_override(id, None);
                    }
                }

                // 4. Actuators
                self.enter(LoopPhase::Actuating, sink);
                let mut failed = false;
                for cmd in &decision.commands {
                    if !self.hw.actuators().contains(&cmd.id) {
                        continue;
                    }
                    let previous = self.state.actuator(cmd.id);
                    match self.hw.apply(cmd) {
                        Ok(()) => {
                            if previous != Some(cmd.desired) {
                                info!("{} -> {} ({:?})", cmd.id, cmd.desired, cmd.source);
                            }
                            self.state.record_applied(cmd);
                            applied += 1;
                        }
                        Err(e) => {
                            self.state.counters.actuator_faults += 1;
                            faults.push(FaultReport::from(&e));
                            sink.emit(&AppEvent::ActuatorFault(e));
                            failed = true;
                        }
                    }
                }
                if failed {
                    self.enter(LoopPhase::Error, sink);
                }
            }
        }

        // 5. Status
        self.enter(LoopPhase::Publishing, sink);
        let degraded = !faults.is_empty();
        let published = self.publish_status(faults.clone(), now, sink);
        self.enter(LoopPhase::Idle, sink);

        self.state.iteration += 1;
        sink.emit(&AppEvent::IterationCompleted {
            iteration: self.state.iteration,
            degraded,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        IterationReport {
            iteration: self.state.iteration,
            accepted,
            dropped,
            applied,
            faults,
            degraded,
            published,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn phase(&self) -> LoopPhase {
        self.fsm.current()
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn pending(&self) -> &PendingCommands {
        &self.pending
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    // ── Internal ──────────────────────────────────────────────

    fn enter(&mut self, phase: LoopPhase, sink: &mut impl EventSink) {
        match self.fsm.transition(phase) {
            Ok(from) => sink.emit(&AppEvent::PhaseChanged { from, to: phase }),
            Err(e) => error!("{e}"),
        }
    }

    /// Drain what is queued right now.  Returns `(accepted, dropped)`.
    fn drain_inbound(&mut self, sink: &mut impl EventSink) -> (usize, usize) {
        let mut accepted = 0;
        let mut dropped = 0;
        // Bounded by the queue depth at entry so a busy producer cannot
        // keep the loop here.
        for _ in 0..self.inbox.pending() {
            let Some(msg) = self.inbox.try_next() else { break };
            let outcome = if self.guard.admit() {
                self.parser.parse(&msg.payload)
            } else {
                self.state.counters.rate_limited += 1;
                Err(DropReason::RateLimited)
            };
            match outcome {
                Ok(cmd) => {
                    debug!("command on {}: {:?}", msg.topic, cmd);
                    sink.emit(&AppEvent::CommandAccepted(cmd.clone()));
                    self.pending.fold(cmd);
                    accepted += 1;
                }
                Err(reason) => {
                    self.state.counters.dropped_commands += 1;
                    sink.emit(&AppEvent::CommandDropped {
                        topic: msg.topic.as_str().to_string(),
                        reason,
                    });
                    dropped += 1;
                }
            }
        }
        (accepted, dropped)
    }

    fn absorb_task(&mut self, pending: &PendingCommands) {
        match pending.task() {
            Some(TaskDirective::Assign(task)) => {
                info!("task assigned: {task}");
                self.state.assigned_task = Some(task.clone());
            }
            Some(TaskDirective::Cancel) => {
                if let Some(task) = self.state.assigned_task.take() {
                    info!("task cancelled: {task}");
                }
            }
            None => {}
        }
    }

    fn publish_status(&mut self, faults: Vec<FaultReport>, now: Timestamp, sink: &mut impl EventSink) -> bool {
        let status = StatusMessage::from_state(&self.settings.agent_id, &self.state, faults, now);
        let result = self
            .settings
            .status_format
            .encode(&status)
            .and_then(|payload| self.channel.publish(&self.settings.status_topic, &payload));
        match result {
            Ok(()) => true,
            Err(e) => {
                self.state.counters.publish_failures += 1;
                sink.emit(&AppEvent::PublishFailed(e));
                false
            }
        }
    }
}
