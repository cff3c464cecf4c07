//! Inbound commands to the control loop.
//!
//! Payloads arrive as flat JSON:
//!
//! ```json
//! {"target": "hvac", "action": "set", "value": 40}
//! ```
//!
//! `target` is an actuator id, this agent's id, or `*`.  Unknown fields are
//! ignored.  Parsed commands are folded into [`PendingCommands`], where the
//! latest command per actuator (and for the task slot) wins.

use serde::Deserialize;
use serde_json::Value;

use crate::error::TransportError;
use crate::model::{ActuatorId, DesiredState};

use super::events::DropReason;

/// Longest task id accepted from an `assign` command.
pub const TASK_ID_CAP: usize = 32;

pub type TaskId = heapless::String<TASK_ID_CAP>;

/// What an external command asks of one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorDirective {
    /// Hold this state as a manual override.
    Set(DesiredState),
    /// Drop the manual override; policy takes over again.
    Release,
}

/// A parsed command addressed to this agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalCommand {
    Actuator { id: ActuatorId, directive: ActuatorDirective },
    /// Applies to every actuator the agent owns.
    Zone(ActuatorDirective),
    AssignTask(TaskId),
    CancelTask,
}

#[derive(Debug, Deserialize)]
struct CommandPayload {
    target: String,
    action: String,
    #[serde(default)]
    value: Option<Value>,
}

/// Turns raw payloads into [`ExternalCommand`]s for one agent.
#[derive(Debug, Clone)]
pub struct CommandParser {
    agent_id: String,
    owned: heapless::Vec<ActuatorId, { ActuatorId::COUNT }>,
}

impl CommandParser {
    pub fn new(agent_id: &str, owned: &[ActuatorId]) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            owned: owned.iter().copied().take(ActuatorId::COUNT).collect(),
        }
    }

    /// Parse one payload.  The error says why the message is dropped.
    pub fn parse(&self, payload: &[u8]) -> Result<ExternalCommand, DropReason> {
        let msg: CommandPayload = serde_json::from_slice(payload)
            .map_err(|e| malformed(&e.to_string()))?;
        let target = msg.target.trim();
        let action = msg.action.trim().to_ascii_lowercase();

        if let Ok(id) = target.parse::<ActuatorId>() {
            if !self.owned.contains(&id) {
                return Err(DropReason::UnknownActuator(id));
            }
            let directive = actuator_directive(&action, msg.value.as_ref())?;
            return Ok(ExternalCommand::Actuator { id, directive });
        }

        if target != "*" && target != self.agent_id {
            return Err(DropReason::NotAddressed);
        }

        match action.as_str() {
            "off" => Ok(ExternalCommand::Zone(ActuatorDirective::Set(DesiredState::Off))),
            "auto" => Ok(ExternalCommand::Zone(ActuatorDirective::Release)),
            "assign" => {
                let task = match msg.value {
                    Some(Value::String(s)) if !s.trim().is_empty() => s,
                    _ => return Err(malformed("assign needs a task id string")),
                };
                let mut id = TaskId::new();
                id.push_str(task.trim())
                    .map_err(|()| malformed("task id too long"))?;
                Ok(ExternalCommand::AssignTask(id))
            }
            "cancel" => Ok(ExternalCommand::CancelTask),
            _ => Err(malformed("unknown zone action")),
        }
    }
}

fn actuator_directive(action: &str, value: Option<&Value>) -> Result<ActuatorDirective, DropReason> {
    let state = match action {
        "on" => DesiredState::On,
        "off" => DesiredState::Off,
        "auto" => return Ok(ActuatorDirective::Release),
        "set" => match value {
            Some(Value::Bool(on)) => DesiredState::from_bool(*on),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(p) if p <= 100 => DesiredState::level(p as u8),
                _ => return Err(malformed("level must be an integer 0-100")),
            },
            _ => return Err(malformed("set needs a bool or level")),
        },
        _ => return Err(malformed("unknown actuator action")),
    };
    Ok(ActuatorDirective::Set(state))
}

fn malformed(msg: &str) -> DropReason {
    DropReason::Malformed(TransportError::malformed(msg))
}

// ---------------------------------------------------------------------------
// Pending commands
// ---------------------------------------------------------------------------

/// What the drone should do with its assigned task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDirective {
    Assign(TaskId),
    Cancel,
}

/// External commands received since the last decision, latest per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCommands {
    actuators: [Option<ActuatorDirective>; ActuatorId::COUNT],
    task: Option<TaskDirective>,
}

impl PendingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one command in; it supersedes anything pending for its slots.
    pub fn fold(&mut self, cmd: ExternalCommand) {
        match cmd {
            ExternalCommand::Actuator { id, directive } => self.actuators[id.index()] = Some(directive),
            ExternalCommand::Zone(directive) => self.actuators = [Some(directive); ActuatorId::COUNT],
            ExternalCommand::AssignTask(task) => self.task = Some(TaskDirective::Assign(task)),
            ExternalCommand::CancelTask => self.task = Some(TaskDirective::Cancel),
        }
    }

    pub fn actuator(&self, id: ActuatorId) -> Option<ActuatorDirective> {
        self.actuators[id.index()]
    }

    pub fn task(&self) -> Option<&TaskDirective> {
        self.task.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.actuators.iter().all(Option::is_none)
    }
}
