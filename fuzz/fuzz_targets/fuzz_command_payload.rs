//! Fuzz target: `CommandParser::parse`
//!
//! Feeds arbitrary bytes to the inbound command parser of a building zone.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - An accepted actuator command only ever names an owned actuator
//! - An accepted task id is non-empty and within `TASK_ID_CAP`
//!
//! cargo fuzz run fuzz_command_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use zoneagent::app::commands::{CommandParser, ExternalCommand, TASK_ID_CAP};
use zoneagent::model::ActuatorId;

fuzz_target!(|data: &[u8]| {
    let parser = CommandParser::new("Floor3_ZoneA", &[ActuatorId::Hvac]);
    match parser.parse(data) {
        Ok(ExternalCommand::Actuator { id, .. }) => assert_eq!(id, ActuatorId::Hvac),
        Ok(ExternalCommand::AssignTask(task)) => {
            assert!(!task.is_empty());
            assert!(task.len() <= TASK_ID_CAP);
        }
        Ok(_) | Err(_) => {}
    }
});
