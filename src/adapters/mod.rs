//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                    | Connects to             |
//! |------------|-------------------------------|-------------------------|
//! | `broker`   | CommandChannel                | In-memory pub/sub       |
//! | `hardware` | SensorReader + ActuatorDriver | Sensor + relay bank     |
//! | `log_sink` | EventSink                     | `log` facade            |
//! | `time`     | Clock                         | Wall clock / manual     |

pub mod broker;
pub mod hardware;
pub mod log_sink;
pub mod time;
