//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the control loop against
//! mock hardware and the in-memory broker.  No real hardware or network is
//! required.

mod broker_tests;
mod control_loop_tests;
mod harness;
mod mock_hw;
mod shutdown_tests;
