// Common library shared by the push binary and the integration tests

pub mod config;
pub mod errors;
pub mod retry;
pub mod rhsm;
pub mod task;
pub mod telemetry;
