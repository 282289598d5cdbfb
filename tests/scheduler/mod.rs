//! Scheduler Integration Test Modules

pub mod planning;
