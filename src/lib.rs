pub mod audit;
pub mod collector;
pub mod config;
pub mod core;
pub mod engine;
pub mod plugin;
pub mod report;
pub mod scheduler;
