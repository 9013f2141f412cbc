//! FORGE terminal client.

pub mod app;
pub mod commands;
pub mod console;
pub mod error;
pub mod telemetry;
pub mod wizard;
