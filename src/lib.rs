// Public API - only expose the runner module
pub mod runner;

// Internal modules - organized by subsystem
mod config;
mod db;
mod error;
mod formats;
mod io;
mod pipeline;
mod telemetry;
