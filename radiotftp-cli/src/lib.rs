//! Library entry for radiotftp-cli used by integration tests and embedding.

pub mod commands;
pub mod config;
pub mod runner;
pub mod serial;

// Re-export commands for convenience
pub use commands::*;

pub use runner::Runner;
pub use serial::{MockRadioPort, RadioPort, RealSerialPort};
