use anyhow::{Context, Result};
use colored::Colorize;
use radiotftp_core::{Address, StationEvent};
use std::time::{Duration, Instant};
use tracing::info;

use crate::runner::Runner;

/// Print neighbours and transfer outcomes as they are heard
fn print_event(event: &StationEvent) {
    match event {
        StationEvent::Neighbour(address) => {
            println!("{} New neighbour:\nIP = {}", "+".green(), address)
        }
        StationEvent::Transfer(completion) => info!("Transfer ended: {:?}", completion),
    }
}

/// Broadcast a hello, then listen for `listen_for` (forever if `None`)
pub fn execute(runner: &mut Runner, listen_for: Option<Duration>) -> Result<Vec<Address>> {
    runner
        .station_mut()
        .send_hello()
        .context("Failed to queue hello")?;
    runner.flush()?;
    info!("Hello sent from {}", runner.station().config().net_address);

    listen(runner, listen_for)
}

/// Receive only, reporting neighbours until `listen_for` passes
pub fn listen(runner: &mut Runner, listen_for: Option<Duration>) -> Result<Vec<Address>> {
    let until = listen_for.map(|d| Instant::now() + d);
    runner.listen(until, print_event)?;
    Ok(runner.station().neighbours().to_vec())
}
