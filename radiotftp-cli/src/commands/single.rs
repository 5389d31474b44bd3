use anyhow::{Context, Result};
use bytes::Bytes;
use radiotftp_core::Address;
use std::fs;
use std::time::Instant;
use tracing::info;

use super::finish_transfer;
use crate::runner::Runner;

/// Send a small file in one unacknowledged datagram
pub fn execute(runner: &mut Runner, dst: Address, local: &str, remote: Option<&str>) -> Result<()> {
    let data = fs::read(local).with_context(|| format!("Failed to read input file: {}", local))?;
    info!("Sending {} ({} bytes) to {} in one datagram", local, data.len(), dst);

    runner
        .station_mut()
        .send_single(dst, Bytes::from(data), remote.unwrap_or_default(), Instant::now())
        .with_context(|| format!("Failed to send {}", local))?;

    finish_transfer(runner, local)
}
