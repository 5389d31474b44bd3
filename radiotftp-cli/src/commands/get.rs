use anyhow::{Context, Result};
use radiotftp_core::Address;
use std::time::Instant;

use crate::runner::Runner;

/// Request a file from `dst`; this node only sends, so the request is refused
pub fn execute(runner: &mut Runner, dst: Address, remote: &str) -> Result<()> {
    runner
        .station_mut()
        .request_file(dst, remote, Instant::now())
        .with_context(|| format!("Cannot fetch {} from {}", remote, dst))
}
