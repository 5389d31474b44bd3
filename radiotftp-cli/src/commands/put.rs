use anyhow::{Context, Result};
use bytes::Bytes;
use radiotftp_core::Address;
use std::fs;
use std::time::Instant;
use tracing::info;

use super::finish_transfer;
use crate::runner::Runner;

/// Write a local file to `dst`, appending to the remote file if `append`
pub fn execute(
    runner: &mut Runner,
    dst: Address,
    local: &str,
    remote: Option<&str>,
    append: bool,
) -> Result<()> {
    let data = fs::read(local).with_context(|| format!("Failed to read input file: {}", local))?;
    let remote = remote.unwrap_or_default();

    info!(
        "{} {} ({} bytes) to {}",
        if append { "Appending" } else { "Writing" },
        local,
        data.len(),
        dst
    );

    runner
        .station_mut()
        .send_file(dst, Bytes::from(data), remote, append, Instant::now())
        .with_context(|| format!("Failed to start transfer of {}", local))?;

    finish_transfer(runner, local)
}
