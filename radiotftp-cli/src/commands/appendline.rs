use anyhow::{Context, Result};
use bytes::Bytes;
use radiotftp_core::Address;
use std::time::Instant;
use tracing::info;

use super::finish_transfer;
use crate::runner::Runner;

/// Turn literal `\n` escapes into CR LF and end the text with one
pub fn expand_line(text: &str) -> Vec<u8> {
    let mut line = text.replace("\\n", "\r\n");
    if !line.ends_with("\r\n") {
        line.push_str("\r\n");
    }
    line.into_bytes()
}

/// Append a line of text to the remote file
pub fn execute(runner: &mut Runner, dst: Address, words: &[String], remote: &str) -> Result<()> {
    let line = expand_line(&words.join(" "));
    info!("Appending {} bytes to {} on {}", line.len(), remote, dst);

    runner
        .station_mut()
        .send_file(dst, Bytes::from(line), remote, true, Instant::now())
        .context("Failed to start append")?;

    finish_transfer(runner, "line")
}
