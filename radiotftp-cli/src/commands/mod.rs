//! Subcommand implementations

pub mod appendline;
pub mod get;
pub mod hello;
pub mod put;
pub mod scan;
pub mod single;

use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use radiotftp_core::{Completion, Progress};

use crate::runner::Runner;

/// Run the session in flight with a block progress bar, then report it
pub(crate) fn finish_transfer(runner: &mut Runner, what: &str) -> Result<()> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len} blocks")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(what.to_string());

    let completion = runner.run_transfer(|Progress { acked_blocks, total_blocks }| {
        bar.set_length(total_blocks as u64);
        bar.set_position(acked_blocks as u64);
    })?;
    bar.finish_and_clear();

    report(what, &completion)
}

pub(crate) fn report(what: &str, completion: &Completion) -> Result<()> {
    match completion {
        Completion::Delivered => {
            println!("{} {} delivered", "✓".green(), what);
            Ok(())
        }
        Completion::Failed(e) => {
            println!("{} {} failed: {}", "✗".red(), what, e);
            bail!("Transfer failed: {}", e)
        }
    }
}
