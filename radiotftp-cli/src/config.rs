//! Station configuration for the host program
//!
//! Settings come from an optional JSON file; command-line options win.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use radiotftp_core::{Address, StationConfig};
use tracing::{debug, info};

/// Command-line values that override the file
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub link_address: Option<Address>,
    pub net_address: Option<Address>,
    pub block_size: Option<usize>,
}

/// Load `path` if it exists, fall back to defaults otherwise
pub fn load(path: &Path, overrides: Overrides) -> Result<StationConfig> {
    let mut config = if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: StationConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        config
    } else {
        debug!("No config file at {}, using defaults", path.display());
        StationConfig::default()
    };

    if let Some(address) = overrides.link_address {
        config.link_address = address;
    }
    if let Some(address) = overrides.net_address {
        config.net_address = address;
    }
    if let Some(block_size) = overrides.block_size {
        config.transfer.block_size = block_size;
    }

    config
        .validate()
        .with_context(|| "Configuration rejected")?;
    Ok(config)
}
