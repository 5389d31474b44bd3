use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use radiotftp_cli::commands;
use radiotftp_cli::config::{self, Overrides};
use radiotftp_cli::{RealSerialPort, Runner};
use radiotftp_core::{Address, Station};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "radiotftp")]
#[command(about = "Radiotftp - reliable file transfer over half-duplex serial radios", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Serial device the radio modem is attached to
    #[arg(short, long, global = true, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial line speed
    #[arg(short, long, global = true, default_value_t = 38_400)]
    baud: u32,

    /// Destination network address (dotted decimal, broadcast by default)
    #[arg(long, global = true, default_value = "255.255.255.255.255.255")]
    dst: Address,

    /// JSON station configuration
    #[arg(short, long, global = true, default_value = "radiotftp.json")]
    config: PathBuf,

    /// Override the local network address
    #[arg(long, global = true)]
    net_address: Option<Address>,

    /// Override the local link address
    #[arg(long, global = true)]
    link_address: Option<Address>,

    /// Override the DATA block size
    #[arg(long, global = true)]
    block_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a file to the destination
    Put {
        /// Local file to send
        local: String,

        /// Name on the remote node
        remote: Option<String>,
    },

    /// Append a file to a remote file
    Append {
        /// Local file to send
        local: String,

        /// Name on the remote node
        remote: Option<String>,
    },

    /// Append a line of text to a remote file (`\n` becomes CR LF)
    Appendline {
        /// Text to send
        #[arg(required = true)]
        text: Vec<String>,

        /// Name on the remote node
        #[arg(short, long, default_value = "")]
        remote: String,
    },

    /// Send a small file in a single unacknowledged datagram
    Single {
        /// Local file to send
        local: String,

        /// Name on the remote node
        remote: Option<String>,
    },

    /// Fetch a file from the destination
    Get {
        /// Name on the remote node
        remote: String,
    },

    /// Announce this node, then listen for neighbours
    Hello {
        /// Stop listening after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },

    /// Receive only and report neighbours
    Listen {
        /// Stop listening after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },

    /// Decode a captured byte stream offline
    Scan {
        /// Capture file to scan
        #[arg(short, long)]
        input: String,

        /// Output JSON file for decoded frames
        #[arg(short, long)]
        output: Option<String>,

        /// Show statistics only
        #[arg(long)]
        stats_only: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let station_config = config::load(
        &cli.config,
        Overrides {
            link_address: cli.link_address,
            net_address: cli.net_address,
            block_size: cli.block_size,
        },
    )?;

    // offline, no radio needed
    if let Commands::Scan {
        input,
        output,
        stats_only,
    } = &cli.command
    {
        return commands::scan::execute(input, output.as_deref(), station_config.sync, *stats_only);
    }

    let port = RealSerialPort::open(&cli.port, cli.baud)
        .with_context(|| format!("Failed to open serial port: {}", cli.port))?;
    let station = Station::new(station_config, Instant::now())?;
    let mut runner = Runner::start(station, Box::new(port))?;
    let dst = cli.dst;

    match cli.command {
        Commands::Put { local, remote } => {
            commands::put::execute(&mut runner, dst, &local, remote.as_deref(), false)
        }

        Commands::Append { local, remote } => {
            commands::put::execute(&mut runner, dst, &local, remote.as_deref(), true)
        }

        Commands::Appendline { text, remote } => {
            commands::appendline::execute(&mut runner, dst, &text, &remote)
        }

        Commands::Single { local, remote } => {
            commands::single::execute(&mut runner, dst, &local, remote.as_deref())
        }

        Commands::Get { remote } => commands::get::execute(&mut runner, dst, &remote),

        Commands::Hello { seconds } => {
            commands::hello::execute(&mut runner, seconds.map(Duration::from_secs)).map(|_| ())
        }

        Commands::Listen { seconds } => {
            commands::hello::listen(&mut runner, seconds.map(Duration::from_secs)).map(|_| ())
        }

        Commands::Scan { .. } => Ok(()),
    }
}
