//! # Radiotftp Core
//!
//! Reliable file transfer over a narrowband, half-duplex radio link whose only
//! transport is a raw serial byte stream.
//!
//! ## Modules
//!
//! - `constants`: Wire constants, opcodes and default limits
//! - `error`: Link and transfer error types
//! - `address`: Six-byte link and network addresses
//! - `crc`: Nibble-table CRC32 frame check sequence
//! - `line_code`: Self-clocking line codec (Manchester)
//! - `sync`: Byte-at-a-time frame synchronizer and offline stream scanning
//! - `link`: Addressed, CRC-protected link frames
//! - `datagram`: Address-layer datagrams with ports
//! - `message`: Transfer engine messages
//! - `timer`: Single-slot retransmission timer
//! - `transfer`: Stop-and-wait reliable transfer engine
//! - `config`: Station configuration
//! - `station`: One node with all layers wired together
//!
//! ## Example
//!
//! ```
//! use radiotftp_core::{encode_link_frame, decode_link_frame, Address};
//!
//! let frame = encode_link_frame(&Address::DEFAULT_LINK, &Address::BROADCAST, b"hi", 534).unwrap();
//! let decoded = decode_link_frame(&frame).unwrap();
//! assert_eq!(decoded.payload.as_ref(), b"hi");
//! ```

#![warn(missing_docs)]

pub mod address;
pub mod config;
pub mod constants;
pub mod crc;
pub mod datagram;
pub mod error;
pub mod line_code;
pub mod link;
pub mod message;
pub mod station;
pub mod sync;
pub mod timer;
pub mod transfer;

// Re-export commonly used types
pub use address::Address;
pub use config::StationConfig;
pub use datagram::{Datagram, Endpoint};
pub use error::{LinkError, Result, TransferError, TransferResult};
pub use line_code::{LineCodec, Manchester};
pub use link::{decode_link_frame, destination_matches, encode_link_frame, LinkConfig, LinkFrame};
pub use message::{Message, RequestKind};
pub use station::{Station, StationEvent, Transmitter};
pub use sync::{frame_burst, scan_stream, FrameSync, OverflowPolicy, ScanStats, SyncConfig};
pub use timer::{Timer, TimerSlot};
pub use transfer::{Completion, Outbound, Progress, TransferConfig, TransferEngine};
