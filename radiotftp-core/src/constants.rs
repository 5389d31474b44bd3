//! Wire constants and default limits for the radio transport stack

/// Training preamble sent ahead of every burst so the receiver can recover bit clock.
/// Its content is never validated on receive.
pub const PREAMBLE: &[u8; 10] = &[0x55; 10];

/// Sync word marking the start of an encoded frame
pub const SYNC_WORD: &[u8; 4] = &[0xAA, 0x55, 0xAA, 0x55];

/// Explicit end-of-frame marker. Not a valid line-code symbol.
pub const TERMINATOR: u8 = 0x1C;

/// Byte sent after the terminator to flush the radio's transmit path
pub const BURST_TRAILER: u8 = 0x00;

/// Bytes added around an encoded frame by [`crate::sync::frame_burst`]
pub const BURST_OVERHEAD: usize = PREAMBLE.len() + SYNC_WORD.len() + 2;

/// Size of a link or network address
pub const ADDRESS_LEN: usize = 6;

/// Size of the link frame length field
pub const LINK_LENGTH_LEN: usize = 2;

/// Size of the link frame check sequence (CRC32)
pub const FCS_LEN: usize = 4;

/// Link header size: destination + source + length
pub const LINK_HEADER_LEN: usize = ADDRESS_LEN * 2 + LINK_LENGTH_LEN;

/// Total link overhead: header + FCS
pub const LINK_OVERHEAD: usize = LINK_HEADER_LEN + FCS_LEN;

/// Datagram header: src addr + dst addr + src port + dst port + length
pub const DATAGRAM_HEADER_LEN: usize = ADDRESS_LEN * 2 + 2 + 2 + 2;

/// Message header: opcode (2) + block number or error code (2)
pub const MESSAGE_HEADER_LEN: usize = 4;

/// Default maximum DATA block size
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Default maximum link payload: one full DATA datagram
pub const DEFAULT_MAX_LINK_PAYLOAD: usize =
    DATAGRAM_HEADER_LEN + MESSAGE_HEADER_LEN + DEFAULT_BLOCK_SIZE;

/// Default synchronizer buffer capacity: the largest link frame after line coding
pub const DEFAULT_SYNC_CAPACITY: usize = (DEFAULT_MAX_LINK_PAYLOAD + LINK_OVERHEAD) * 2;

/// Largest payload accepted by single-datagram mode
pub const SINGLE_DATAGRAM_MAX_LEN: usize = 450;

/// Remote filenames in single-datagram mode are cut to this many bytes
pub const SINGLE_FILENAME_MAX_LEN: usize = 16;

/// Remote filename used when the caller supplies none
pub const DEFAULT_REMOTE_FILENAME: &str = "sensors.dat";

/// Transfer mode string carried by every request
pub const TRANSFER_MODE: &str = "netascii";

/// Request option asking the peer to append instead of overwrite
pub const APPEND_OPTION: &str = "append";

/// ERROR text a peer uses to signal a successful transfer
pub const COMPLETE_SENTINEL: &str = "TRANSMISSION COMPLETE";

/// Highest DATA block number representable on the wire (low byte only)
pub const MAX_DATA_BLOCKS: usize = u8::MAX as usize;

/// Well-known request port
pub const TFTP_PORT: u16 = 69;

/// Neighbour discovery port
pub const HELLO_PORT: u16 = 12345;

/// Payload of the neighbour discovery broadcast
pub const HELLO_PAYLOAD: &[u8] = b"hello world\n";

/// Destination port for DATA before any ACK has named one
pub const DEFAULT_TRANSFER_DST_PORT: u16 = 70;

/// Transfer port before the first request picks a random one
pub const DEFAULT_TRANSFER_SRC_PORT: u16 = 71;

/// Lower bound of the randomized retransmission delay, in milliseconds
pub const RETRANSMIT_MIN_MS: u64 = 2_000;

/// Upper bound of the randomized retransmission delay, in milliseconds
pub const RETRANSMIT_MAX_MS: u64 = 5_000;

/// Extra delay added to the first timer after a request, in milliseconds
pub const REQUEST_EXTRA_MS: u64 = 1_000;

/// Fixed slack added to every timer, in milliseconds
pub const TIMER_SLACK_MS: u64 = 128;

/// How long single-datagram mode waits before closing, in milliseconds
pub const SINGLE_WAIT_MS: u64 = 3_000;

/// Longest delay any transfer timer may be armed with, in milliseconds
pub const MAX_TIMER_DELAY_MS: u64 = 3_600_000;

/// Timeouts tolerated before a session is aborted
pub const MAX_TIMEOUTS: u8 = 5;

/// Transfer engine opcodes (the high byte on the wire is always zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Read request
    Rrq = 1,
    /// Write request
    Wrq = 2,
    /// Data block
    Data = 3,
    /// Acknowledgment
    Ack = 4,
    /// Error or status notification
    Error = 5,
    /// Write request carrying the whole file inline
    WrqSingle = 10,
}

impl Opcode {
    /// Map a wire value to an opcode
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Opcode::Rrq),
            2 => Some(Opcode::Wrq),
            3 => Some(Opcode::Data),
            4 => Some(Opcode::Ack),
            5 => Some(Opcode::Error),
            10 => Some(Opcode::WrqSingle),
            _ => None,
        }
    }

    /// Wire value of this opcode
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// True for the two request opcodes that wait for ACK(0)
    pub const fn is_request(&self) -> bool {
        matches!(self, Opcode::Rrq | Opcode::Wrq)
    }
}
