//! Error types for the radio transport stack

/// Errors raised below the transfer engine: line coding, link frames,
/// datagrams, messages and configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Symbol that the line codec can never produce
    #[error("Invalid line-code symbol 0x{symbol:02x} at offset {offset}")]
    InvalidSymbol {
        /// Offset of the symbol in the encoded frame
        offset: usize,
        /// The offending byte
        symbol: u8,
    },

    /// Encoded frame does not hold a whole number of data bytes
    #[error("Encoded length {0} is not a multiple of the codec expansion")]
    TruncatedSymbol(usize),

    /// Payload larger than the configured maximum
    #[error("Payload size {0} exceeds maximum {1}")]
    PayloadTooLarge(usize, usize),

    /// Buffer too short to hold the fixed fields
    #[error("Incomplete frame: expected at least {expected} bytes, got {actual}")]
    IncompleteFrame {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes supplied
        actual: usize,
    },

    /// Declared length field disagrees with the supplied frame length
    #[error("Length mismatch: header says {declared}, frame has {actual}")]
    LengthMismatch {
        /// Length declared inside the frame
        declared: usize,
        /// Length supplied by the layer below
        actual: usize,
    },

    /// Frame check sequence mismatch
    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// FCS carried by the frame
        expected: u32,
        /// FCS recomputed over the frame
        actual: u32,
    },

    /// Message opcode outside the known set
    #[error("Unknown opcode 0x{0:04x}")]
    UnknownOpcode(u16),

    /// Message that cannot be parsed
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Address text that cannot be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration that cannot work at runtime
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors surfaced by the reliable transfer engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// An outbound frame is still staged; try again later
    #[error("Outbound frame still queued, try again later")]
    QueueBusy,

    /// A transfer is already in flight
    #[error("A transfer session is already in progress")]
    SessionBusy,

    /// This node only sends files
    #[error("Read requests are not supported by this node")]
    ReadNotSupported,

    /// Nothing to send
    #[error("No local data to send")]
    NoData,

    /// Payload too large for the selected mode
    #[error("Payload size {0} exceeds maximum {1}")]
    PayloadTooLarge(usize, usize),

    /// Transfer needs more DATA blocks than the wire can number
    #[error("Transfer needs {blocks} blocks, at most {max} are addressable")]
    TooManyBlocks {
        /// Blocks the transfer would need
        blocks: usize,
        /// Blocks addressable by the 8-bit block field
        max: usize,
    },

    /// Retransmission budget exhausted
    #[error("No answer after {0} timeouts, session closed")]
    RetriesExhausted(u8),

    /// Peer reported a failure
    #[error("Peer error {code}: {message}")]
    Remote {
        /// ERROR code sent by the peer
        code: u16,
        /// ERROR text sent by the peer
        message: String,
    },

    /// Encapsulation failed
    #[error("Link error: {0}")]
    Link(#[from] LinkError),
}

/// Result type alias for link-level operations
pub type Result<T> = core::result::Result<T, LinkError>;

/// Result type alias for transfer engine operations
pub type TransferResult<T> = core::result::Result<T, TransferError>;
