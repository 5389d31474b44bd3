//! Frame synchronizer
//!
//! Recovers encoded frames from the raw serial byte stream. The receiver
//! hunts for [`SYNC_WORD`], then collects bytes until it sees the
//! [`TERMINATOR`] or any byte the line codec could never have produced.
//! Ending on an invalid symbol keeps a frame whose terminator was hit by
//! noise from growing without bound.

use crate::constants::{BURST_OVERHEAD, BURST_TRAILER, DEFAULT_SYNC_CAPACITY, PREAMBLE, SYNC_WORD, TERMINATOR};
use crate::error::{LinkError, Result};
use crate::line_code::{LineCodec, Manchester};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// What to do with a frame that outgrows the receive buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Drop the frame and count it
    #[default]
    Reject,
    /// Keep writing at `index % capacity`, overwriting the start of the frame
    Wrap,
}

/// Synchronizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Receive buffer capacity in encoded bytes
    pub capacity: usize,
    /// Overflow handling
    pub overflow: OverflowPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SYNC_CAPACITY,
            overflow: OverflowPolicy::Reject,
        }
    }
}

impl SyncConfig {
    /// Check the configuration can work at runtime
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(LinkError::InvalidConfig(
                "sync capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Counters kept by a running synchronizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Sync words matched
    pub sync_words: usize,
    /// Frames handed out
    pub frames: usize,
    /// Frames dropped because they overflowed the buffer
    pub overflows: usize,
    /// Frames terminated before any byte was collected
    pub empty_frames: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Hunting { matched: usize },
    Receiving,
}

/// Byte-at-a-time frame synchronizer
#[derive(Debug, Clone)]
pub struct FrameSync<C: LineCodec = Manchester> {
    codec: C,
    config: SyncConfig,
    buf: Vec<u8>,
    index: usize,
    overflowed: bool,
    state: SyncState,
    stats: SyncStats,
}

impl FrameSync<Manchester> {
    /// Create a synchronizer for Manchester-coded frames
    pub fn new(config: SyncConfig) -> Result<Self> {
        Self::with_codec(config, Manchester)
    }
}

impl<C: LineCodec> FrameSync<C> {
    /// Create a synchronizer using `codec`'s validity predicate
    pub fn with_codec(config: SyncConfig, codec: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            codec,
            config,
            buf: vec![0u8; config.capacity],
            index: 0,
            overflowed: false,
            state: SyncState::Hunting { matched: 0 },
            stats: SyncStats::default(),
        })
    }

    /// Consume one byte; returns the encoded frame once it terminates
    pub fn on_byte_received(&mut self, byte: u8) -> Option<Bytes> {
        match self.state {
            SyncState::Hunting { matched } => {
                if byte != SYNC_WORD[matched] {
                    self.state = SyncState::Hunting { matched: 0 };
                    return None;
                }
                if matched + 1 == SYNC_WORD.len() {
                    #[cfg(feature = "logging")]
                    debug!("Sync word matched, receiving frame");

                    self.stats.sync_words += 1;
                    self.index = 0;
                    self.overflowed = false;
                    self.state = SyncState::Receiving;
                } else {
                    self.state = SyncState::Hunting { matched: matched + 1 };
                }
                None
            }
            SyncState::Receiving => {
                if byte == TERMINATOR || !self.codec.is_valid_symbol(byte) {
                    self.state = SyncState::Hunting { matched: 0 };
                    return self.finish(byte);
                }
                self.store(byte);
                None
            }
        }
    }

    /// True while no frame is being received
    pub fn is_idle(&self) -> bool {
        matches!(self.state, SyncState::Hunting { .. })
    }

    /// Counters since construction
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Abandon any frame in progress and hunt for the next sync word
    pub fn reset(&mut self) {
        self.index = 0;
        self.overflowed = false;
        self.state = SyncState::Hunting { matched: 0 };
    }

    fn store(&mut self, byte: u8) {
        let capacity = self.buf.len();
        match self.config.overflow {
            OverflowPolicy::Reject => {
                if self.index == capacity {
                    self.overflowed = true;
                } else {
                    self.buf[self.index] = byte;
                    self.index += 1;
                }
            }
            OverflowPolicy::Wrap => {
                self.buf[self.index] = byte;
                self.index = (self.index + 1) % capacity;
            }
        }
    }

    #[allow(unused_variables)]
    fn finish(&mut self, last: u8) -> Option<Bytes> {
        if self.overflowed {
            #[cfg(feature = "logging")]
            warn!(
                "Frame overflowed the {}-byte receive buffer, dropped",
                self.buf.len()
            );

            self.stats.overflows += 1;
            self.overflowed = false;
            return None;
        }

        if self.index == 0 {
            self.stats.empty_frames += 1;
            return None;
        }

        #[cfg(feature = "logging")]
        debug!(
            "Frame terminated by 0x{:02x} after {} bytes",
            last, self.index
        );

        self.stats.frames += 1;
        Some(Bytes::copy_from_slice(&self.buf[..self.index]))
    }
}

/// Wrap an encoded frame for transmission:
/// `PREAMBLE | SYNC_WORD | encoded | TERMINATOR | 0x00`
pub fn frame_burst(encoded: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded.len() + BURST_OVERHEAD);
    buf.put_slice(PREAMBLE);
    buf.put_slice(SYNC_WORD);
    buf.put_slice(encoded);
    buf.put_u8(TERMINATOR);
    buf.put_u8(BURST_TRAILER);
    buf.freeze()
}

/// An encoded frame found at a specific offset in a captured stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFrame {
    /// Offset of the first frame byte, just after the sync word
    pub offset: usize,
    /// The encoded frame, still line-coded
    pub frame: Bytes,
}

/// Statistics for an offline stream scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Total bytes scanned
    pub bytes_scanned: usize,
    /// Sync words found
    pub sync_words_found: usize,
    /// Frames recovered
    pub frames_emitted: usize,
    /// Frames dropped on buffer overflow
    pub frames_dropped: usize,
    /// Sync words followed directly by a terminator
    pub empty_frames: usize,
    /// Encoded bytes inside recovered frames
    pub bytes_recovered: usize,
}

impl ScanStats {
    /// Share of the stream that ended up inside recovered frames, in percent
    pub fn recovery_rate(&self) -> f64 {
        if self.bytes_scanned == 0 {
            0.0
        } else {
            (self.bytes_recovered as f64 / self.bytes_scanned as f64) * 100.0
        }
    }
}

/// Recover every encoded frame from a captured byte stream
///
/// Runs the same state machine as [`FrameSync::on_byte_received`]. While
/// hunting with nothing matched, bytes other than the first sync byte
/// cannot change state, so the scan jumps straight to the next candidate.
pub fn scan_stream<C: LineCodec>(
    data: &[u8],
    codec: C,
    config: SyncConfig,
) -> Result<(Vec<LocatedFrame>, ScanStats)> {
    let mut sync = FrameSync::with_codec(config, codec)?;
    let mut frames = Vec::new();
    let mut frame_start = 0;
    let mut pos = 0;

    #[cfg(feature = "logging")]
    debug!("Starting stream scan of {} bytes", data.len());

    while pos < data.len() {
        if sync.state == (SyncState::Hunting { matched: 0 }) {
            match memchr::memchr(SYNC_WORD[0], &data[pos..]) {
                Some(skip) => pos += skip,
                None => break,
            }
        }

        let was_idle = sync.is_idle();
        if let Some(frame) = sync.on_byte_received(data[pos]) {
            frames.push(LocatedFrame {
                offset: frame_start,
                frame,
            });
        }
        if was_idle && !sync.is_idle() {
            frame_start = pos + 1;
        }
        pos += 1;
    }

    let sync_stats = sync.stats();
    let stats = ScanStats {
        bytes_scanned: data.len(),
        sync_words_found: sync_stats.sync_words,
        frames_emitted: sync_stats.frames,
        frames_dropped: sync_stats.overflows,
        empty_frames: sync_stats.empty_frames,
        bytes_recovered: frames.iter().map(|f| f.frame.len()).sum(),
    };

    #[cfg(feature = "logging")]
    debug!(
        "Scan complete: {} frames from {} sync words in {} bytes",
        stats.frames_emitted, stats.sync_words_found, stats.bytes_scanned
    );

    Ok((frames, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<C: LineCodec>(sync: &mut FrameSync<C>, bytes: &[u8]) -> Vec<Bytes> {
        bytes
            .iter()
            .filter_map(|&b| sync.on_byte_received(b))
            .collect()
    }

    #[test]
    fn test_single_frame() {
        let encoded = Manchester.encode(b"frame");
        let mut sync = FrameSync::new(SyncConfig::default()).unwrap();

        let frames = feed(&mut sync, &frame_burst(&encoded));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], encoded);
        assert!(sync.is_idle());
        assert_eq!(sync.stats().frames, 1);
    }

    #[test]
    fn test_invalid_symbol_terminates() {
        let encoded = Manchester.encode(b"ab");
        let mut stream = Vec::new();
        stream.extend_from_slice(SYNC_WORD);
        stream.extend_from_slice(&encoded);
        // corrupted terminator
        stream.push(0x00);

        let mut sync = FrameSync::new(SyncConfig::default()).unwrap();
        let frames = feed(&mut sync, &stream);

        assert_eq!(frames, vec![encoded]);
    }

    #[test]
    fn test_mismatch_resets_without_overlap() {
        let mut sync = FrameSync::new(SyncConfig::default()).unwrap();

        // AA AA 55 AA 55: the second AA resets the counter instead of restarting it
        feed(&mut sync, &[0xAA, 0xAA, 0x55, 0xAA, 0x55]);
        assert!(sync.is_idle());

        feed(&mut sync, SYNC_WORD);
        assert!(!sync.is_idle());
    }

    #[test]
    fn test_empty_frame_is_not_emitted() {
        let mut sync = FrameSync::new(SyncConfig::default()).unwrap();
        let frames = feed(&mut sync, &frame_burst(&[]));

        assert!(frames.is_empty());
        assert_eq!(sync.stats().empty_frames, 1);
    }

    #[test]
    fn test_overflow_reject() {
        let config = SyncConfig {
            capacity: 4,
            overflow: OverflowPolicy::Reject,
        };
        let mut sync = FrameSync::new(config).unwrap();
        let frames = feed(&mut sync, &frame_burst(&Manchester.encode(b"abc")));

        assert!(frames.is_empty());
        assert_eq!(sync.stats().overflows, 1);

        // next frame still decodes
        let encoded = Manchester.encode(b"ab");
        assert_eq!(feed(&mut sync, &frame_burst(&encoded)), vec![encoded]);
    }

    #[test]
    fn test_overflow_wrap() {
        let config = SyncConfig {
            capacity: 4,
            overflow: OverflowPolicy::Wrap,
        };
        let mut sync = FrameSync::new(config).unwrap();
        // six symbols into a four byte buffer: the last two overwrite the first two
        let encoded = Manchester.encode(&[0x01, 0x23, 0x45]);
        let frames = feed(&mut sync, &frame_burst(&encoded));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &encoded[4..6]);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = SyncConfig {
            capacity: 0,
            overflow: OverflowPolicy::Reject,
        };
        assert!(FrameSync::new(config).is_err());
    }

    #[test]
    fn test_scan_stream_with_noise() {
        let first = Manchester.encode(b"one");
        let second = Manchester.encode(b"two");

        let mut stream = vec![0x13, 0xAA, 0x37, 0x00];
        stream.extend_from_slice(&frame_burst(&first));
        stream.extend_from_slice(&[0xAA, 0x55, 0xFF, 0xAA]);
        let second_at = stream.len() + PREAMBLE.len() + SYNC_WORD.len();
        stream.extend_from_slice(&frame_burst(&second));

        let (frames, stats) = scan_stream(&stream, Manchester, SyncConfig::default()).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame, first);
        assert_eq!(frames[0].offset, 4 + PREAMBLE.len() + SYNC_WORD.len());
        assert_eq!(frames[1].frame, second);
        assert_eq!(frames[1].offset, second_at);
        assert_eq!(stats.sync_words_found, 2);
        assert_eq!(stats.frames_emitted, 2);
        assert_eq!(stats.bytes_scanned, stream.len());
        assert_eq!(stats.bytes_recovered, first.len() + second.len());
    }

    #[test]
    fn test_scan_matches_bytewise_sync() {
        let mut stream = Vec::new();
        for payload in [&b"alpha"[..], b"", b"gamma"] {
            stream.extend_from_slice(&[0xAA, 0x12, 0xAA, 0x55, 0x13]);
            stream.extend_from_slice(&frame_burst(&Manchester.encode(payload)));
        }

        let mut sync = FrameSync::new(SyncConfig::default()).unwrap();
        let bytewise = feed(&mut sync, &stream);
        let (scanned, _) = scan_stream(&stream, Manchester, SyncConfig::default()).unwrap();

        assert_eq!(
            scanned.into_iter().map(|f| f.frame).collect::<Vec<_>>(),
            bytewise
        );
    }
}
