//! Reliable transfer engine
//!
//! A stop-and-wait, block-acknowledged sender built on the TFTP opcode set.
//! One session at a time moves through IDLE and SENDING:
//!
//! - chunked mode sends a request to port 69, waits for ACK(0), then answers
//!   every ACK(n) with DATA(n + 1) until the final block is acknowledged;
//! - single-datagram mode sends the whole payload inside one request and
//!   closes the session when its wait timer expires.
//!
//! Retransmission is driven only by the timer. Every expiry resends the last
//! datagram verbatim after a randomized delay, until the retry budget is spent.

use crate::address::Address;
use crate::constants::{
    Opcode, COMPLETE_SENTINEL, DEFAULT_BLOCK_SIZE, DEFAULT_REMOTE_FILENAME,
    DEFAULT_TRANSFER_DST_PORT, DEFAULT_TRANSFER_SRC_PORT, MAX_DATA_BLOCKS, MAX_TIMEOUTS,
    REQUEST_EXTRA_MS, RETRANSMIT_MAX_MS, RETRANSMIT_MIN_MS, SINGLE_DATAGRAM_MAX_LEN,
    MAX_TIMER_DELAY_MS, SINGLE_WAIT_MS, TFTP_PORT, TIMER_SLACK_MS, TRANSFER_MODE,
};
use crate::datagram::{Datagram, Endpoint};
use crate::error::{LinkError, TransferError, TransferResult};
use crate::message::{Message, RequestKind};
use crate::timer::Timer;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Transfer engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Maximum DATA block size
    pub block_size: usize,
    /// Retransmissions allowed before the session is aborted
    pub max_timeouts: u8,
    /// Lower bound of the retransmission delay
    pub retransmit_min_ms: u64,
    /// Upper bound of the retransmission delay
    pub retransmit_max_ms: u64,
    /// Added to the first timer after a request
    pub request_extra_ms: u64,
    /// Added to every timer
    pub timer_slack_ms: u64,
    /// Single-datagram mode wait before closing
    pub single_wait_ms: u64,
    /// Largest payload accepted by single-datagram mode
    pub single_max_len: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_timeouts: MAX_TIMEOUTS,
            retransmit_min_ms: RETRANSMIT_MIN_MS,
            retransmit_max_ms: RETRANSMIT_MAX_MS,
            request_extra_ms: REQUEST_EXTRA_MS,
            timer_slack_ms: TIMER_SLACK_MS,
            single_wait_ms: SINGLE_WAIT_MS,
            single_max_len: SINGLE_DATAGRAM_MAX_LEN,
        }
    }
}

impl TransferConfig {
    /// Check the configuration can work at runtime
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.block_size == 0 {
            return Err(LinkError::InvalidConfig("block_size must be non-zero".into()));
        }
        if self.max_timeouts == 0 {
            return Err(LinkError::InvalidConfig(
                "max_timeouts must allow at least one retry".into(),
            ));
        }
        if self.retransmit_min_ms > self.retransmit_max_ms {
            return Err(LinkError::InvalidConfig(format!(
                "retransmit window {}..={} ms is empty",
                self.retransmit_min_ms, self.retransmit_max_ms
            )));
        }
        let longest = self
            .retransmit_max_ms
            .saturating_add(self.request_extra_ms)
            .max(self.single_wait_ms)
            .saturating_add(self.timer_slack_ms);
        if longest > MAX_TIMER_DELAY_MS {
            return Err(LinkError::InvalidConfig(format!(
                "timer delay of {} ms exceeds the {} ms limit",
                longest, MAX_TIMER_DELAY_MS
            )));
        }
        Ok(())
    }

    /// DATA blocks needed to carry `len` bytes; a zero-length file still takes one
    pub fn blocks_for(&self, len: usize) -> usize {
        len.div_ceil(self.block_size).max(1)
    }
}

/// Where the engine hands datagrams for transmission
pub trait Outbound {
    /// Stage `datagram` for sending. Fails with [`TransferError::QueueBusy`]
    /// while an earlier frame is still waiting.
    fn queue(&mut self, datagram: &Datagram) -> TransferResult<()>;
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The peer acknowledged everything, or reported completion
    Delivered,
    /// The session was aborted
    Failed(TransferError),
}

/// Progress of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Blocks the peer has acknowledged
    pub acked_blocks: usize,
    /// Blocks in the whole transfer
    pub total_blocks: usize,
}

/// Bytes of block `block` (numbered from 1) of `data`
///
/// Blocks are sliced by number, never by a running cursor, so a block can
/// be regenerated identically however often it was sent before.
pub fn block_slice(data: &Bytes, block_size: usize, block: u16) -> Bytes {
    let start = block_size
        .saturating_mul(usize::from(block).saturating_sub(1))
        .min(data.len());
    let end = start.saturating_add(block_size).min(data.len());
    data.slice(start..end)
}

#[derive(Debug, Clone)]
struct Outgoing {
    opcode: Opcode,
    block: u16,
    datagram: Datagram,
}

#[derive(Debug, Clone)]
struct Session {
    last: Outgoing,
    data: Bytes,
    append: bool,
    acked: Option<u16>,
    timeouts: u8,
    peer: Endpoint,
    total_blocks: usize,
}

impl Session {
    fn is_single(&self) -> bool {
        self.last.opcode == Opcode::WrqSingle
    }

    fn awaiting_ack(&self) -> bool {
        self.last.opcode.is_request() || self.acked.map_or(true, |acked| self.last.block > acked)
    }
}

/// The transfer engine: one session, one timer, one outbound slot
#[derive(Debug)]
pub struct TransferEngine<R: Rng = StdRng> {
    local: Address,
    config: TransferConfig,
    rng: R,
    transfer_port: u16,
    session: Option<Session>,
}

impl TransferEngine<StdRng> {
    /// Create an engine for the node at network address `local`
    pub fn new(local: Address, config: TransferConfig) -> Result<Self, LinkError> {
        Self::with_rng(local, config, StdRng::from_entropy())
    }
}

impl<R: Rng> TransferEngine<R> {
    /// Create an engine with a caller-supplied random source
    pub fn with_rng(local: Address, config: TransferConfig, rng: R) -> Result<Self, LinkError> {
        config.validate()?;
        Ok(Self {
            local,
            config,
            rng,
            transfer_port: DEFAULT_TRANSFER_SRC_PORT,
            session: None,
        })
    }

    /// True when no session is in flight
    pub fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    /// Local port of the current (or last) transfer
    pub fn transfer_port(&self) -> u16 {
        self.transfer_port
    }

    /// Progress of the session in flight
    pub fn progress(&self) -> Option<Progress> {
        self.session.as_ref().map(|s| Progress {
            acked_blocks: s.acked.map_or(0, usize::from),
            total_blocks: s.total_blocks,
        })
    }

    /// True if the session in flight asked the peer to append
    pub fn is_append(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.append)
    }

    /// Start a chunked transfer of `data` to `dst`
    ///
    /// Nothing changes unless the request was accepted by `link`.
    #[allow(clippy::too_many_arguments)]
    pub fn send_request(
        &mut self,
        kind: RequestKind,
        dst: Address,
        data: Bytes,
        filename: &str,
        append: bool,
        link: &mut impl Outbound,
        timer: &mut impl Timer,
    ) -> TransferResult<()> {
        if self.session.is_some() {
            return Err(TransferError::SessionBusy);
        }
        if kind == RequestKind::Read {
            #[cfg(feature = "logging")]
            warn!("This node does not receive files, read request refused");

            return Err(TransferError::ReadNotSupported);
        }
        if data.is_empty() {
            return Err(TransferError::NoData);
        }

        let total_blocks = self.config.blocks_for(data.len());
        if total_blocks > MAX_DATA_BLOCKS {
            return Err(TransferError::TooManyBlocks {
                blocks: total_blocks,
                max: MAX_DATA_BLOCKS,
            });
        }

        let filename = remote_filename(filename);
        let port = self.random_port();
        let message = Message::Request {
            kind,
            filename: filename.to_string(),
            mode: TRANSFER_MODE.to_string(),
            append,
        };
        let datagram = Datagram::new(
            Endpoint::new(self.local, port),
            Endpoint::new(dst, TFTP_PORT),
            message.encode(),
        );

        link.queue(&datagram)?;

        #[cfg(feature = "logging")]
        debug!(
            "WRQ '{}' to {} from port {}: {} bytes in {} blocks{}",
            filename,
            dst,
            port,
            data.len(),
            total_blocks,
            if append { ", append" } else { "" }
        );

        let delay = self
            .retransmit_delay()
            .saturating_add(Duration::from_millis(self.config.request_extra_ms));
        timer.arm(delay);

        self.transfer_port = port;
        self.session = Some(Session {
            last: Outgoing {
                opcode: message.opcode(),
                block: 0,
                datagram,
            },
            data,
            append,
            acked: None,
            timeouts: 0,
            peer: Endpoint::new(dst, DEFAULT_TRANSFER_DST_PORT),
            total_blocks,
        });
        Ok(())
    }

    /// Send `data` inline in a single request and close after a fixed wait
    pub fn send_single(
        &mut self,
        dst: Address,
        data: Bytes,
        filename: &str,
        link: &mut impl Outbound,
        timer: &mut impl Timer,
    ) -> TransferResult<()> {
        if self.session.is_some() {
            return Err(TransferError::SessionBusy);
        }
        if data.is_empty() {
            return Err(TransferError::NoData);
        }
        if data.len() > self.config.single_max_len {
            return Err(TransferError::PayloadTooLarge(
                data.len(),
                self.config.single_max_len,
            ));
        }

        let filename = remote_filename(filename);
        let port = self.random_port();
        let message = Message::SingleWrite {
            filename: filename.to_string(),
            mode: TRANSFER_MODE.to_string(),
            data: data.clone(),
        };
        let datagram = Datagram::new(
            Endpoint::new(self.local, port),
            Endpoint::new(dst, TFTP_PORT),
            message.encode(),
        );

        link.queue(&datagram)?;

        #[cfg(feature = "logging")]
        debug!(
            "Single datagram '{}' to {} from port {}: {} bytes",
            filename,
            dst,
            port,
            data.len()
        );

        timer.arm(Duration::from_millis(
            self.config.single_wait_ms.saturating_add(self.config.timer_slack_ms),
        ));

        self.transfer_port = port;
        self.session = Some(Session {
            last: Outgoing {
                opcode: Opcode::WrqSingle,
                block: 0,
                datagram,
            },
            data,
            append: false,
            acked: None,
            timeouts: 0,
            peer: Endpoint::new(dst, TFTP_PORT),
            total_blocks: 1,
        });
        Ok(())
    }

    /// Feed a message that arrived on the transfer port from `from`
    pub fn on_message(
        &mut self,
        from: Endpoint,
        message: Message,
        link: &mut impl Outbound,
        timer: &mut impl Timer,
    ) -> Option<Completion> {
        let session = match self.session.as_mut() {
            Some(session) if !session.is_single() => session,
            _ => {
                #[cfg(feature = "logging")]
                debug!("Discarding {:?} from {}: no chunked session", message.opcode(), from);

                return None;
            }
        };

        match message {
            Message::Ack { block } => {
                let current = session.last.block;
                if block > current {
                    #[cfg(feature = "logging")]
                    debug!("Ignoring ACK {} for a block not yet sent (current {})", block, current);

                    return None;
                }
                if block < current.saturating_sub(1) {
                    #[cfg(feature = "logging")]
                    debug!("Ignoring stale ACK {} (current {})", block, current);

                    return None;
                }

                timer.cancel();
                session.acked = Some(block);
                session.timeouts = 0;
                session.peer = from;

                #[cfg(feature = "logging")]
                debug!("ACK {} from {}", block, from);

                if usize::from(block) >= session.total_blocks {
                    #[cfg(feature = "logging")]
                    debug!("Final block acknowledged, transfer complete");

                    self.session = None;
                    return Some(Completion::Delivered);
                }

                self.send_data(block + 1, link, timer);
                None
            }
            Message::Error { code, message } => {
                timer.cancel();
                self.session = None;

                if code == 0 && message.starts_with(COMPLETE_SENTINEL) {
                    #[cfg(feature = "logging")]
                    debug!("Peer reported transmission complete");

                    Some(Completion::Delivered)
                } else {
                    #[cfg(feature = "logging")]
                    warn!("Peer error {}: {}, session closed", code, message);

                    Some(Completion::Failed(TransferError::Remote { code, message }))
                }
            }
            _other => {
                #[cfg(feature = "logging")]
                debug!("Discarding {:?} from {} while sending", _other.opcode(), from);

                None
            }
        }
    }

    /// Handle expiry of the retransmission timer
    pub fn on_timeout(
        &mut self,
        link: &mut impl Outbound,
        timer: &mut impl Timer,
    ) -> Option<Completion> {
        let session = self.session.as_mut()?;

        if session.is_single() {
            #[cfg(feature = "logging")]
            debug!("Single datagram wait over, connection closed");

            self.session = None;
            return Some(Completion::Delivered);
        }

        if !session.awaiting_ack() {
            return None;
        }

        if session.timeouts >= self.config.max_timeouts {
            let timeouts = session.timeouts;

            #[cfg(feature = "logging")]
            warn!("No answer after {} retransmissions, session aborted", timeouts);

            self.session = None;
            return Some(Completion::Failed(TransferError::RetriesExhausted(timeouts)));
        }

        session.timeouts += 1;

        #[cfg(feature = "logging")]
        warn!(
            "Timeout {} waiting for ACK {}, retransmitting {:?}",
            session.timeouts, session.last.block, session.last.opcode
        );

        let datagram = session.last.datagram.clone();
        let delay = self.retransmit_delay();
        timer.arm(delay);

        if let Err(_e) = link.queue(&datagram) {
            #[cfg(feature = "logging")]
            warn!("Retransmission not queued: {}", _e);
        }
        None
    }

    fn send_data(&mut self, block: u16, link: &mut impl Outbound, timer: &mut impl Timer) {
        let delay = self.retransmit_delay();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let data = block_slice(&session.data, self.config.block_size, block);
        // block never exceeds MAX_DATA_BLOCKS, checked when the session started
        let message = Message::Data {
            block: block as u8,
            data,
        };
        let datagram = Datagram::new(
            Endpoint::new(self.local, self.transfer_port),
            session.peer,
            message.encode(),
        );

        session.last = Outgoing {
            opcode: Opcode::Data,
            block,
            datagram,
        };
        timer.arm(delay);

        #[cfg(feature = "logging")]
        debug!(
            "DATA {} ({} bytes) to {}",
            block,
            session.last.datagram.payload.len() - 4,
            session.peer
        );

        if let Err(_e) = link.queue(&session.last.datagram) {
            #[cfg(feature = "logging")]
            warn!("DATA {} not queued, timer will retry: {}", block, _e);
        }
    }

    fn retransmit_delay(&mut self) -> Duration {
        let ms = self
            .rng
            .gen_range(self.config.retransmit_min_ms..=self.config.retransmit_max_ms);
        Duration::from_millis(ms.saturating_add(self.config.timer_slack_ms))
    }

    fn random_port(&mut self) -> u16 {
        loop {
            let port = self.rng.gen_range(1..=u16::MAX);
            if port != TFTP_PORT {
                return port;
            }
        }
    }
}

fn remote_filename(filename: &str) -> &str {
    if filename.is_empty() {
        #[cfg(feature = "logging")]
        debug!("Empty remote filename, using '{}'", DEFAULT_REMOTE_FILENAME);

        DEFAULT_REMOTE_FILENAME
    } else {
        filename
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockLink {
        sent: Vec<Datagram>,
        busy: bool,
    }

    impl Outbound for MockLink {
        fn queue(&mut self, datagram: &Datagram) -> TransferResult<()> {
            if self.busy {
                return Err(TransferError::QueueBusy);
            }
            self.sent.push(datagram.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockTimer {
        armed: Option<Duration>,
        arms: usize,
    }

    impl Timer for MockTimer {
        fn arm(&mut self, delay: Duration) {
            self.armed = Some(delay);
            self.arms += 1;
        }

        fn cancel(&mut self) {
            self.armed = None;
        }
    }

    const PEER: Address = Address([1, 2, 3, 4, 5, 6]);

    fn engine() -> TransferEngine<StdRng> {
        TransferEngine::with_rng(
            Address::DEFAULT_NET,
            TransferConfig::default(),
            StdRng::seed_from_u64(7),
        )
        .unwrap()
    }

    fn parse(datagram: &Datagram) -> Message {
        Message::parse(&datagram.payload).unwrap()
    }

    fn ack(block: u16) -> Message {
        Message::Ack { block }
    }

    fn start(engine: &mut TransferEngine, data: &[u8], link: &mut MockLink, timer: &mut MockTimer) {
        engine
            .send_request(
                RequestKind::Write,
                PEER,
                Bytes::copy_from_slice(data),
                "log.txt",
                false,
                link,
                timer,
            )
            .unwrap();
    }

    #[test]
    fn test_chunked_exchange() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();
        let data: Vec<u8> = (0..1024u32).map(|i| i as u8).collect();

        start(&mut engine, &data, &mut link, &mut timer);
        let wrq = &link.sent[0];
        assert_eq!(wrq.dst, Endpoint::new(PEER, TFTP_PORT));
        assert_eq!(wrq.src.port, engine.transfer_port());
        assert_ne!(wrq.src.port, TFTP_PORT);
        assert!(matches!(parse(wrq), Message::Request { append: false, .. }));
        let delay = timer.armed.unwrap();
        assert!(delay >= Duration::from_millis(3_128) && delay <= Duration::from_millis(6_128));

        let peer = Endpoint::new(PEER, 3000);
        assert_eq!(engine.on_message(peer, ack(0), &mut link, &mut timer), None);
        assert_eq!(link.sent[1].dst, peer);
        assert_eq!(
            parse(&link.sent[1]),
            Message::Data {
                block: 1,
                data: Bytes::copy_from_slice(&data[..512])
            }
        );

        assert_eq!(engine.on_message(peer, ack(1), &mut link, &mut timer), None);
        assert_eq!(
            parse(&link.sent[2]),
            Message::Data {
                block: 2,
                data: Bytes::copy_from_slice(&data[512..])
            }
        );
        assert_eq!(
            engine.progress(),
            Some(Progress {
                acked_blocks: 1,
                total_blocks: 2
            })
        );

        assert_eq!(
            engine.on_message(peer, ack(2), &mut link, &mut timer),
            Some(Completion::Delivered)
        );
        assert!(engine.is_idle());
        assert_eq!(timer.armed, None);
        assert_eq!(link.sent.len(), 3);
    }

    #[test]
    fn test_retransmission_bound() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();
        start(&mut engine, b"payload", &mut link, &mut timer);

        for _ in 0..MAX_TIMEOUTS {
            assert_eq!(engine.on_timeout(&mut link, &mut timer), None);
            let delay = timer.armed.unwrap();
            assert!(delay >= Duration::from_millis(2_128) && delay <= Duration::from_millis(5_128));
        }
        assert_eq!(
            engine.on_timeout(&mut link, &mut timer),
            Some(Completion::Failed(TransferError::RetriesExhausted(MAX_TIMEOUTS)))
        );

        assert!(engine.is_idle());
        assert_eq!(link.sent.len(), 1 + MAX_TIMEOUTS as usize);
        assert!(link.sent.iter().all(|d| *d == link.sent[0]));
    }

    #[test]
    fn test_data_retransmitted_verbatim() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();
        start(&mut engine, &[0x42; 700], &mut link, &mut timer);

        let peer = Endpoint::new(PEER, 4000);
        engine.on_message(peer, ack(0), &mut link, &mut timer);
        engine.on_timeout(&mut link, &mut timer);
        engine.on_timeout(&mut link, &mut timer);

        assert_eq!(link.sent.len(), 4);
        assert_eq!(link.sent[2], link.sent[1]);
        assert_eq!(link.sent[3], link.sent[1]);

        // progress resets the counter
        engine.on_message(peer, ack(1), &mut link, &mut timer);
        for _ in 0..MAX_TIMEOUTS {
            assert_eq!(engine.on_timeout(&mut link, &mut timer), None);
        }
        assert!(!engine.is_idle());
    }

    #[test]
    fn test_stale_and_future_acks_ignored() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();
        start(&mut engine, &[7u8; 2000], &mut link, &mut timer);
        let peer = Endpoint::new(PEER, 5000);

        engine.on_message(peer, ack(0), &mut link, &mut timer);
        engine.on_message(peer, ack(1), &mut link, &mut timer);
        engine.on_message(peer, ack(2), &mut link, &mut timer);
        assert_eq!(link.sent.len(), 4);

        // DATA 3 is outstanding
        engine.on_message(peer, ack(0), &mut link, &mut timer);
        engine.on_message(peer, ack(9), &mut link, &mut timer);
        assert_eq!(link.sent.len(), 4);
        assert!(timer.armed.is_some());

        // duplicate of the previous block regenerates DATA 3
        engine.on_message(peer, ack(2), &mut link, &mut timer);
        assert_eq!(link.sent.len(), 5);
        assert_eq!(link.sent[4], link.sent[3]);
    }

    #[test]
    fn test_complete_sentinel() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();
        start(&mut engine, b"abc", &mut link, &mut timer);

        let done = engine.on_message(
            Endpoint::new(PEER, 69),
            Message::Error {
                code: 0,
                message: COMPLETE_SENTINEL.into(),
            },
            &mut link,
            &mut timer,
        );
        assert_eq!(done, Some(Completion::Delivered));
        assert!(engine.is_idle());
        assert_eq!(timer.armed, None);
    }

    #[test]
    fn test_remote_error_fails() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();
        start(&mut engine, b"abc", &mut link, &mut timer);

        let done = engine.on_message(
            Endpoint::new(PEER, 69),
            Message::Error {
                code: 3,
                message: "disk full".into(),
            },
            &mut link,
            &mut timer,
        );
        assert_eq!(
            done,
            Some(Completion::Failed(TransferError::Remote {
                code: 3,
                message: "disk full".into()
            }))
        );
        assert!(engine.is_idle());
    }

    #[test]
    fn test_refusals() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();

        let read = engine.send_request(
            RequestKind::Read,
            PEER,
            Bytes::from_static(b"x"),
            "f",
            false,
            &mut link,
            &mut timer,
        );
        assert_eq!(read, Err(TransferError::ReadNotSupported));

        let empty = engine.send_request(
            RequestKind::Write,
            PEER,
            Bytes::new(),
            "f",
            false,
            &mut link,
            &mut timer,
        );
        assert_eq!(empty, Err(TransferError::NoData));

        start(&mut engine, b"abc", &mut link, &mut timer);
        let busy = engine.send_single(PEER, Bytes::from_static(b"x"), "f", &mut link, &mut timer);
        assert_eq!(busy, Err(TransferError::SessionBusy));
        assert_eq!(link.sent.len(), 1);
    }

    #[test]
    fn test_too_many_blocks() {
        let config = TransferConfig {
            block_size: 1,
            ..TransferConfig::default()
        };
        let mut engine =
            TransferEngine::with_rng(Address::DEFAULT_NET, config, StdRng::seed_from_u64(1)).unwrap();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();

        let result = engine.send_request(
            RequestKind::Write,
            PEER,
            Bytes::from(vec![0u8; 256]),
            "f",
            false,
            &mut link,
            &mut timer,
        );
        assert_eq!(
            result,
            Err(TransferError::TooManyBlocks {
                blocks: 256,
                max: 255
            })
        );
        assert!(link.sent.is_empty());
    }

    #[test]
    fn test_busy_queue_leaves_engine_idle() {
        let mut engine = engine();
        let mut link = MockLink {
            busy: true,
            ..MockLink::default()
        };
        let mut timer = MockTimer::default();

        let result = engine.send_request(
            RequestKind::Write,
            PEER,
            Bytes::from_static(b"abc"),
            "f",
            true,
            &mut link,
            &mut timer,
        );
        assert_eq!(result, Err(TransferError::QueueBusy));
        assert!(engine.is_idle());
        assert_eq!(timer.arms, 0);
    }

    #[test]
    fn test_default_filename_and_append() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();

        engine
            .send_request(
                RequestKind::Write,
                PEER,
                Bytes::from_static(b"abc"),
                "",
                true,
                &mut link,
                &mut timer,
            )
            .unwrap();

        assert!(engine.is_append());
        assert_eq!(
            parse(&link.sent[0]),
            Message::Request {
                kind: RequestKind::Write,
                filename: DEFAULT_REMOTE_FILENAME.into(),
                mode: TRANSFER_MODE.into(),
                append: true,
            }
        );
    }

    #[test]
    fn test_single_mode() {
        let mut engine = engine();
        let mut link = MockLink::default();
        let mut timer = MockTimer::default();

        let too_big = engine.send_single(
            PEER,
            Bytes::from(vec![0u8; 451]),
            "s",
            &mut link,
            &mut timer,
        );
        assert_eq!(too_big, Err(TransferError::PayloadTooLarge(451, 450)));

        engine
            .send_single(PEER, Bytes::from(vec![9u8; 100]), "s", &mut link, &mut timer)
            .unwrap();
        assert_eq!(timer.armed, Some(Duration::from_millis(3_128)));
        assert!(matches!(parse(&link.sent[0]), Message::SingleWrite { ref data, .. } if data.len() == 100));

        // ACK and ERROR do not end single mode
        let peer = Endpoint::new(PEER, 69);
        assert_eq!(engine.on_message(peer, ack(0), &mut link, &mut timer), None);
        assert!(!engine.is_idle());

        assert_eq!(
            engine.on_timeout(&mut link, &mut timer),
            Some(Completion::Delivered)
        );
        assert!(engine.is_idle());
        assert_eq!(link.sent.len(), 1);
    }

    #[test]
    fn test_block_slice() {
        let data = Bytes::from((0..10u8).collect::<Vec<_>>());
        assert_eq!(block_slice(&data, 4, 1).as_ref(), &[0, 1, 2, 3]);
        assert_eq!(block_slice(&data, 4, 3).as_ref(), &[8, 9]);
        assert!(block_slice(&data, 4, 4).is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(TransferConfig::default().validate().is_ok());
        assert!(TransferConfig {
            retransmit_min_ms: 10,
            retransmit_max_ms: 5,
            ..TransferConfig::default()
        }
        .validate()
        .is_err());
        assert!(TransferConfig {
            max_timeouts: 0,
            ..TransferConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_config_rejects_unbounded_timers() {
        let huge = [
            TransferConfig {
                retransmit_max_ms: u64::MAX,
                ..TransferConfig::default()
            },
            TransferConfig {
                timer_slack_ms: u64::MAX,
                ..TransferConfig::default()
            },
            TransferConfig {
                single_wait_ms: u64::MAX,
                ..TransferConfig::default()
            },
            TransferConfig {
                request_extra_ms: MAX_TIMER_DELAY_MS,
                ..TransferConfig::default()
            },
        ];
        for config in huge {
            assert!(matches!(config.validate(), Err(LinkError::InvalidConfig(_))));
        }

        let at_limit = TransferConfig {
            retransmit_min_ms: 0,
            retransmit_max_ms: MAX_TIMER_DELAY_MS,
            request_extra_ms: 0,
            timer_slack_ms: 0,
            ..TransferConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }
}
