//! One radio node: the layers wired together
//!
//! On receive an encoded frame is line-decoded, link-decoded, matched
//! against the local addresses and handed to the handler for its
//! destination port. On send, datagrams from the transfer engine are
//! encapsulated down to a single staged burst, ready for the radio.
//!
//! The station never reads the clock itself. Callers pass `now` into every
//! operation that may arm the retransmission timer, and poll
//! [`Station::poll_timer`] when [`Station::next_deadline`] passes.

use crate::address::Address;
use crate::config::StationConfig;
use crate::constants::{HELLO_PAYLOAD, HELLO_PORT, TFTP_PORT};
use crate::datagram::{Datagram, Endpoint};
use crate::error::{Result, TransferError, TransferResult};
use crate::line_code::{LineCodec, Manchester};
use crate::link::{decode_link_frame, destination_matches, encode_link_frame};
use crate::message::{Message, RequestKind};
use crate::sync::{frame_burst, FrameSync};
use crate::timer::TimerSlot;
use crate::transfer::{Completion, Outbound, Progress, TransferEngine};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

#[cfg(feature = "logging")]
use tracing::{debug, info, warn};

/// Encapsulates datagrams into on-air bursts, holding at most one at a time
#[derive(Debug, Clone)]
pub struct Transmitter<C: LineCodec = Manchester> {
    codec: C,
    link_address: Address,
    max_payload: usize,
    staged: Option<Bytes>,
}

impl<C: LineCodec> Transmitter<C> {
    /// Create a transmitter sending from `link_address`
    pub fn new(codec: C, link_address: Address, max_payload: usize) -> Self {
        Self {
            codec,
            link_address,
            max_payload,
            staged: None,
        }
    }

    /// True while a burst is waiting to be sent
    pub fn is_busy(&self) -> bool {
        self.staged.is_some()
    }

    /// Hand the staged burst to the radio, freeing the slot
    pub fn take(&mut self) -> Option<Bytes> {
        self.staged.take()
    }
}

impl<C: LineCodec> Outbound for Transmitter<C> {
    fn queue(&mut self, datagram: &Datagram) -> TransferResult<()> {
        if self.staged.is_some() {
            return Err(TransferError::QueueBusy);
        }

        let payload = datagram.encode()?;
        let frame = encode_link_frame(
            &self.link_address,
            &Address::BROADCAST,
            &payload,
            self.max_payload,
        )?;
        self.staged = Some(frame_burst(&self.codec.encode(&frame)));
        Ok(())
    }
}

/// Something the application may want to know about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationEvent {
    /// The transfer session ended
    Transfer(Completion),
    /// A neighbour answered for the first time
    Neighbour(Address),
}

/// A radio node
#[derive(Debug)]
pub struct Station<C: LineCodec + Clone = Manchester, R: Rng = StdRng> {
    config: StationConfig,
    codec: C,
    engine: TransferEngine<R>,
    tx: Transmitter<C>,
    timer: TimerSlot,
    neighbours: Vec<Address>,
}

impl Station<Manchester, StdRng> {
    /// Create a Manchester-coded station with an entropy-seeded engine
    pub fn new(config: StationConfig, now: Instant) -> Result<Self> {
        Self::with_parts(config, Manchester, StdRng::from_entropy(), now)
    }
}

impl<C: LineCodec + Clone, R: Rng> Station<C, R> {
    /// Create a station from explicit parts
    pub fn with_parts(config: StationConfig, codec: C, rng: R, now: Instant) -> Result<Self> {
        config.validate_for(&codec)?;
        Ok(Self {
            engine: TransferEngine::with_rng(config.net_address, config.transfer, rng)?,
            tx: Transmitter::new(codec.clone(), config.link_address, config.link.max_payload),
            codec,
            config,
            timer: TimerSlot::new(now),
            neighbours: Vec::new(),
        })
    }

    /// Build a synchronizer matching this station's codec and buffer size
    pub fn receiver(&self) -> Result<FrameSync<C>> {
        FrameSync::with_codec(self.config.sync, self.codec.clone())
    }

    /// Configuration in use
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// The transfer engine
    pub fn engine(&self) -> &TransferEngine<R> {
        &self.engine
    }

    /// True when no transfer is in flight
    pub fn is_idle(&self) -> bool {
        self.engine.is_idle()
    }

    /// Progress of the transfer in flight
    pub fn progress(&self) -> Option<Progress> {
        self.engine.progress()
    }

    /// Neighbours heard so far, in discovery order
    pub fn neighbours(&self) -> &[Address] {
        &self.neighbours
    }

    /// When [`Station::poll_timer`] next needs to run
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// True while a burst is staged for the radio
    pub fn has_outbound(&self) -> bool {
        self.tx.is_busy()
    }

    /// Take the staged burst for transmission
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        self.tx.take()
    }

    /// Start a chunked write of `data` to `dst`
    pub fn send_file(
        &mut self,
        dst: Address,
        data: Bytes,
        filename: &str,
        append: bool,
        now: Instant,
    ) -> TransferResult<()> {
        self.timer.advance(now);
        self.engine.send_request(
            RequestKind::Write,
            dst,
            data,
            filename,
            append,
            &mut self.tx,
            &mut self.timer,
        )
    }

    /// Ask `dst` for a file; this node only sends, so this always fails
    pub fn request_file(&mut self, dst: Address, filename: &str, now: Instant) -> TransferResult<()> {
        self.timer.advance(now);
        self.engine.send_request(
            RequestKind::Read,
            dst,
            Bytes::new(),
            filename,
            false,
            &mut self.tx,
            &mut self.timer,
        )
    }

    /// Send `data` to `dst` in one datagram
    pub fn send_single(
        &mut self,
        dst: Address,
        data: Bytes,
        filename: &str,
        now: Instant,
    ) -> TransferResult<()> {
        self.timer.advance(now);
        self.engine
            .send_single(dst, data, filename, &mut self.tx, &mut self.timer)
    }

    /// Broadcast a neighbour discovery datagram
    pub fn send_hello(&mut self) -> TransferResult<()> {
        let datagram = Datagram::new(
            Endpoint::new(self.config.net_address, HELLO_PORT),
            Endpoint::new(Address::BROADCAST, HELLO_PORT),
            Bytes::from_static(HELLO_PAYLOAD),
        );
        self.tx.queue(&datagram)
    }

    /// Run the retransmission timer
    pub fn poll_timer(&mut self, now: Instant) -> Option<StationEvent> {
        if !self.timer.fire(now) {
            return None;
        }
        self.engine
            .on_timeout(&mut self.tx, &mut self.timer)
            .map(StationEvent::Transfer)
    }

    /// Process one encoded frame from the synchronizer
    ///
    /// Frames that fail line or link decoding are returned as errors;
    /// traffic for other nodes or unassigned ports is dropped quietly.
    pub fn handle_frame(&mut self, encoded: &[u8], now: Instant) -> Result<Option<StationEvent>> {
        self.timer.advance(now);

        let frame = self
            .codec
            .decode(encoded)
            .and_then(|raw| decode_link_frame(&raw))
            .map_err(|e| {
                #[cfg(feature = "logging")]
                warn!("Frame rejected: {}", e);
                e
            })?;

        let (matched, _dst) = destination_matches(&self.config.link_address, &frame.dst);
        if !matched {
            #[cfg(feature = "logging")]
            debug!("Link frame for {:x}, not for us", _dst);

            return Ok(None);
        }

        let datagram = Datagram::decode(&frame.payload)?;
        if !datagram.dst.address.reaches(&self.config.net_address) {
            #[cfg(feature = "logging")]
            debug!("Packet for {}, not for us", datagram.dst.address);

            return Ok(None);
        }

        self.dispatch(datagram)
    }

    fn dispatch(&mut self, datagram: Datagram) -> Result<Option<StationEvent>> {
        let port = datagram.dst.port;

        if port == self.engine.transfer_port() {
            let message = Message::parse(&datagram.payload)?;
            return Ok(self
                .engine
                .on_message(datagram.src, message, &mut self.tx, &mut self.timer)
                .map(StationEvent::Transfer));
        }

        match port {
            HELLO_PORT => {
                let neighbour = datagram.src.address;
                if self.neighbours.contains(&neighbour) {
                    return Ok(None);
                }

                #[cfg(feature = "logging")]
                info!("New neighbour {}", neighbour);

                self.neighbours.push(neighbour);
                Ok(Some(StationEvent::Neighbour(neighbour)))
            }
            TFTP_PORT => {
                #[cfg(feature = "logging")]
                debug!("Request from {} ignored, this node does not serve files", datagram.src);

                Ok(None)
            }
            _ => {
                #[cfg(feature = "logging")]
                debug!("Datagram from {} to unassigned port {}", datagram.src, port);

                Ok(None)
            }
        }
    }
}
