//! Integration tests: a station talking to a responding peer over an
//! in-memory radio channel, every byte passing through the synchronizer

use bytes::Bytes;
use radiotftp_core::{
    constants::TFTP_PORT, decode_link_frame, Address, Completion, Datagram, Endpoint, FrameSync,
    LineCodec, Manchester, Message, Outbound, Station, StationConfig, StationEvent, SyncConfig,
    TransferError, Transmitter,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

const STATION_NET: Address = Address([10, 0, 0, 0, 0, 1]);
const PEER_NET: Address = Address([10, 0, 0, 0, 0, 2]);
const PEER_LINK: Address = Address([0xF0, 0, 0, 0, 0, 2]);
const PEER_PORT: u16 = 4000;

/// Minimal receiving side: ACKs requests and in-order DATA from `PEER_PORT`
struct Peer {
    sync: FrameSync,
    tx: Transmitter,
    respond: bool,
    last_block: u8,
    received: Vec<u8>,
    trace: Vec<(u16, Message)>,
}

impl Peer {
    fn new(respond: bool) -> Self {
        Self {
            sync: FrameSync::new(SyncConfig::default()).unwrap(),
            tx: Transmitter::new(Manchester, PEER_LINK, 534),
            respond,
            last_block: 0,
            received: Vec::new(),
            trace: Vec::new(),
        }
    }

    fn hear(&mut self, burst: &[u8]) -> Option<Bytes> {
        for &byte in burst {
            let Some(frame) = self.sync.on_byte_received(byte) else {
                continue;
            };
            let raw = Manchester.decode(&frame).unwrap();
            let link = decode_link_frame(&raw).unwrap();
            let datagram = Datagram::decode(&link.payload).unwrap();
            let message = Message::parse(&datagram.payload).unwrap();
            self.trace.push((datagram.dst.port, message.clone()));

            let ack = match message {
                Message::Request { .. } => Some(0),
                Message::Data { block, data } => {
                    if block == self.last_block.wrapping_add(1) {
                        self.received.extend_from_slice(&data);
                        self.last_block = block;
                    }
                    Some(u16::from(block))
                }
                _ => None,
            };

            if let (true, Some(block)) = (self.respond, ack) {
                let reply = Datagram::new(
                    Endpoint::new(PEER_NET, PEER_PORT),
                    datagram.src,
                    Message::Ack { block }.encode(),
                );
                self.tx.queue(&reply).unwrap();
            }
        }
        self.tx.take()
    }
}

fn station(now: Instant) -> Station {
    let config = StationConfig {
        net_address: STATION_NET,
        ..StationConfig::default()
    };
    Station::with_parts(config, Manchester, StdRng::seed_from_u64(42), now).unwrap()
}

/// Feed a reply burst into the station's receiver
fn deliver(
    station: &mut Station,
    rx: &mut FrameSync,
    burst: &[u8],
    now: Instant,
) -> Option<StationEvent> {
    let mut event = None;
    for &byte in burst {
        if let Some(frame) = rx.on_byte_received(byte) {
            event = event.or(station.handle_frame(&frame, now).unwrap());
        }
    }
    event
}

#[test]
fn test_chunked_transfer_sequence() {
    let now = Instant::now();
    let mut station = station(now);
    let mut rx = station.receiver().unwrap();
    let mut peer = Peer::new(true);
    let data: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();

    station
        .send_file(PEER_NET, Bytes::from(data.clone()), "sensors.dat", false, now)
        .unwrap();

    let mut outcome = None;
    while let Some(burst) = station.take_outbound() {
        let reply = peer.hear(&burst).expect("peer answers every message");
        outcome = deliver(&mut station, &mut rx, &reply, now);
    }

    assert_eq!(outcome, Some(StationEvent::Transfer(Completion::Delivered)));
    assert!(station.is_idle());
    assert_eq!(peer.received, data);

    let trace: Vec<_> = peer
        .trace
        .iter()
        .map(|(port, m)| match m {
            Message::Request { .. } => ("WRQ", *port, 0, 0),
            Message::Data { block, data } => ("DATA", *port, *block, data.len()),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(
        trace,
        vec![
            ("WRQ", TFTP_PORT, 0, 0),
            ("DATA", PEER_PORT, 1, 512),
            ("DATA", PEER_PORT, 2, 512),
        ]
    );
}

#[test]
fn test_single_datagram_mode() {
    let now = Instant::now();
    let mut station = station(now);
    let mut rx = station.receiver().unwrap();
    let mut peer = Peer::new(true);
    let data = Bytes::from(vec![0x5Au8; 100]);

    station
        .send_single(PEER_NET, data.clone(), "reading.txt", now)
        .unwrap();
    let burst = station.take_outbound().unwrap();
    assert!(peer.hear(&burst).is_none());

    // a stray ACK does not end the session early
    let stray = {
        let mut tx = Transmitter::new(Manchester, PEER_LINK, 534);
        tx.queue(&Datagram::new(
            Endpoint::new(PEER_NET, PEER_PORT),
            Endpoint::new(STATION_NET, station.engine().transfer_port()),
            Message::Ack { block: 0 }.encode(),
        ))
        .unwrap();
        tx.take().unwrap()
    };
    assert_eq!(deliver(&mut station, &mut rx, &stray, now), None);

    let deadline = station.next_deadline().unwrap();
    assert_eq!(deadline - now, std::time::Duration::from_millis(3_128));
    assert_eq!(station.poll_timer(now), None);
    assert_eq!(
        station.poll_timer(deadline),
        Some(StationEvent::Transfer(Completion::Delivered))
    );
    assert!(station.take_outbound().is_none());

    match &peer.trace[..] {
        [(TFTP_PORT, Message::SingleWrite { filename, data: got, .. })] => {
            assert_eq!(filename, "reading.txt");
            assert_eq!(got, &data);
        }
        other => panic!("unexpected trace {:?}", other),
    }
}

#[test]
fn test_lost_data_block_is_retransmitted() {
    let start = Instant::now();
    let mut now = start;
    let mut station = station(now);
    let mut rx = station.receiver().unwrap();
    let mut peer = Peer::new(true);
    let data: Vec<u8> = (0..1300u32).map(|i| (i * 7) as u8).collect();

    station
        .send_file(PEER_NET, Bytes::from(data.clone()), "", true, now)
        .unwrap();

    let mut bursts = 0;
    let mut outcome = None;
    while outcome.is_none() && bursts < 20 {
        match station.take_outbound() {
            Some(burst) => {
                bursts += 1;
                // first DATA block lost on air
                if bursts == 2 {
                    continue;
                }
                if let Some(reply) = peer.hear(&burst) {
                    outcome = deliver(&mut station, &mut rx, &reply, now);
                }
            }
            None => {
                now = station.next_deadline().unwrap();
                outcome = station.poll_timer(now);
            }
        }
    }

    assert_eq!(outcome, Some(StationEvent::Transfer(Completion::Delivered)));
    assert_eq!(bursts, 5);
    assert_eq!(peer.received, data);
    assert!(now > start);
    assert!(matches!(
        peer.trace[0].1,
        Message::Request { append: true, ref filename, .. } if filename == "sensors.dat"
    ));
}

#[test]
fn test_retransmission_bound_without_peer() {
    let now = Instant::now();
    let mut station = station(now);
    let mut peer = Peer::new(false);

    station
        .send_file(PEER_NET, Bytes::from_static(b"nobody listens"), "x", false, now)
        .unwrap();

    let mut bursts = vec![station.take_outbound().unwrap()];
    let mut outcome = None;
    while outcome.is_none() {
        let deadline = station.next_deadline().unwrap();
        outcome = station.poll_timer(deadline);
        if let Some(burst) = station.take_outbound() {
            bursts.push(burst);
        }
    }

    assert_eq!(
        outcome,
        Some(StationEvent::Transfer(Completion::Failed(
            TransferError::RetriesExhausted(5)
        )))
    );
    assert_eq!(bursts.len(), 6);
    assert!(bursts.iter().all(|b| *b == bursts[0]));
    assert!(station.is_idle());
    assert!(station.next_deadline().is_none());

    for burst in &bursts {
        assert!(peer.hear(burst).is_none());
    }
    assert_eq!(peer.trace.len(), 6);
}

#[test]
fn test_second_transfer_after_completion() {
    let now = Instant::now();
    let mut station = station(now);
    let mut rx = station.receiver().unwrap();
    let mut peer = Peer::new(true);

    station
        .send_file(PEER_NET, Bytes::from_static(b"first"), "a", false, now)
        .unwrap();
    assert_eq!(
        station.send_file(PEER_NET, Bytes::from_static(b"second"), "b", false, now),
        Err(TransferError::SessionBusy)
    );

    while let Some(burst) = station.take_outbound() {
        let reply = peer.hear(&burst).unwrap();
        deliver(&mut station, &mut rx, &reply, now);
    }
    assert!(station.is_idle());

    let first_port = station.engine().transfer_port();
    station
        .send_file(PEER_NET, Bytes::from_static(b"second"), "b", false, now)
        .unwrap();
    assert_ne!(station.engine().transfer_port(), TFTP_PORT);
    // a fresh random port per request
    assert_ne!(station.engine().transfer_port(), first_port);
}
