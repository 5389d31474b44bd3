//! Example: a transfer surviving a lossy channel, then an offline scan of
//! everything that went over the air

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use radiotftp_core::{
    decode_link_frame, scan_stream, Address, Datagram, Endpoint, FrameSync, LineCodec, Manchester,
    Message, Outbound, Station, StationConfig, StationEvent, SyncConfig, Transmitter,
};
use std::time::Instant;

const PEER_NET: Address = Address([10, 0, 0, 0, 0, 2]);

/// Flip a random byte in roughly `rate` of all bursts
fn channel(rng: &mut StdRng, burst: &[u8], rate: f64) -> Vec<u8> {
    let mut out = burst.to_vec();
    if rng.gen_bool(rate) {
        let at = rng.gen_range(14..out.len());
        out[at] ^= rng.gen_range(1..=255u8);
    }
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Radiotftp Noisy Channel Example\n");

    let mut noise = StdRng::seed_from_u64(2024);
    let mut now = Instant::now();
    let mut station = Station::with_parts(
        StationConfig::default(),
        Manchester,
        StdRng::seed_from_u64(1),
        now,
    )?;
    let mut rx = station.receiver()?;
    let mut peer_sync = FrameSync::new(SyncConfig::default())?;
    let mut peer_tx = Transmitter::new(Manchester, Address([0xF0, 0, 0, 0, 0, 2]), 534);

    let data: Vec<u8> = (0..2000u32).map(|i| (i % 97) as u8 + b' ').collect();
    let mut received = Vec::new();
    let mut last_block = 0u8;
    let mut capture = Vec::new();
    let mut rejected = 0;

    station.send_file(PEER_NET, Bytes::from(data.clone()), "noisy.dat", false, now)?;

    let outcome = loop {
        let Some(burst) = station.take_outbound() else {
            let Some(deadline) = station.next_deadline() else {
                break None;
            };
            now = deadline;
            match station.poll_timer(now) {
                Some(StationEvent::Transfer(done)) => break Some(done),
                _ => continue,
            }
        };

        // station -> peer
        let heard = channel(&mut noise, &burst, 0.3);
        capture.extend_from_slice(&heard);
        for &byte in &heard {
            let Some(frame) = peer_sync.on_byte_received(byte) else {
                continue;
            };
            let Ok(link) = Manchester
                .decode(&frame)
                .and_then(|raw| decode_link_frame(&raw))
            else {
                rejected += 1;
                continue;
            };
            let datagram = Datagram::decode(&link.payload)?;
            let block = match Message::parse(&datagram.payload)? {
                Message::Request { .. } => 0,
                Message::Data { block, data } => {
                    if block == last_block.wrapping_add(1) {
                        received.extend_from_slice(&data);
                        last_block = block;
                    }
                    u16::from(block)
                }
                _ => continue,
            };
            peer_tx.queue(&Datagram::new(
                Endpoint::new(PEER_NET, 6000),
                datagram.src,
                Message::Ack { block }.encode(),
            ))?;
        }

        // peer -> station
        let Some(reply) = peer_tx.take() else {
            continue;
        };
        let heard = channel(&mut noise, &reply, 0.3);
        capture.extend_from_slice(&heard);
        let mut done = None;
        for &byte in &heard {
            if let Some(frame) = rx.on_byte_received(byte) {
                match station.handle_frame(&frame, now) {
                    Ok(Some(StationEvent::Transfer(result))) => done = Some(result),
                    Ok(_) => {}
                    Err(_) => rejected += 1,
                }
            }
        }
        if done.is_some() {
            break done;
        }
    };

    println!("Outcome:           {:?}", outcome);
    println!("Frames rejected:   {}", rejected);
    println!("Delivered intact:  {}", received == data);

    println!("\nScanning the captured air traffic...");
    let (frames, stats) = scan_stream(&capture, Manchester, SyncConfig::default())?;
    let valid = frames
        .iter()
        .filter(|f| {
            Manchester
                .decode(&f.frame)
                .and_then(|raw| decode_link_frame(&raw))
                .is_ok()
        })
        .count();

    println!("  Bytes scanned:     {}", stats.bytes_scanned);
    println!("  Sync words found:  {}", stats.sync_words_found);
    println!("  Frames recovered:  {}", stats.frames_emitted);
    println!("  Frames valid:      {}", valid);
    println!("  Recovery rate:     {:.1}%", stats.recovery_rate());

    Ok(())
}
