//! Example: send a file to a responding peer over an in-memory radio link

use bytes::Bytes;
use radiotftp_core::{
    decode_link_frame, Address, Datagram, Endpoint, FrameSync, LineCodec, Manchester, Message,
    Outbound, Station, StationConfig, StationEvent, SyncConfig, Transmitter,
};
use std::time::Instant;

const PEER_NET: Address = Address([10, 0, 0, 0, 0, 2]);

/// Acknowledge every request and DATA block heard in `burst`
fn answer(
    sync: &mut FrameSync,
    tx: &mut Transmitter,
    burst: &[u8],
    received: &mut Vec<u8>,
) -> Result<Option<Bytes>, Box<dyn std::error::Error>> {
    for &byte in burst {
        let Some(frame) = sync.on_byte_received(byte) else {
            continue;
        };
        let link = decode_link_frame(&Manchester.decode(&frame)?)?;
        let datagram = Datagram::decode(&link.payload)?;
        let message = Message::parse(&datagram.payload)?;
        println!("  peer <- {:?} ({} bytes)", message.opcode(), datagram.payload.len());

        let block = match message {
            Message::Request { filename, .. } => {
                println!("  peer: write request for '{}'", filename);
                0
            }
            Message::Data { block, data } => {
                received.extend_from_slice(&data);
                u16::from(block)
            }
            _ => continue,
        };
        tx.queue(&Datagram::new(
            Endpoint::new(PEER_NET, 6000),
            datagram.src,
            Message::Ack { block }.encode(),
        ))?;
    }
    Ok(tx.take())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Radiotftp Basic Transfer Example\n");

    let now = Instant::now();
    let mut station = Station::new(StationConfig::default(), now)?;
    let mut rx = station.receiver()?;

    let mut peer_sync = FrameSync::new(SyncConfig::default())?;
    let mut peer_tx = Transmitter::new(Manchester, Address([0xF0, 0, 0, 0, 0, 2]), 534);
    let mut received = Vec::new();

    let data: Vec<u8> = b"temperature=21.5C humidity=40%\r\n".repeat(40);
    println!("Sending {} bytes in {}-byte blocks", data.len(), station.config().transfer.block_size);
    station.send_file(PEER_NET, Bytes::from(data.clone()), "sensors.dat", false, now)?;

    let mut air_bytes = 0;
    while let Some(burst) = station.take_outbound() {
        air_bytes += burst.len();
        let Some(reply) = answer(&mut peer_sync, &mut peer_tx, &burst, &mut received)? else {
            break;
        };
        air_bytes += reply.len();

        for &byte in reply.iter() {
            if let Some(frame) = rx.on_byte_received(byte) {
                match station.handle_frame(&frame, now)? {
                    Some(StationEvent::Transfer(done)) => println!("Transfer finished: {:?}", done),
                    Some(other) => println!("Event: {:?}", other),
                    None => {
                        if let Some(progress) = station.progress() {
                            println!(
                                "  acked {}/{} blocks",
                                progress.acked_blocks, progress.total_blocks
                            );
                        }
                    }
                }
            }
        }
    }

    println!("\nBytes on air:      {}", air_bytes);
    println!("Bytes delivered:   {}", received.len());
    println!("Intact:            {}", received == data);

    Ok(())
}
