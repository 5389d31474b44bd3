use anyhow::{Context, Result};
use radiotftp_core::sync::LocatedFrame;
use radiotftp_core::{
    decode_link_frame, scan_stream, Datagram, LineCodec, LinkError, Manchester, Message, SyncConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::info;

/// One frame found in a capture, decoded as far as it would go
#[derive(Debug, Serialize, Deserialize)]
pub struct RecoveredFrame {
    pub offset: usize,
    pub encoded_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl RecoveredFrame {
    fn from_located(located: &LocatedFrame) -> Self {
        let mut recovered = RecoveredFrame {
            offset: located.offset,
            encoded_len: located.frame.len(),
            error: None,
            link_src: None,
            src: None,
            dst: None,
            message: None,
            payload: None,
        };
        if let Err(e) = recovered.decode(&located.frame) {
            recovered.error = Some(e.to_string());
        }
        recovered
    }

    fn decode(&mut self, encoded: &[u8]) -> Result<(), LinkError> {
        let raw = Manchester.decode(encoded)?;
        let link = decode_link_frame(&raw)?;
        self.link_src = Some(format!("{:x}", link.src));

        let datagram = Datagram::decode(&link.payload)?;
        self.src = Some(datagram.src.to_string());
        self.dst = Some(datagram.dst.to_string());
        self.payload = Some(hex::encode(&datagram.payload));

        // not every port carries transfer messages
        if let Ok(message) = Message::parse(&datagram.payload) {
            self.message = Some(describe(&message));
        }
        Ok(())
    }
}

fn describe(message: &Message) -> String {
    match message {
        Message::Request {
            kind,
            filename,
            append,
            ..
        } => format!("{:?} {}{}", kind, filename, if *append { " (append)" } else { "" }),
        Message::SingleWrite { filename, data, .. } => {
            format!("SingleWrite {} ({} bytes)", filename, data.len())
        }
        Message::Data { block, data } => format!("Data {} ({} bytes)", block, data.len()),
        Message::Ack { block } => format!("Ack {}", block),
        Message::Error { code, message } => format!("Error {}: {}", code, message),
    }
}

/// Decode every frame in a captured byte stream
pub fn execute(input: &str, output: Option<&str>, sync: SyncConfig, stats_only: bool) -> Result<()> {
    info!("Scanning capture: {}", input);

    let data = fs::read(input).with_context(|| format!("Failed to read input file: {}", input))?;
    info!("File size: {} bytes", data.len());

    let (located, stats) = scan_stream(&data, Manchester, sync)?;

    println!("\n=== Scan Results ===");
    println!("Bytes scanned:     {} bytes", stats.bytes_scanned);
    println!("Sync words found:  {}", stats.sync_words_found);
    println!("Frames recovered:  {}", stats.frames_emitted);
    println!("Frames dropped:    {}", stats.frames_dropped);
    println!("Empty frames:      {}", stats.empty_frames);
    println!("Bytes recovered:   {} bytes", stats.bytes_recovered);
    println!("Recovery rate:     {:.2}%", stats.recovery_rate());
    println!();

    if stats_only {
        return Ok(());
    }

    let recovered: Vec<RecoveredFrame> = located.iter().map(RecoveredFrame::from_located).collect();

    if let Some(output_path) = output {
        let json = serde_json::to_string_pretty(&recovered)
            .with_context(|| "Failed to serialize recovered frames")?;

        fs::write(output_path, json)
            .with_context(|| format!("Failed to write output file: {}", output_path))?;

        info!("Recovered frames written to: {}", output_path);
    } else {
        println!("=== Recovered Frames ===");
        for frame in &recovered {
            match (&frame.error, &frame.src, &frame.dst) {
                (Some(e), _, _) => println!("@{}: rejected ({})", frame.offset, e),
                (None, Some(src), Some(dst)) => println!(
                    "@{}: {} -> {} {}",
                    frame.offset,
                    src,
                    dst,
                    frame.message.as_deref().unwrap_or("")
                ),
                _ => println!("@{}: {} bytes", frame.offset, frame.encoded_len),
            }
        }
    }

    Ok(())
}
