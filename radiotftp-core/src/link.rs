//! Link-frame codec
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! DST(6) | SRC(6) | LEN(2) | PAYLOAD(LEN - 18) | FCS(4)
//! ```
//!
//! `LEN` counts the whole frame including the FCS. The FCS is the
//! [`crc32`](crate::crc::crc32) of every byte before it.

use crate::address::Address;
use crate::constants::{ADDRESS_LEN, DEFAULT_MAX_LINK_PAYLOAD, FCS_LEN, LINK_HEADER_LEN, LINK_OVERHEAD};
use crate::crc::crc32;
use crate::error::{LinkError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Link codec configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Largest payload accepted by [`encode_link_frame`]
    pub max_payload: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_LINK_PAYLOAD,
        }
    }
}

impl LinkConfig {
    /// Largest frame this configuration can produce
    pub fn max_frame_len(&self) -> usize {
        self.max_payload + LINK_OVERHEAD
    }

    /// Check the configuration can work at runtime
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_len() > u16::MAX as usize {
            return Err(LinkError::InvalidConfig(format!(
                "link payload {} does not fit the 16-bit length field",
                self.max_payload
            )));
        }
        Ok(())
    }
}

/// A decoded link frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    /// Destination link address
    pub dst: Address,
    /// Source link address
    pub src: Address,
    /// Payload carried by the frame
    pub payload: Bytes,
}

/// Encapsulate `payload` into a link frame
pub fn encode_link_frame(
    src: &Address,
    dst: &Address,
    payload: &[u8],
    max_payload: usize,
) -> Result<Bytes> {
    if payload.len() > max_payload {
        return Err(LinkError::PayloadTooLarge(payload.len(), max_payload));
    }

    let total = LINK_OVERHEAD + payload.len();
    let declared =
        u16::try_from(total).map_err(|_| LinkError::PayloadTooLarge(payload.len(), max_payload))?;

    let mut buf = BytesMut::with_capacity(total);
    buf.put_slice(dst.as_bytes());
    buf.put_slice(src.as_bytes());
    buf.put_u16(declared);
    buf.put_slice(payload);

    let fcs = crc32(&buf);
    buf.put_u32(fcs);

    Ok(buf.freeze())
}

/// Validate and decapsulate a link frame
///
/// The declared length is checked against `frame.len()` before the FCS is
/// looked at, so an inconsistent length never causes a read outside `frame`.
pub fn decode_link_frame(frame: &[u8]) -> Result<LinkFrame> {
    if frame.len() < LINK_OVERHEAD {
        return Err(LinkError::IncompleteFrame {
            expected: LINK_OVERHEAD,
            actual: frame.len(),
        });
    }

    let declared = u16::from_be_bytes([frame[ADDRESS_LEN * 2], frame[ADDRESS_LEN * 2 + 1]]) as usize;
    if declared != frame.len() {
        return Err(LinkError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }

    let (body, trailer) = frame.split_at(frame.len() - FCS_LEN);
    let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = crc32(body);
    if expected != actual {
        return Err(LinkError::ChecksumMismatch { expected, actual });
    }

    let mut dst = [0u8; ADDRESS_LEN];
    let mut src = [0u8; ADDRESS_LEN];
    dst.copy_from_slice(&frame[..ADDRESS_LEN]);
    src.copy_from_slice(&frame[ADDRESS_LEN..ADDRESS_LEN * 2]);

    Ok(LinkFrame {
        dst: Address(dst),
        src: Address(src),
        payload: Bytes::copy_from_slice(&body[LINK_HEADER_LEN..]),
    })
}

/// Check whether a frame addressed to `frame_dst` is for `local`
///
/// The destination is handed back whatever the answer, so forwarding can
/// be layered on top.
pub fn destination_matches(local: &Address, frame_dst: &Address) -> (bool, Address) {
    (frame_dst.reaches(local), *frame_dst)
}
