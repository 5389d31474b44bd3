//! Address-layer datagrams carried inside link frames
//!
//! ```text
//! SRC(6) | DST(6) | SRC_PORT(2) | DST_PORT(2) | LEN(2) | payload
//! ```

use crate::address::Address;
use crate::constants::{ADDRESS_LEN, DATAGRAM_HEADER_LEN};
use crate::error::{LinkError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// An address and port pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Network address
    pub address: Address,
    /// Port
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint
    pub const fn new(address: Address, port: u16) -> Self {
        Self { address, port }
    }
}

impl core::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// A datagram with source and destination endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Sender
    pub src: Endpoint,
    /// Receiver
    pub dst: Endpoint,
    /// Payload
    pub payload: Bytes,
}

impl Datagram {
    /// Create a datagram
    pub fn new(src: Endpoint, dst: Endpoint, payload: impl Into<Bytes>) -> Self {
        Self {
            src,
            dst,
            payload: payload.into(),
        }
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        DATAGRAM_HEADER_LEN + self.payload.len()
    }

    /// Encode to wire format
    pub fn encode(&self) -> Result<Bytes> {
        let len = u16::try_from(self.payload.len())
            .map_err(|_| LinkError::PayloadTooLarge(self.payload.len(), u16::MAX as usize))?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(self.src.address.as_bytes());
        buf.put_slice(self.dst.address.as_bytes());
        buf.put_u16(self.src.port);
        buf.put_u16(self.dst.port);
        buf.put_u16(len);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Decode from wire format
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < DATAGRAM_HEADER_LEN {
            return Err(LinkError::IncompleteFrame {
                expected: DATAGRAM_HEADER_LEN,
                actual: data.len(),
            });
        }

        let mut cursor = data;
        let mut src = [0u8; ADDRESS_LEN];
        let mut dst = [0u8; ADDRESS_LEN];
        cursor.copy_to_slice(&mut src);
        cursor.copy_to_slice(&mut dst);
        let src_port = cursor.get_u16();
        let dst_port = cursor.get_u16();
        let declared = cursor.get_u16() as usize;

        if declared != cursor.len() {
            return Err(LinkError::LengthMismatch {
                declared,
                actual: cursor.len(),
            });
        }

        Ok(Self {
            src: Endpoint::new(Address(src), src_port),
            dst: Endpoint::new(Address(dst), dst_port),
            payload: Bytes::copy_from_slice(cursor),
        })
    }
}
