//! Line coding that keeps the radio bitstream self-clocking
//!
//! The synchronizer only needs two things from a codec: the symbols it
//! produces never include [`TERMINATOR`](crate::constants::TERMINATOR), and
//! a cheap per-byte validity predicate so a corrupted byte can end a frame.

use crate::error::{LinkError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// A byte-oriented line code
pub trait LineCodec {
    /// Encoded bytes produced per data byte
    fn expansion(&self) -> usize;

    /// Encode data bytes into symbols
    fn encode(&self, data: &[u8]) -> Bytes;

    /// Decode symbols back into data bytes
    fn decode(&self, symbols: &[u8]) -> Result<Bytes>;

    /// True if `symbol` can appear in the output of [`LineCodec::encode`]
    fn is_valid_symbol(&self, symbol: u8) -> bool;
}

/// Manchester code: one symbol byte per nibble, high nibble first.
/// Each data bit becomes the bit pair `10` (one) or `01` (zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Manchester;

const fn manchester_symbol(nibble: u8) -> u8 {
    let mut symbol = 0u8;
    let mut bit = 4;
    while bit > 0 {
        bit -= 1;
        symbol <<= 2;
        symbol |= if (nibble >> bit) & 1 == 1 { 0b10 } else { 0b01 };
    }
    symbol
}

const fn build_symbols() -> [u8; 16] {
    let mut table = [0u8; 16];
    let mut i = 0;
    while i < 16 {
        table[i] = manchester_symbol(i as u8);
        i += 1;
    }
    table
}

const SYMBOLS: [u8; 16] = build_symbols();

impl Manchester {
    fn decode_symbol(symbol: u8) -> Option<u8> {
        let mut nibble = 0u8;
        for shift in (0..4).rev() {
            nibble <<= 1;
            match (symbol >> (shift * 2)) & 0b11 {
                0b10 => nibble |= 1,
                0b01 => {}
                _ => return None,
            }
        }
        Some(nibble)
    }
}

impl LineCodec for Manchester {
    fn expansion(&self) -> usize {
        2
    }

    fn encode(&self, data: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(data.len() * self.expansion());
        for &byte in data {
            out.put_u8(SYMBOLS[(byte >> 4) as usize]);
            out.put_u8(SYMBOLS[(byte & 0x0F) as usize]);
        }
        out.freeze()
    }

    fn decode(&self, symbols: &[u8]) -> Result<Bytes> {
        if symbols.len() % 2 != 0 {
            return Err(LinkError::TruncatedSymbol(symbols.len()));
        }

        let mut out = BytesMut::with_capacity(symbols.len() / 2);
        for (i, pair) in symbols.chunks_exact(2).enumerate() {
            let high = Self::decode_symbol(pair[0]).ok_or(LinkError::InvalidSymbol {
                offset: i * 2,
                symbol: pair[0],
            })?;
            let low = Self::decode_symbol(pair[1]).ok_or(LinkError::InvalidSymbol {
                offset: i * 2 + 1,
                symbol: pair[1],
            })?;
            out.put_u8((high << 4) | low);
        }
        Ok(out.freeze())
    }

    fn is_valid_symbol(&self, symbol: u8) -> bool {
        Self::decode_symbol(symbol).is_some()
    }
}
