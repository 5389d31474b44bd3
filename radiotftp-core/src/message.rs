//! Transfer engine messages
//!
//! Every message starts with a two byte opcode whose high byte is zero.
//!
//! ```text
//! RRQ/WRQ     0 | op | filename NUL mode NUL [ "append" ] NUL
//! WRQ_SINGLE  0 | 10 | filename NUL mode NUL data...
//! DATA        0 | 3  | 0 | block | data...
//! ACK         0 | 4  | block_hi | block_lo
//! ERROR       0 | 5  | code_hi | code_lo | message NUL
//! ```

use crate::constants::{Opcode, APPEND_OPTION, MESSAGE_HEADER_LEN, SINGLE_FILENAME_MAX_LEN};
use crate::error::{LinkError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Direction of a chunked request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Peer sends the file to us
    Read,
    /// We send the file to the peer
    Write,
}

impl RequestKind {
    fn opcode(self) -> Opcode {
        match self {
            RequestKind::Read => Opcode::Rrq,
            RequestKind::Write => Opcode::Wrq,
        }
    }
}

/// A parsed transfer engine message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Read or write request, answered with ACK(0)
    Request {
        /// Read or write
        kind: RequestKind,
        /// Remote filename
        filename: String,
        /// Transfer mode
        mode: String,
        /// Append instead of overwrite
        append: bool,
    },
    /// Write request carrying the whole file inline
    SingleWrite {
        /// Remote filename, at most 16 bytes on the wire
        filename: String,
        /// Transfer mode
        mode: String,
        /// File contents
        data: Bytes,
    },
    /// One data block; only the low byte of the block number is carried
    Data {
        /// Block number, starting at 1
        block: u8,
        /// Block contents
        data: Bytes,
    },
    /// Acknowledgment of a block (0 acknowledges the request)
    Ack {
        /// Acknowledged block
        block: u16,
    },
    /// Error or status notification
    Error {
        /// Error code
        code: u16,
        /// Error text
        message: String,
    },
}

impl Message {
    /// Opcode of this message
    pub fn opcode(&self) -> Opcode {
        match self {
            Message::Request { kind, .. } => kind.opcode(),
            Message::SingleWrite { .. } => Opcode::WrqSingle,
            Message::Data { .. } => Opcode::Data,
            Message::Ack { .. } => Opcode::Ack,
            Message::Error { .. } => Opcode::Error,
        }
    }

    /// Encode to wire format
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MESSAGE_HEADER_LEN + self.body_len_hint());
        buf.put_u8(0);
        buf.put_u8(self.opcode().as_u8());

        match self {
            Message::Request {
                filename,
                mode,
                append,
                ..
            } => {
                put_cstr(&mut buf, filename.as_bytes());
                put_cstr(&mut buf, mode.as_bytes());
                if *append {
                    buf.put_slice(APPEND_OPTION.as_bytes());
                }
                buf.put_u8(0);
            }
            Message::SingleWrite {
                filename,
                mode,
                data,
            } => {
                let name = filename.as_bytes();
                put_cstr(&mut buf, &name[..name.len().min(SINGLE_FILENAME_MAX_LEN)]);
                put_cstr(&mut buf, mode.as_bytes());
                buf.put_slice(data);
            }
            Message::Data { block, data } => {
                buf.put_u8(0);
                buf.put_u8(*block);
                buf.put_slice(data);
            }
            Message::Ack { block } => {
                buf.put_u16(*block);
            }
            Message::Error { code, message } => {
                buf.put_u16(*code);
                put_cstr(&mut buf, message.as_bytes());
            }
        }

        buf.freeze()
    }

    /// Parse a message from wire format
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(LinkError::MalformedMessage(format!(
                "{} bytes is too short for an opcode",
                data.len()
            )));
        }

        let raw = u16::from_be_bytes([data[0], data[1]]);
        let opcode = match (data[0], Opcode::from_u8(data[1])) {
            (0, Some(op)) => op,
            _ => return Err(LinkError::UnknownOpcode(raw)),
        };
        let body = &data[2..];

        match opcode {
            Opcode::Rrq | Opcode::Wrq => {
                let (filename, rest) = take_cstr(body, "filename")?;
                let (mode, rest) = take_cstr(rest, "mode")?;
                let append = match rest {
                    [] | [0] => false,
                    _ => {
                        let (option, _) = take_cstr(rest, "option")?;
                        option == APPEND_OPTION
                    }
                };
                let kind = if opcode == Opcode::Rrq {
                    RequestKind::Read
                } else {
                    RequestKind::Write
                };
                Ok(Message::Request {
                    kind,
                    filename,
                    mode,
                    append,
                })
            }
            Opcode::WrqSingle => {
                let (filename, rest) = take_cstr(body, "filename")?;
                let (mode, rest) = take_cstr(rest, "mode")?;
                Ok(Message::SingleWrite {
                    filename,
                    mode,
                    data: Bytes::copy_from_slice(rest),
                })
            }
            Opcode::Data => match body {
                [0, block, data @ ..] => Ok(Message::Data {
                    block: *block,
                    data: Bytes::copy_from_slice(data),
                }),
                [hi, _, ..] => Err(LinkError::MalformedMessage(format!(
                    "DATA block high byte 0x{:02x} is not zero",
                    hi
                ))),
                _ => Err(LinkError::MalformedMessage("DATA without block number".into())),
            },
            Opcode::Ack => match body {
                [hi, lo] => Ok(Message::Ack {
                    block: u16::from_be_bytes([*hi, *lo]),
                }),
                _ => Err(LinkError::MalformedMessage(format!(
                    "ACK body is {} bytes, expected 2",
                    body.len()
                ))),
            },
            Opcode::Error => match body {
                [hi, lo, text @ ..] => {
                    let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
                    Ok(Message::Error {
                        code: u16::from_be_bytes([*hi, *lo]),
                        message: String::from_utf8_lossy(&text[..end]).into_owned(),
                    })
                }
                _ => Err(LinkError::MalformedMessage("ERROR without code".into())),
            },
        }
    }

    fn body_len_hint(&self) -> usize {
        match self {
            Message::Request { filename, mode, .. } => filename.len() + mode.len() + 9,
            Message::SingleWrite {
                filename,
                mode,
                data,
            } => filename.len() + mode.len() + data.len() + 2,
            Message::Data { data, .. } => data.len() + 2,
            Message::Ack { .. } => 2,
            Message::Error { message, .. } => message.len() + 3,
        }
    }
}

fn put_cstr(buf: &mut BytesMut, s: &[u8]) {
    buf.put_slice(s);
    buf.put_u8(0);
}

fn take_cstr<'a>(data: &'a [u8], field: &str) -> Result<(String, &'a [u8])> {
    let end = memchr::memchr(0, data)
        .ok_or_else(|| LinkError::MalformedMessage(format!("{} is not NUL terminated", field)))?;
    let text = String::from_utf8_lossy(&data[..end]).into_owned();
    Ok((text, &data[end + 1..]))
}
