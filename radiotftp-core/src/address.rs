//! Six-byte link and network addresses

use crate::constants::ADDRESS_LEN;
use crate::error::LinkError;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// A 6-byte address, used both for link frames and for datagrams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// All-ones broadcast address
    pub const BROADCAST: Address = Address([0xFF; ADDRESS_LEN]);

    /// Default link address of a node
    pub const DEFAULT_LINK: Address = Address([0xF0, 0x00, 0x00, 0x00, 0x00, 0x01]);

    /// Default network address of a node
    pub const DEFAULT_NET: Address = Address([0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6]);

    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// True for the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// True if a packet sent to `self` should be accepted by a node at `local`
    pub fn reaches(&self, local: &Address) -> bool {
        self == local || self.is_broadcast()
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::DEFAULT_NET
    }
}

/// Dotted decimal, e.g. `161.162.163.164.165.166`
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{}.{}.{}.{}.{}.{}", a, b, c, d, e, g)
    }
}

/// Colon separated hex, e.g. `f0:0:0:0:0:1`
impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:x}:{:x}:{:x}:{:x}:{:x}:{:x}", a, b, c, d, e, g)
    }
}

/// Parses six decimal octets separated by `.` or `:`
impl FromStr for Address {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; ADDRESS_LEN];
        let mut count = 0;

        for part in s.trim().split(['.', ':']) {
            if count == ADDRESS_LEN {
                return Err(LinkError::InvalidAddress(format!("too many octets in '{}'", s)));
            }
            bytes[count] = part
                .parse::<u8>()
                .map_err(|_| LinkError::InvalidAddress(format!("bad octet '{}' in '{}'", part, s)))?;
            count += 1;
        }

        if count != ADDRESS_LEN {
            return Err(LinkError::InvalidAddress(format!(
                "expected {} octets, got {} in '{}'",
                ADDRESS_LEN, count, s
            )));
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = LinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}
