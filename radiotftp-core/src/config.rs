//! Station configuration

use crate::address::Address;
use crate::constants::{DATAGRAM_HEADER_LEN, LINK_OVERHEAD, MESSAGE_HEADER_LEN};
use crate::error::{LinkError, Result};
use crate::line_code::{LineCodec, Manchester};
use crate::link::LinkConfig;
use crate::sync::SyncConfig;
use crate::transfer::TransferConfig;
use serde::{Deserialize, Serialize};

/// Everything a [`Station`](crate::station::Station) needs to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Source address written into link frames
    pub link_address: Address,

    /// Network address datagrams are matched against
    pub net_address: Address,

    /// Link codec limits
    pub link: LinkConfig,

    /// Receive synchronizer
    pub sync: SyncConfig,

    /// Transfer engine
    pub transfer: TransferConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            link_address: Address::DEFAULT_LINK,
            net_address: Address::DEFAULT_NET,
            link: LinkConfig::default(),
            sync: SyncConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

impl StationConfig {
    /// Largest datagram the transfer engine can produce
    pub fn max_datagram_len(&self) -> usize {
        let data_block = MESSAGE_HEADER_LEN + self.transfer.block_size;
        // opcode + 16-byte filename + NUL + "netascii" + NUL + data
        let single = 2 + 16 + 1 + 8 + 1 + self.transfer.single_max_len;
        DATAGRAM_HEADER_LEN + data_block.max(single)
    }

    /// Largest link frame after line coding with `codec`
    pub fn max_encoded_frame_len<C: LineCodec>(&self, codec: &C) -> usize {
        (self.link.max_payload + LINK_OVERHEAD) * codec.expansion()
    }

    /// Check the layers' buffers fit together under Manchester coding
    pub fn validate(&self) -> Result<()> {
        self.validate_for(&Manchester)
    }

    /// Check the layers' buffers fit together under `codec`
    pub fn validate_for<C: LineCodec>(&self, codec: &C) -> Result<()> {
        self.link.validate()?;
        self.sync.validate()?;
        self.transfer.validate()?;

        if self.max_datagram_len() > self.link.max_payload {
            return Err(LinkError::InvalidConfig(format!(
                "largest datagram ({} bytes) exceeds link max_payload {}",
                self.max_datagram_len(),
                self.link.max_payload
            )));
        }

        let encoded = self.max_encoded_frame_len(codec);
        if encoded > self.sync.capacity {
            return Err(LinkError::InvalidConfig(format!(
                "encoded link frames up to {} bytes exceed sync capacity {}",
                encoded,
                self.sync.capacity
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    /// Passes bytes through untouched, one symbol per byte
    struct Verbatim;

    impl LineCodec for Verbatim {
        fn expansion(&self) -> usize {
            1
        }

        fn encode(&self, data: &[u8]) -> Bytes {
            Bytes::copy_from_slice(data)
        }

        fn decode(&self, symbols: &[u8]) -> Result<Bytes> {
            Ok(Bytes::copy_from_slice(symbols))
        }

        fn is_valid_symbol(&self, _symbol: u8) -> bool {
            true
        }
    }

    #[test]
    fn test_default_is_valid() {
        let config = StationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_datagram_len(), 534);
        assert_eq!(config.max_encoded_frame_len(&Manchester), 1104);
    }

    #[test]
    fn test_block_size_must_fit_link() {
        let mut config = StationConfig::default();
        config.transfer.block_size = 600;
        assert!(matches!(config.validate(), Err(LinkError::InvalidConfig(_))));
    }

    #[test]
    fn test_sync_capacity_must_fit_frame() {
        let mut config = StationConfig::default();
        config.sync.capacity = 1000;
        assert!(matches!(config.validate(), Err(LinkError::InvalidConfig(_))));
    }

    #[test]
    fn test_sync_capacity_follows_codec_expansion() {
        let mut config = StationConfig::default();
        config.sync.capacity = 600;

        assert_eq!(config.max_encoded_frame_len(&Verbatim), 552);
        assert!(config.validate_for(&Verbatim).is_ok());
        assert!(matches!(
            config.validate_for(&Manchester),
            Err(LinkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "net_address": "1.2.3.4.5.6", "transfer": { "block_size": 256 } }"#;
        let config: StationConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.net_address, Address::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(config.link_address, Address::DEFAULT_LINK);
        assert_eq!(config.transfer.block_size, 256);
        assert_eq!(config.transfer.max_timeouts, 5);
        assert!(config.validate().is_ok());
    }
}
