//! Frame check sequence: nibble-table CRC32
//!
//! Each byte is folded in as two 4-bit steps, low nibble first. The table
//! folds the usual initial value and final XOR into its entries, so the
//! register starts at zero and is returned as-is.

const CRC_TABLE: [u32; 16] = [
    0x4DBD_F21C, 0x500A_E278, 0x76D3_D2D4, 0x6B64_C2B0,
    0x3B61_B38C, 0x26D6_A3E8, 0x000F_9344, 0x1DB8_8320,
    0xA005_713C, 0xBDB2_6158, 0x9B6B_51F4, 0x86DC_4190,
    0xD6D9_30AC, 0xCB6E_20C8, 0xEDB7_1064, 0xF000_0000,
];

/// Compute the FCS of `data`
pub fn crc32(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &byte| {
        let crc = (crc >> 4) ^ CRC_TABLE[((crc ^ u32::from(byte)) & 0x0F) as usize];
        (crc >> 4) ^ CRC_TABLE[((crc ^ u32::from(byte >> 4)) & 0x0F) as usize]
    })
}
