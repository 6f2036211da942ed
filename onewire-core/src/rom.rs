use crate::crc8;
use core::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// 64-bit 1-Wire device identifier.
///
/// | Byte | Description |
/// |------|-------------|
/// | 0    | Family code (e.g., 0x28 for DS18B20) |
/// | 1-6  | Serial number, least significant byte first |
/// | 7    | CRC-8 of bytes 0-6 |
///
/// Bytes are sent on the bus in index order, each least significant bit first,
/// so bit `n` of the code is bit `n % 8` of byte `n / 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct RomCode([u8; RomCode::BYTES]);

impl RomCode {
    /// Length of a ROM code in bytes
    pub const BYTES: usize = 8;

    /// Length of a ROM code in bits
    pub const BITS: u8 = 64;

    /// Wraps raw bytes as read from the bus.
    pub const fn new(raw: [u8; Self::BYTES]) -> Self {
        Self(raw)
    }

    /// Family code, identifying the device type.
    pub fn family(&self) -> u8 {
        self.0[0]
    }

    /// The 48-bit serial number.
    pub fn serial(&self) -> [u8; 6] {
        let mut serial = [0; 6];
        serial.copy_from_slice(&self.0[1..7]);
        serial
    }

    /// The CRC byte carried in the code.
    pub fn crc(&self) -> u8 {
        self.0[7]
    }

    /// Whether the CRC byte matches the other seven bytes.
    pub fn is_valid(&self) -> bool {
        crc8(&self.0) == 0
    }

    /// Value of bit `n` (0..64) in bus order.
    pub fn bit(&self, n: u8) -> bool {
        self.0[(n / 8) as usize] & (1 << (n % 8)) != 0
    }

    /// Raw bytes in bus order.
    pub fn as_bytes(&self) -> &[u8; Self::BYTES] {
        &self.0
    }

    /// The code as a little-endian integer, family code in the low byte.
    pub fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }
}

impl From<[u8; RomCode::BYTES]> for RomCode {
    fn from(raw: [u8; RomCode::BYTES]) -> Self {
        Self(raw)
    }
}

impl From<RomCode> for [u8; RomCode::BYTES] {
    fn from(rom: RomCode) -> Self {
        rom.0
    }
}

impl From<u64> for RomCode {
    fn from(value: u64) -> Self {
        Self(value.to_le_bytes())
    }
}

impl AsRef<[u8]> for RomCode {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for RomCode {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        for byte in self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Error parsing a [RomCode] from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RomParseError {
    /// Fewer than 8 bytes were given.
    #[error("ROM code needs 8 bytes")]
    NotEnough,
    /// More than 8 bytes were given.
    #[error("ROM code has more than 8 bytes")]
    TooLong,
    /// A character is not a hex digit.
    #[error("invalid hex digit in ROM code")]
    Invalid,
}

impl FromStr for RomCode {
    type Err = RomParseError;

    /// Accepts `28FF641E0F000034`, `28:ff:64:...`, `28 FF 64 ...` and the
    /// config file form `0x28 0xFF 0x64 ...`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut raw = [0u8; Self::BYTES];
        let mut count = 0;
        for token in s.split(|c: char| c.is_whitespace() || c == ':') {
            let token = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            if token.is_empty() {
                continue;
            }
            if token.len() % 2 != 0 {
                return Err(RomParseError::Invalid);
            }
            for pair in token.as_bytes().chunks(2) {
                let byte = match (hex_nibble(pair[0]), hex_nibble(pair[1])) {
                    (Some(h), Some(l)) => (h << 4) | l,
                    _ => return Err(RomParseError::Invalid),
                };
                *raw.get_mut(count).ok_or(RomParseError::TooLong)? = byte;
                count += 1;
            }
        }
        if count < Self::BYTES {
            return Err(RomParseError::NotEnough);
        }
        Ok(Self(raw))
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROM: RomCode = RomCode::new([0x28, 0xff, 0x64, 0x1e, 0x0f, 0x00, 0x00, 0x34]);

    #[test]
    fn parse_contiguous() {
        assert_eq!("28ff641e0f000034".parse(), Ok(ROM));
    }

    #[test]
    fn parse_separated() {
        assert_eq!("28:ff:64:1e:0f:00:00:34".parse(), Ok(ROM));
        assert_eq!("28 FF 64 1E 0F 00 00 34".parse(), Ok(ROM));
        assert_eq!("0x28 0xFF 0x64 0x1E 0x0F 0x00 0x00 0x34".parse(), Ok(ROM));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("28ff641e0f00".parse::<RomCode>(), Err(RomParseError::NotEnough));
        assert_eq!(
            "28ff641e0f00003400".parse::<RomCode>(),
            Err(RomParseError::TooLong)
        );
        assert_eq!("28fg641e0f000034".parse::<RomCode>(), Err(RomParseError::Invalid));
        assert_eq!("0x2 0xFF".parse::<RomCode>(), Err(RomParseError::Invalid));
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(ROM.to_string(), "28FF641E0F000034");
        assert_eq!(ROM.to_string().parse(), Ok(ROM));
    }

    #[test]
    fn fields_and_bits() {
        assert_eq!(ROM.family(), 0x28);
        assert_eq!(ROM.serial(), [0xff, 0x64, 0x1e, 0x0f, 0x00, 0x00]);
        assert_eq!(ROM.crc(), 0x34);
        assert!(ROM.is_valid());
        // 0x28 = 0b0010_1000
        assert!(!ROM.bit(0));
        assert!(ROM.bit(3));
        assert!(ROM.bit(5));
        assert!(ROM.bit(8));
        assert_eq!(RomCode::from(ROM.to_u64()), ROM);
    }
}
