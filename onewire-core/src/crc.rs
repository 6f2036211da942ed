/// Reflected form of the Dallas/Maxim polynomial x^8 + x^5 + x^4 + 1 (0x31).
const CRC8_POLY: u8 = 0x8c;

#[cfg(feature = "crc-table")]
static CRC8_TABLE: [u8; 256] = crc8_table();

#[cfg(feature = "crc-table")]
const fn crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x1 == 0x1 {
                (crc >> 1) ^ CRC8_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the 1-Wire CRC-8 of a byte sequence.
///
/// A sequence whose last byte is the CRC of the preceding bytes (a ROM code,
/// a DS18B20 scratchpad) yields zero.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = OneWireCrc::default();
    for &byte in data {
        crc.update(byte);
    }
    crc.value()
}

#[derive(Debug, Default)]
/// Calculate CRC-8 used in 1-Wire communications.
pub struct OneWireCrc(u8);

impl OneWireCrc {
    /// Get the current CRC value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Update the CRC with the incoming byte.
    #[cfg(feature = "crc-table")]
    pub fn update(&mut self, byte: u8) {
        self.0 = CRC8_TABLE[(self.0 ^ byte) as usize];
    }

    /// Update the CRC with the incoming byte.
    #[cfg(not(feature = "crc-table"))]
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.0 ^ byte;
        for _ in 0..8 {
            if crc & 0x1 == 0x1 {
                crc = (crc >> 1) ^ CRC8_POLY;
            } else {
                crc >>= 1;
            }
        }
        self.0 = crc;
    }

    /// Validate a sequence of bytes where the last byte is the 1-Wire CRC of
    /// the previous bytes.
    pub fn validate(sequence: &[u8]) -> bool {
        crc8(sequence) == 0x0
    }
}
