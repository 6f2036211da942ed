use crate::{ONEWIRE_MATCH_ROM_CMD, OneWireError, OneWireResult, RomCode};

/// Outcome of a reset pulse.
pub trait OneWireStatus {
    /// Whether at least one device answered with a presence pulse.
    fn presence(&self) -> bool;

    /// Whether the master detected the bus held low (short circuit).
    ///
    /// Masters that cannot tell a short from a presence pulse keep the default.
    fn shortcircuit(&self) -> bool {
        false
    }
}

impl OneWireStatus for bool {
    fn presence(&self) -> bool {
        *self
    }
}

/// Trait for 1-Wire communication.
/// This trait defines the basic operations required for 1-Wire communication: resetting the bus
/// and exchanging single bits. Byte transfers and device addressing are provided on top of them.
pub trait OneWire {
    /// The status type returned by the reset operation.
    /// This type must implement the [OneWireStatus] trait.
    type Status: OneWireStatus;
    /// The error type returned by the operations of this trait.
    /// This type is used to indicate errors in the underlying hardware or communication.
    type BusError;

    /// Issues a reset pulse and samples the bus for a presence pulse.
    ///
    /// # Errors
    /// This method returns an error if the underlying transport fails. The absence of devices is
    /// reported through [OneWireStatus::presence], not as an error.
    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError>;

    /// Prepares the bus for bit-level signalling after a reset.
    ///
    /// Masters that time the reset pulse and the data slots differently switch here; the default
    /// does nothing.
    fn enter_data_mode(&mut self) -> OneWireResult<(), Self::BusError> {
        Ok(())
    }

    /// Generates one time slot on the bus.
    ///
    /// Writing `true` produces a write-one slot, which doubles as a read slot: a device answering
    /// with a zero holds the bus low. Writing `false` produces a write-zero slot.
    ///
    /// # Returns
    /// The bit sampled on the bus during the slot.
    fn touch_bit(&mut self, bit: bool) -> OneWireResult<bool, Self::BusError>;

    /// Writes a single bit to the bus.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        self.touch_bit(bit).map(|_| ())
    }

    /// Reads a single bit from the bus.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.touch_bit(true)
    }

    /// Exchanges a byte, least significant bit first.
    ///
    /// # Returns
    /// The byte composed of the eight sampled bits.
    fn touch_byte(&mut self, byte: u8) -> OneWireResult<u8, Self::BusError> {
        let mut result = 0;
        for i in 0..8 {
            if self.touch_bit(byte & (1 << i) != 0)? {
                result |= 1 << i;
            }
        }
        Ok(result)
    }

    /// Writes a byte to the 1-Wire bus.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        self.touch_byte(byte).map(|_| ())
    }

    /// Reads a byte from the 1-Wire bus.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        self.touch_byte(0xff)
    }

    /// Sends the Match ROM command followed by `rom`, so that only that device listens to the
    /// next function command.
    fn select(&mut self, rom: &RomCode) -> OneWireResult<(), Self::BusError> {
        self.write_byte(ONEWIRE_MATCH_ROM_CMD)?;
        for &b in rom.as_bytes() {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Resets the bus and addresses the device with the given ROM code.
    ///
    /// # Errors
    /// Returns [OneWireError::NoDevicePresent] if no device answered the reset pulse.
    fn reset_select(&mut self, rom: &RomCode) -> OneWireResult<(), Self::BusError> {
        if !self.reset()?.presence() {
            return Err(OneWireError::NoDevicePresent);
        }
        self.enter_data_mode()?;
        self.select(rom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records written slots and replays a fixed bit pattern.
    struct Loopback {
        written: Vec<bool>,
        replies: Vec<bool>,
        present: bool,
    }

    impl OneWire for Loopback {
        type Status = bool;
        type BusError = ();

        fn reset(&mut self) -> OneWireResult<bool, ()> {
            Ok(self.present)
        }

        fn touch_bit(&mut self, bit: bool) -> OneWireResult<bool, ()> {
            self.written.push(bit);
            // open drain: a device can only pull the line low
            Ok(bit && self.replies.pop().unwrap_or(true))
        }
    }

    fn loopback(present: bool) -> Loopback {
        Loopback {
            written: Vec::new(),
            replies: Vec::new(),
            present,
        }
    }

    #[test]
    fn bytes_go_out_lsb_first() {
        let mut bus = loopback(true);
        bus.write_byte(0x55).unwrap();
        assert_eq!(
            bus.written,
            [true, false, true, false, true, false, true, false]
        );
    }

    #[test]
    fn read_byte_composes_lsb_first() {
        let mut bus = loopback(true);
        // popped from the back: first slot reads 0, rest read 1
        bus.replies = vec![true, true, true, true, true, true, true, false];
        assert_eq!(bus.read_byte().unwrap(), 0xfe);
        assert!(bus.written.iter().all(|&b| b));
    }

    #[test]
    fn select_sends_match_rom_then_code() {
        let rom = RomCode::new([0x28, 0x01, 0, 0, 0, 0, 0, 0x29]);
        let mut bus = loopback(true);
        bus.reset_select(&rom).unwrap();
        assert_eq!(bus.written.len(), 72);
        let first: u8 = bus.written[..8]
            .iter()
            .enumerate()
            .map(|(i, &b)| (b as u8) << i)
            .sum();
        assert_eq!(first, ONEWIRE_MATCH_ROM_CMD);
    }

    #[test]
    fn reset_select_without_presence_fails() {
        let rom = RomCode::default();
        let mut bus = loopback(false);
        assert!(matches!(
            bus.reset_select(&rom),
            Err(OneWireError::NoDevicePresent)
        ));
        assert!(bus.written.is_empty());
    }
}
