use crate::{Ds9097, LinkMode, RESET_MARKER, SLOT_ONE, SLOT_ZERO, SerialLink};
use core::ops::RangeInclusive;
use onewire_core::{OneWire, OneWireError, OneWireResult, OneWireStatus};

/// Echo values at [`RESET_BAUD`](crate::RESET_BAUD) that indicate a presence pulse.
///
/// An unchanged `0xF0` echo means nobody pulled the line; values far outside the
/// window come from a shorted or floating line.
const PRESENCE_WINDOW: RangeInclusive<u8> = 0x10..=0xe0;

/// Whether a reset echo byte indicates at least one device on the bus.
pub fn is_presence_response(byte: u8) -> bool {
    PRESENCE_WINDOW.contains(&byte)
}

/// Result of a reset pulse: the echoed byte, or `None` if the read timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceStatus(Option<u8>);

impl PresenceStatus {
    /// The raw byte read back after the reset marker.
    pub fn response(&self) -> Option<u8> {
        self.0
    }
}

impl OneWireStatus for PresenceStatus {
    fn presence(&self) -> bool {
        self.0.is_some_and(is_presence_response)
    }
}

impl<L: SerialLink> OneWire for Ds9097<L> {
    type Status = PresenceStatus;

    type BusError = L::Error;

    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        self.switch_mode(LinkMode::Reset)?;
        self.link.write(&[RESET_MARKER])?;
        self.link.flush()?;
        let status = PresenceStatus(self.link.read_byte()?);
        log::trace!(
            "ds9097: reset echo {:02x?}, presence {}",
            status.response(),
            status.presence()
        );
        Ok(status)
    }

    fn enter_data_mode(&mut self) -> OneWireResult<(), Self::BusError> {
        self.switch_mode(LinkMode::Data)?;
        Ok(())
    }

    fn touch_bit(&mut self, bit: bool) -> OneWireResult<bool, Self::BusError> {
        if self.mode != Some(LinkMode::Data) {
            return Err(OneWireError::BusInvalidSpeed);
        }
        self.link.write(&[if bit { SLOT_ONE } else { SLOT_ZERO }])?;
        // anything but an untouched echo means the line was held low
        Ok(self.link.read_byte()? == Some(SLOT_ONE))
    }
}
