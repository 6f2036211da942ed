#![cfg_attr(not(any(test, feature = "sim")), no_std)]
#![deny(missing_docs)]

/*! # DS9097
 *
 * 1-Wire bus master for passive serial adapters (DS9097 and clones: a UART
 * wired to the bus through a couple of diodes and a pull-up, no controller).
 *
 * Every UART character becomes one 1-Wire time slot. At 9600 baud the start
 * bit plus the low bits of `0xF0` hold the line low long enough for a reset
 * pulse, and a device's presence pulse corrupts the echoed high bits. At
 * 115200 baud a `0xFF` character is a write-one/read slot and `0x00` a
 * write-zero slot; a device answering zero pulls the line low and the echo
 * differs from `0xFF`.
 *
 * [`Ds9097`] implements [`OneWire`] on top of any [`SerialLink`].
 */

pub use onewire_core::{OneWire, OneWireError, OneWireResult};
mod link;
mod onewire;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use link::{LinkMode, SerialLink};
pub use onewire::{PresenceStatus, is_presence_response};

/// Baud rate used for the reset pulse and presence detect.
pub const RESET_BAUD: u32 = 9600;
/// Baud rate used for bit-level time slots.
pub const DATA_BAUD: u32 = 115200;
/// Character sent at [`RESET_BAUD`] to generate the reset pulse.
pub const RESET_MARKER: u8 = 0xf0;
/// Character for a write-one or read slot at [`DATA_BAUD`].
pub const SLOT_ONE: u8 = 0xff;
/// Character for a write-zero slot at [`DATA_BAUD`].
pub const SLOT_ZERO: u8 = 0x00;

/// A DS9097 passive serial 1-Wire adapter.
///
/// Takes ownership of a serial link (implementing [`SerialLink`]). The link is
/// reopened for every speed change and closed when the adapter is dropped.
pub struct Ds9097<L: SerialLink> {
    pub(crate) link: L,
    pub(crate) mode: Option<LinkMode>,
    pub(crate) reset_baud: u32,
    pub(crate) data_baud: u32,
}

/// Builder for creating a [`Ds9097`] instance with custom line speeds.
#[derive(Debug, Clone, Copy)]
pub struct Ds9097Builder {
    pub(crate) reset_baud: u32,
    pub(crate) data_baud: u32,
}

impl Default for Ds9097Builder {
    fn default() -> Self {
        Ds9097Builder {
            reset_baud: RESET_BAUD,
            data_baud: DATA_BAUD,
        }
    }
}

impl Ds9097Builder {
    /// Sets the baud rate used for the reset pulse.
    pub fn with_reset_baud(mut self, baud: u32) -> Self {
        self.reset_baud = baud;
        self
    }

    /// Sets the baud rate used for bit-level time slots.
    pub fn with_data_baud(mut self, baud: u32) -> Self {
        self.data_baud = baud;
        self
    }

    /// Builds a new `Ds9097` instance around a closed link.
    pub fn build<L: SerialLink>(self, link: L) -> Ds9097<L> {
        Ds9097 {
            link,
            mode: None,
            reset_baud: self.reset_baud,
            data_baud: self.data_baud,
        }
    }
}

impl<L: SerialLink> Ds9097<L> {
    /// Creates a new instance of `Ds9097` with the default 9600/115200 line speeds.
    pub fn new(link: L) -> Self {
        Ds9097Builder::default().build(link)
    }

    /// The speed the link is currently open at, if it is open.
    pub fn mode(&self) -> Option<LinkMode> {
        self.mode
    }

    /// Closes the link. The next reset reopens it.
    pub fn close(&mut self) {
        if self.mode.take().is_some() {
            log::trace!("ds9097: closing link");
        }
        self.link.close();
    }

    /// Closes the link and reopens it at the speed for `mode`.
    pub(crate) fn switch_mode(&mut self, mode: LinkMode) -> Result<(), L::Error> {
        self.close();
        let baud = match mode {
            LinkMode::Reset => self.reset_baud,
            LinkMode::Data => self.data_baud,
        };
        log::trace!("ds9097: opening link at {baud} baud for {mode:?}");
        self.link.open(baud)?;
        self.mode = Some(mode);
        Ok(())
    }
}

impl<L: SerialLink> Drop for Ds9097<L> {
    fn drop(&mut self) {
        self.close();
    }
}
