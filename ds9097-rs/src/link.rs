/// Line speed profile of a [`Ds9097`](crate::Ds9097) link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Slow speed, used for the reset pulse and presence detect only.
    Reset,
    /// Fast speed, used for every bit-level time slot.
    Data,
}

/// Byte-oriented serial channel driving the 1-Wire adapter.
///
/// Implementations configure 8 data bits, no parity, one stop bit and a short
/// fixed read timeout.
pub trait SerialLink {
    /// Error type of the underlying port.
    type Error;

    /// Opens the channel at the given baud rate.
    ///
    /// # Errors
    /// Fails if the device is unavailable or rejects the settings.
    fn open(&mut self, baud: u32) -> Result<(), Self::Error>;

    /// Closes the channel, releasing the device. Closing a closed link does nothing.
    fn close(&mut self);

    /// Writes all bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Blocks until written bytes have been handed to the line.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Reads one byte, waiting at most the link's read timeout.
    ///
    /// # Returns
    /// `None` if nothing arrived before the timeout.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;
}

impl<L: SerialLink + ?Sized> SerialLink for &mut L {
    type Error = L::Error;

    fn open(&mut self, baud: u32) -> Result<(), Self::Error> {
        (**self).open(baud)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(bytes)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        (**self).read_byte()
    }
}
