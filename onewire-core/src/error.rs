use crate::RomCode;

/// One wire communication error type.
#[derive(Debug, thiserror::Error)]
pub enum OneWireError<E> {
    /// Encapsulates the error type from the underlying transport.
    #[error("bus transport error: {0:?}")]
    Other(E),
    /// Indicates that no device answered the reset pulse.
    #[error("no device present on the bus")]
    NoDevicePresent,
    /// A bit-level operation was attempted while the bus was not at data speed.
    #[error("bus is not in data mode")]
    BusInvalidSpeed,
    /// Data read from the device with this ROM code failed its CRC-8 check.
    #[error("CRC mismatch reading device {0}")]
    InvalidCrc(RomCode),
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}
