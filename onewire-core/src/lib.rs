#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//! # onewire-core
//! A no-std implementation of the 1-Wire protocol core.
//!
//! The [OneWire] trait describes a bus master: a reset/presence pulse plus a
//! single bit-level primitive ([OneWire::touch_bit]) from which byte transfers
//! and device addressing are derived. Masters that signal the reset pulse and
//! the data slots at different line speeds (such as a passive serial adapter)
//! switch speed in [OneWire::enter_data_mode].
//!
//! The crate also provides the Search ROM algorithm for discovering devices on
//! the bus ([OneWireSearch], [discover]) and the Dallas/Maxim CRC-8 used to
//! validate ROM codes and device memory ([crc8], [OneWireCrc]).

#[cfg(feature = "alloc")]
extern crate alloc;

mod consts;
mod crc;
mod error;
mod rom;
mod search;
mod traits;

pub use consts::*;
pub use crc::{OneWireCrc, crc8};
pub use error::OneWireError;
pub use rom::{RomCode, RomParseError};
#[cfg(feature = "alloc")]
pub use search::discover;
pub use search::OneWireSearch;
pub use traits::{OneWire, OneWireStatus};

/// Result of 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
