//! A simulated DS9097 adapter with DS18B20 devices on its bus.
//!
//! [`SimulatedBus`] implements [`SerialLink`] and answers every character the
//! way the adapter echo would look on a real line: reset markers at slow speed
//! come back disturbed by presence pulses, and at data speed each `0xFF` slot
//! comes back unchanged unless a device pulls the line low. The devices decode
//! ROM and function commands bit by bit, so discovery and temperature reads can
//! run against scripted ROM codes and scratchpads without hardware.

use crate::{DATA_BAUD, RESET_MARKER, SLOT_ONE, SerialLink};
use onewire_core::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SEARCH_CMD, ONEWIRE_SKIP_ROM_CMD, RomCode, crc8};
use std::collections::VecDeque;

const CONVERT_T: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xbe;
/// Echo of a reset marker when a presence pulse overlaps its high bits.
const PRESENCE_ECHO: u8 = 0xe0;
/// Echo of a read slot when a device holds the line low.
const PULLED_LOW_ECHO: u8 = 0xfe;

/// Errors reported by the simulated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// Opening was refused, as for a missing device node.
    #[error("serial device unavailable")]
    Unavailable,
    /// The adapter read or wrote while the link was closed.
    #[error("link is not open")]
    Closed,
}

/// A DS18B20 on the simulated bus.
#[derive(Debug, Clone)]
pub struct SimDevice {
    rom: RomCode,
    scratchpad: [u8; 9],
    converted_raw: u16,
    corrupt_crc: bool,
}

impl SimDevice {
    /// A sensor in its power-on state: 85 °C in the scratchpad, converting to 85 °C.
    pub fn ds18b20(rom: RomCode) -> Self {
        let mut scratchpad = [0x50, 0x05, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10, 0x00];
        scratchpad[8] = crc8(&scratchpad[..8]);
        Self {
            rom,
            scratchpad,
            converted_raw: 0x0550,
            corrupt_crc: false,
        }
    }

    /// Raw temperature register value the next conversion produces.
    pub fn with_temperature_raw(mut self, raw: u16) -> Self {
        self.converted_raw = raw;
        self
    }

    /// Sends a scratchpad whose CRC byte is wrong.
    pub fn with_corrupt_scratchpad(mut self) -> Self {
        self.corrupt_crc = true;
        self
    }

    /// ROM code of the device.
    pub fn rom(&self) -> RomCode {
        self.rom
    }

    fn convert(&mut self) {
        let [lsb, msb] = self.converted_raw.to_le_bytes();
        self.scratchpad[0] = lsb;
        self.scratchpad[1] = msb;
        self.scratchpad[8] = crc8(&self.scratchpad[..8]);
    }

    fn scratchpad_bit(&self, n: u8) -> bool {
        let mut byte = self.scratchpad[(n / 8) as usize];
        if self.corrupt_crc && n / 8 == 8 {
            byte ^= 0x5a;
        }
        byte & (1 << (n % 8)) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    RomCommand,
    Search { bit: u8, slot: u8 },
    Match { bit: u8 },
    Function,
    ReadScratchpad { bit: u8 },
}

/// Simulated serial port with an adapter and devices behind it.
#[derive(Debug)]
pub struct SimulatedBus {
    devices: Vec<SimDevice>,
    active: Vec<bool>,
    baud: Option<u32>,
    data_baud: u32,
    opened: Vec<u32>,
    rx: VecDeque<u8>,
    phase: Phase,
    shift: u8,
    shift_bits: u8,
    reset_echo: Option<Option<u8>>,
    presence_limit: Option<usize>,
    mute: bool,
    unavailable: bool,
    resets: usize,
    search_passes: usize,
    conversions: usize,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    /// An empty bus behind a closed link.
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            active: Vec::new(),
            baud: None,
            data_baud: DATA_BAUD,
            opened: Vec::new(),
            rx: VecDeque::new(),
            phase: Phase::Idle,
            shift: 0,
            shift_bits: 0,
            reset_echo: None,
            presence_limit: None,
            mute: false,
            unavailable: false,
            resets: 0,
            search_passes: 0,
            conversions: 0,
        }
    }

    /// Attaches a device.
    pub fn add(&mut self, device: SimDevice) {
        self.devices.push(device);
        self.active.push(false);
    }

    /// Speed at which characters are bit slots; any other speed is reset speed.
    pub fn set_data_baud(&mut self, baud: u32) {
        self.data_baud = baud;
    }

    /// Replaces the echo of every reset marker; `None` makes the read time out.
    pub fn set_reset_echo(&mut self, echo: Option<u8>) {
        self.reset_echo = Some(echo);
    }

    /// Devices stop answering after this many reset pulses.
    pub fn set_presence_limit(&mut self, resets: usize) {
        self.presence_limit = Some(resets);
    }

    /// Drops every echo, so all reads time out.
    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    /// Makes opening the link fail.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Baud rates the link was opened at, in order.
    pub fn opened_bauds(&self) -> &[u32] {
        &self.opened
    }

    /// Whether the link is currently open.
    pub fn is_open(&self) -> bool {
        self.baud.is_some()
    }

    /// Reset pulses seen.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Search ROM commands seen.
    pub fn search_passes(&self) -> usize {
        self.search_passes
    }

    /// Convert T commands seen.
    pub fn conversions(&self) -> usize {
        self.conversions
    }

    fn responding(&self) -> bool {
        !self.devices.is_empty() && self.presence_limit.is_none_or(|limit| self.resets <= limit)
    }

    fn bus_reset(&mut self) -> u8 {
        self.resets += 1;
        let responding = self.responding();
        self.active.iter_mut().for_each(|a| *a = responding);
        self.phase = Phase::RomCommand;
        self.shift = 0;
        self.shift_bits = 0;
        if responding { PRESENCE_ECHO } else { RESET_MARKER }
    }

    /// Wired-AND of every selected device's answer.
    fn line(&self, answer: impl Fn(&SimDevice) -> bool) -> bool {
        self.devices
            .iter()
            .zip(&self.active)
            .filter(|(_, active)| **active)
            .all(|(device, _)| answer(device))
    }

    fn shift_in(&mut self, bit: bool) -> Option<u8> {
        self.shift |= (bit as u8) << self.shift_bits;
        self.shift_bits += 1;
        if self.shift_bits < 8 {
            return None;
        }
        let byte = self.shift;
        self.shift = 0;
        self.shift_bits = 0;
        Some(byte)
    }

    fn slot(&mut self, bit: bool) -> bool {
        match self.phase {
            Phase::Idle => bit,
            Phase::RomCommand => {
                if let Some(cmd) = self.shift_in(bit) {
                    self.phase = match cmd {
                        ONEWIRE_SEARCH_CMD => {
                            self.search_passes += 1;
                            Phase::Search { bit: 0, slot: 0 }
                        }
                        ONEWIRE_MATCH_ROM_CMD => Phase::Match { bit: 0 },
                        ONEWIRE_SKIP_ROM_CMD => Phase::Function,
                        _ => Phase::Idle,
                    };
                }
                bit
            }
            Phase::Search { bit: n, slot } => {
                let line = match slot {
                    0 => bit && self.line(|d| d.rom.bit(n)),
                    1 => bit && self.line(|d| !d.rom.bit(n)),
                    _ => {
                        for (device, active) in self.devices.iter().zip(self.active.iter_mut()) {
                            *active &= device.rom.bit(n) == bit;
                        }
                        bit
                    }
                };
                self.phase = match (slot, n) {
                    (2, 63) => Phase::Idle,
                    (2, _) => Phase::Search { bit: n + 1, slot: 0 },
                    _ => Phase::Search { bit: n, slot: slot + 1 },
                };
                line
            }
            Phase::Match { bit: n } => {
                for (device, active) in self.devices.iter().zip(self.active.iter_mut()) {
                    *active &= device.rom.bit(n) == bit;
                }
                self.phase = if n == 63 {
                    Phase::Function
                } else {
                    Phase::Match { bit: n + 1 }
                };
                bit
            }
            Phase::Function => {
                if let Some(cmd) = self.shift_in(bit) {
                    self.phase = match cmd {
                        CONVERT_T => {
                            self.conversions += 1;
                            for (device, active) in self.devices.iter_mut().zip(&self.active) {
                                if *active {
                                    device.convert();
                                }
                            }
                            Phase::Idle
                        }
                        READ_SCRATCHPAD => Phase::ReadScratchpad { bit: 0 },
                        _ => Phase::Idle,
                    };
                }
                bit
            }
            Phase::ReadScratchpad { bit: n } => {
                let line = bit && self.line(|d| d.scratchpad_bit(n));
                self.phase = if n == 71 {
                    Phase::Idle
                } else {
                    Phase::ReadScratchpad { bit: n + 1 }
                };
                line
            }
        }
    }

    fn echo(&mut self, byte: u8) {
        if !self.mute {
            self.rx.push_back(byte);
        }
    }
}

impl SerialLink for SimulatedBus {
    type Error = SimError;

    fn open(&mut self, baud: u32) -> Result<(), Self::Error> {
        if self.unavailable {
            return Err(SimError::Unavailable);
        }
        self.baud = Some(baud);
        self.opened.push(baud);
        self.rx.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.baud = None;
        self.rx.clear();
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let baud = self.baud.ok_or(SimError::Closed)?;
        for &byte in bytes {
            if baud != self.data_baud {
                let echo = if byte == RESET_MARKER {
                    let echo = self.bus_reset();
                    match self.reset_echo {
                        Some(Some(scripted)) => scripted,
                        Some(None) => continue,
                        None => echo,
                    }
                } else {
                    byte
                };
                self.echo(echo);
            } else {
                let line = self.slot(byte == SLOT_ONE);
                let echo = match (byte, line) {
                    (_, true) => byte,
                    (SLOT_ONE, false) => PULLED_LOW_ECHO,
                    (_, false) => 0x00,
                };
                self.echo(echo);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.baud.map(|_| ()).ok_or(SimError::Closed)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        self.baud.ok_or(SimError::Closed)?;
        Ok(self.rx.pop_front())
    }
}
