#![cfg_attr(not(test), no_std)]
//! DS18B20 temperature reader.
//!
//! Every read addresses one sensor by ROM code: the sensor is told to convert,
//! the host waits out the conversion time, then the scratchpad is read back and
//! checked against its CRC before the temperature is trusted.

use embedded_hal::delay::DelayNs;
use fixed::types::I12F4;
use onewire_core::{OneWire, OneWireCrc, OneWireError, OneWireResult, RomCode};

const DS18B20_CONVERT_T: u8 = 0x44;
const DS18B20_READ_SCRATCH: u8 = 0xbe;

/// Temperature in degrees Celsius, in the sensor's native 1/16 °C steps.
pub type Temperature = I12F4;

/// Reads DS18B20 sensors on a 1-Wire bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ds18b20 {
    resolution: ReadoutResolution,
}

impl Ds18b20 {
    #[inline]
    pub const fn family() -> u8 {
        0x28
    }

    pub fn new() -> Self {
        Self::default()
    }

    /// Conversion time to wait for. Only shorten it for sensors whose
    /// configuration register was set to a lower resolution.
    pub fn with_resolution(mut self, resolution: ReadoutResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Starts a conversion on one sensor and reads the result.
    ///
    /// # Errors
    /// [`OneWireError::NoDevicePresent`] if either reset pulse goes unanswered,
    /// [`OneWireError::InvalidCrc`] if the scratchpad fails its CRC check.
    pub fn read_temperature<O: OneWire, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        rom: &RomCode,
    ) -> OneWireResult<Temperature, O::BusError> {
        self.trigger_conversion(bus, delay, rom)?;
        let temp = Self::read_scratchpad(bus, rom)?.temperature();
        log::debug!("ds18b20: {rom} reads {temp} C");
        Ok(temp)
    }

    /// Reads each sensor in turn; a failing sensor does not stop the others.
    pub fn read_temperatures<'a, O: OneWire, D: DelayNs>(
        &self,
        bus: &'a mut O,
        delay: &'a mut D,
        roms: &'a [RomCode],
    ) -> ReadTemperatures<'a, O, D> {
        ReadTemperatures {
            sensor: *self,
            bus,
            delay,
            roms: roms.iter(),
        }
    }

    /// Addresses one sensor, starts a conversion and blocks until it is done.
    pub fn trigger_conversion<O: OneWire, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        rom: &RomCode,
    ) -> OneWireResult<(), O::BusError> {
        bus.reset_select(rom)?;
        bus.write_byte(DS18B20_CONVERT_T)?;
        delay.delay_us(self.resolution.delay_us());
        Ok(())
    }

    /// Reads and validates the scratchpad of one sensor.
    pub fn read_scratchpad<O: OneWire>(
        bus: &mut O,
        rom: &RomCode,
    ) -> OneWireResult<Scratchpad, O::BusError> {
        // the addressing state does not survive a conversion
        bus.reset_select(rom)?;
        bus.write_byte(DS18B20_READ_SCRATCH)?;
        let mut buf = [0; Scratchpad::BYTES];
        for b in buf.iter_mut() {
            *b = bus.read_byte()?;
        }
        Scratchpad::new(buf).ok_or_else(|| {
            log::warn!("ds18b20: scratchpad {buf:02x?} from {rom} fails CRC");
            OneWireError::InvalidCrc(*rom)
        })
    }
}

/// Iterator returned by [`Ds18b20::read_temperatures`].
pub struct ReadTemperatures<'a, O, D> {
    sensor: Ds18b20,
    bus: &'a mut O,
    delay: &'a mut D,
    roms: core::slice::Iter<'a, RomCode>,
}

impl<O: OneWire, D: DelayNs> Iterator for ReadTemperatures<'_, O, D> {
    type Item = (RomCode, OneWireResult<Temperature, O::BusError>);

    fn next(&mut self) -> Option<Self::Item> {
        let rom = *self.roms.next()?;
        let result = self
            .sensor
            .read_temperature(&mut *self.bus, &mut *self.delay, &rom);
        Some((rom, result))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.roms.size_hint()
    }
}

/// Converts the temperature register (LSB, MSB) to degrees Celsius.
pub fn decode_temperature(lsb: u8, msb: u8) -> Temperature {
    I12F4::from_le_bytes([lsb, msb])
}

/// The 9-byte DS18B20 scratchpad, CRC checked.
///
/// | Byte | Description |
/// |------|-------------|
/// | 0-1  | Temperature, little endian, 1/16 °C |
/// | 2    | TH alarm register |
/// | 3    | TL alarm register |
/// | 4    | Configuration register |
/// | 5-7  | Reserved |
/// | 8    | CRC-8 of bytes 0-7 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scratchpad([u8; Scratchpad::BYTES]);

impl Scratchpad {
    pub const BYTES: usize = 9;

    /// Returns `None` unless the last byte is the CRC of the others.
    pub fn new(bytes: [u8; Self::BYTES]) -> Option<Self> {
        OneWireCrc::validate(&bytes).then_some(Self(bytes))
    }

    pub fn temperature(&self) -> Temperature {
        decode_temperature(self.0[0], self.0[1])
    }

    pub fn alarm_high(&self) -> i8 {
        self.0[2] as i8
    }

    pub fn alarm_low(&self) -> i8 {
        self.0[3] as i8
    }

    /// Resolution from the configuration register, if it holds a valid setting.
    pub fn resolution(&self) -> Option<ReadoutResolution> {
        ReadoutResolution::try_from(self.0[4]).ok()
    }

    pub fn as_bytes(&self) -> &[u8; Self::BYTES] {
        &self.0
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadoutResolution {
    Resolution9bit = 0x1f,
    Resolution10bit = 0x3f,
    Resolution11bit = 0x5f,
    Resolution12bit = 0x7f,
}

impl Default for ReadoutResolution {
    fn default() -> Self {
        Self::Resolution12bit
    }
}

impl ReadoutResolution {
    pub fn delay_us(&self) -> u32 {
        use ReadoutResolution::*;
        match self {
            Resolution9bit => 93750,
            Resolution10bit => 187500,
            Resolution11bit => 375000,
            Resolution12bit => 750000,
        }
    }
}

impl TryFrom<u8> for ReadoutResolution {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ReadoutResolution::*;
        match value {
            0x1f => Ok(Resolution9bit),
            0x3f => Ok(Resolution10bit),
            0x5f => Ok(Resolution11bit),
            0x7f => Ok(Resolution12bit),
            _ => Err("Invalid readout resolution"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds9097::{
        Ds9097,
        sim::{SimDevice, SimError, SimulatedBus},
    };
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use onewire_core::crc8;

    #[derive(Default)]
    struct RecordingDelay {
        ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.ns += u64::from(ns);
        }
    }

    fn rom(serial: u8) -> RomCode {
        let head = [0x28, serial, 0x3c, 0x01, 0x00, 0x00, 0x00];
        let mut raw = [0; 8];
        raw[..7].copy_from_slice(&head);
        raw[7] = crc8(&head);
        RomCode::new(raw)
    }

    fn bus_with(devices: &[SimDevice]) -> SimulatedBus {
        let mut sim = SimulatedBus::new();
        for device in devices {
            sim.add(device.clone());
        }
        sim
    }

    #[test]
    fn test_temp_conv() {
        assert_eq!(decode_temperature(0x50, 0x05).to_num::<f32>(), 85.0);
        assert_eq!(decode_temperature(0xd0, 0x07), 125);
        assert_eq!(decode_temperature(0x91, 0x01), I12F4::from_num(25.0625));
        assert_eq!(decode_temperature(0xa2, 0x00), I12F4::from_num(10.125));
        assert_eq!(decode_temperature(0x08, 0x00), I12F4::from_num(0.5));
        assert_eq!(decode_temperature(0x00, 0x00), 0);
        assert_eq!(decode_temperature(0xf8, 0xff), I12F4::from_num(-0.5));
        assert_eq!(decode_temperature(0x5e, 0xff).to_num::<f32>(), -10.125);
        assert_eq!(decode_temperature(0x6f, 0xfe), I12F4::from_num(-25.0625));
        assert_eq!(decode_temperature(0x90, 0xfc), -55);
    }

    #[test]
    fn scratchpad_checks_crc() {
        let mut bytes = [0x50, 0x05, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10, 0x1c];
        let scratchpad = Scratchpad::new(bytes).unwrap();
        assert_eq!(scratchpad.temperature(), 85);
        assert_eq!(scratchpad.alarm_high(), 75);
        assert_eq!(scratchpad.alarm_low(), 70);
        assert_eq!(scratchpad.resolution(), Some(ReadoutResolution::Resolution12bit));
        bytes[8] = 0x1d;
        assert_eq!(Scratchpad::new(bytes), None);
    }

    #[test]
    fn power_on_sensor_reads_85() {
        let device = SimDevice::ds18b20(rom(1));
        let mut sim = bus_with(&[device]);
        let mut bus = Ds9097::new(&mut sim);
        let temp = Ds18b20::new()
            .read_temperature(&mut bus, &mut NoopDelay::new(), &rom(1))
            .unwrap();
        assert_eq!(temp.to_num::<f32>(), 85.0);
    }

    #[test]
    fn negative_temperature() {
        let device = SimDevice::ds18b20(rom(1)).with_temperature_raw(0xff5e);
        let mut sim = bus_with(&[device]);
        let temp = Ds18b20::new()
            .read_temperature(&mut Ds9097::new(&mut sim), &mut NoopDelay::new(), &rom(1))
            .unwrap();
        assert_eq!(temp, I12F4::from_num(-10.125));
        assert_eq!(sim.conversions(), 1);
        assert_eq!(sim.resets(), 2);
    }

    #[test]
    fn waits_for_the_conversion() {
        let mut sim = bus_with(&[SimDevice::ds18b20(rom(1))]);
        let mut delay = RecordingDelay::default();
        Ds18b20::new()
            .read_temperature(&mut Ds9097::new(&mut sim), &mut delay, &rom(1))
            .unwrap();
        assert_eq!(delay.ns, 750_000_000);

        let mut delay = RecordingDelay::default();
        Ds18b20::new()
            .with_resolution(ReadoutResolution::Resolution9bit)
            .read_temperature(&mut Ds9097::new(&mut sim), &mut delay, &rom(1))
            .unwrap();
        assert_eq!(delay.ns, 93_750_000);
    }

    #[test]
    fn corrupt_scratchpad_is_a_crc_error() {
        let device = SimDevice::ds18b20(rom(1)).with_corrupt_scratchpad();
        let mut sim = bus_with(&[device]);
        let res = Ds18b20::new().read_temperature(
            &mut Ds9097::new(&mut sim),
            &mut NoopDelay::new(),
            &rom(1),
        );
        assert!(matches!(res, Err(OneWireError::InvalidCrc(r)) if r == rom(1)));
    }

    #[test]
    fn empty_bus_has_no_presence() {
        let mut sim = SimulatedBus::new();
        let res = Ds18b20::new().read_temperature(
            &mut Ds9097::new(&mut sim),
            &mut NoopDelay::new(),
            &rom(1),
        );
        assert!(matches!(res, Err(OneWireError::NoDevicePresent)));
        assert_eq!(sim.conversions(), 0);
    }

    #[test]
    fn sensor_lost_during_conversion() {
        let mut sim = bus_with(&[SimDevice::ds18b20(rom(1))]);
        sim.set_presence_limit(1);
        let res = Ds18b20::new().read_temperature(
            &mut Ds9097::new(&mut sim),
            &mut NoopDelay::new(),
            &rom(1),
        );
        assert!(matches!(res, Err(OneWireError::NoDevicePresent)));
        assert_eq!(sim.conversions(), 1);
    }

    #[test]
    fn unknown_rom_reads_an_idle_line() {
        let mut sim = bus_with(&[SimDevice::ds18b20(rom(1))]);
        let res = Ds18b20::read_scratchpad(&mut Ds9097::new(&mut sim), &rom(2));
        assert!(matches!(res, Err(OneWireError::InvalidCrc(r)) if r == rom(2)));
    }

    #[test]
    fn transport_failure_is_reported() {
        let mut sim = bus_with(&[SimDevice::ds18b20(rom(1))]);
        sim.set_unavailable(true);
        let res = Ds18b20::new().read_temperature(
            &mut Ds9097::new(&mut sim),
            &mut NoopDelay::new(),
            &rom(1),
        );
        assert!(matches!(res, Err(OneWireError::Other(SimError::Unavailable))));
    }

    #[test]
    fn batch_read_continues_past_failures() {
        let roms = [rom(1), rom(2), rom(3)];
        let mut sim = bus_with(&[
            SimDevice::ds18b20(roms[0]).with_temperature_raw(0x0191),
            SimDevice::ds18b20(roms[1]).with_corrupt_scratchpad(),
            SimDevice::ds18b20(roms[2]).with_temperature_raw(0xfc90),
        ]);
        let mut bus = Ds9097::new(&mut sim);
        let mut delay = NoopDelay::new();
        let sensor = Ds18b20::new();
        let results: Vec<_> = sensor.read_temperatures(&mut bus, &mut delay, &roms).collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, roms[0]);
        assert_eq!(*results[0].1.as_ref().unwrap(), I12F4::from_num(25.0625));
        assert!(matches!(results[1].1, Err(OneWireError::InvalidCrc(r)) if r == roms[1]));
        assert_eq!(results[2].0, roms[2]);
        assert_eq!(*results[2].1.as_ref().unwrap(), -55);
        drop(bus);
        assert_eq!(sim.conversions(), 3);
    }
}
