use std::fmt::Debug;
use std::io::Write;

use chrono::NaiveDateTime;
use ds18b20::{Ds18b20, Temperature};
use embedded_hal::delay::DelayNs;
use onewire_core::{OneWire, RomCode, discover};

use crate::config::Config;
use crate::error::AppError;
use crate::report::{Summary, report_all};

/// Lists every device on the bus; an empty bus is an error.
pub fn walk<O: OneWire>(bus: &mut O) -> Result<Vec<RomCode>, AppError<O::BusError>> {
    let roms = discover(bus)?;
    log::info!("found {} devices", roms.len());
    if roms.is_empty() {
        return Err(AppError::NoSensorsFound);
    }
    Ok(roms)
}

/// Discovers the sensors and builds the config that records them.
pub fn init<O: OneWire>(bus: &mut O, tty: &str) -> Result<Config, AppError<O::BusError>> {
    let roms = walk(bus)?;
    for rom in roms.iter().filter(|r| r.family() != Ds18b20::family()) {
        log::warn!("{rom} is not a DS18B20 (family {:#04x})", rom.family());
    }
    Ok(Config::from_discovery(tty, &roms))
}

pub fn read_one<O: OneWire, D: DelayNs>(
    bus: &mut O,
    delay: &mut D,
    rom: &RomCode,
) -> Result<Temperature, AppError<O::BusError>> {
    Ok(Ds18b20::new().read_temperature(bus, delay, rom)?)
}

/// Reads every configured sensor and reports each result.
pub fn read_all<O, D, W, V>(
    bus: &mut O,
    delay: &mut D,
    config: &Config,
    now: impl FnMut() -> NaiveDateTime,
    out: &mut W,
    err: &mut V,
) -> Result<Summary, AppError<O::BusError>>
where
    O: OneWire,
    O::BusError: Debug,
    D: DelayNs,
    W: Write,
    V: Write,
{
    if config.roms.is_empty() {
        return Err(AppError::NoSensorsConfigured);
    }
    let (indices, roms): (Vec<usize>, Vec<RomCode>) = config.roms.iter().unzip();
    let readings = Ds18b20::new()
        .read_temperatures(bus, delay, &roms)
        .zip(indices)
        .map(|((rom, result), index)| (index, rom, result));
    Ok(report_all(readings, now, out, err)?)
}
