use std::fmt::Debug;
use std::io::{self, Write};

use chrono::NaiveDateTime;
use ds18b20::Temperature;
use onewire_core::{OneWireResult, RomCode};

const TIME_FORMAT: &str = "%b %d %H:%M:%S";

pub fn fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// One report line, e.g. `Mar 05 14:07:09 Sensor 0 C: 25.06 F: 77.11`.
pub fn format_reading(time: &NaiveDateTime, index: usize, temp: Temperature) -> String {
    let celsius = temp.to_num::<f64>();
    format!(
        "{} Sensor {index} C: {celsius:.2} F: {:.2}",
        time.format(TIME_FORMAT),
        fahrenheit(celsius)
    )
}

/// Outcome of a batch report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub read: usize,
    pub failed: usize,
}

impl Summary {
    /// A batch fails only when no sensor could be read.
    pub fn all_failed(&self) -> bool {
        self.read == 0 && self.failed > 0
    }
}

/// Writes a line per successful reading to `out` and a line per failure to `err`.
pub fn report_all<E, I, W, V>(
    readings: I,
    mut now: impl FnMut() -> NaiveDateTime,
    out: &mut W,
    err: &mut V,
) -> io::Result<Summary>
where
    E: Debug,
    I: IntoIterator<Item = (usize, RomCode, OneWireResult<Temperature, E>)>,
    W: Write,
    V: Write,
{
    let mut summary = Summary::default();
    for (index, rom, result) in readings {
        match result {
            Ok(temp) => {
                writeln!(out, "{}", format_reading(&now(), index, temp))?;
                summary.read += 1;
            }
            Err(e) => {
                log::debug!("sensor {index} ({rom}) failed");
                writeln!(err, "Sensor {index} ({rom}): {e}")?;
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fixed::types::I12F4;
    use onewire_core::OneWireError;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(14, 7, 9))
            .unwrap()
    }

    #[test]
    fn converts_to_fahrenheit() {
        assert_eq!(fahrenheit(0.0), 32.0);
        assert_eq!(fahrenheit(100.0), 212.0);
        assert_eq!(fahrenheit(-40.0), -40.0);
    }

    #[test]
    fn formats_a_line() {
        assert_eq!(
            format_reading(&noon(), 0, I12F4::from_num(25.0625)),
            "Mar 05 14:07:09 Sensor 0 C: 25.06 F: 77.11"
        );
        assert_eq!(
            format_reading(&noon(), 3, I12F4::from_num(85)),
            "Mar 05 14:07:09 Sensor 3 C: 85.00 F: 185.00"
        );
        assert_eq!(
            format_reading(&noon(), 1, I12F4::from_num(-55)),
            "Mar 05 14:07:09 Sensor 1 C: -55.00 F: -67.00"
        );
    }

    #[test]
    fn failures_go_to_the_error_stream() {
        let rom = RomCode::new([0x28, 0xff, 0x64, 0x1e, 0x0f, 0x00, 0x00, 0x34]);
        let readings: Vec<(usize, RomCode, OneWireResult<Temperature, ()>)> = vec![
            (0, rom, Ok(I12F4::from_num(85))),
            (1, rom, Err(OneWireError::InvalidCrc(rom))),
            (2, rom, Err(OneWireError::NoDevicePresent)),
        ];
        let (mut out, mut err) = (Vec::<u8>::new(), Vec::<u8>::new());
        let summary = report_all(readings, noon, &mut out, &mut err).unwrap();
        assert_eq!(summary, Summary { read: 1, failed: 2 });
        assert!(!summary.all_failed());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Mar 05 14:07:09 Sensor 0 C: 85.00 F: 185.00\n"
        );
        let err = String::from_utf8(err).unwrap();
        assert_eq!(err.lines().count(), 2);
        assert!(err.starts_with("Sensor 1 (28FF641E0F000034): CRC mismatch"));
    }

    #[test]
    fn batch_fails_only_when_nothing_was_read() {
        assert!(Summary { read: 0, failed: 2 }.all_failed());
        assert!(!Summary { read: 0, failed: 0 }.all_failed());
        assert!(!Summary { read: 1, failed: 5 }.all_failed());
    }
}
