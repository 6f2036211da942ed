//! The `digitemp.conf` file: serial device and the ROM codes found by `--init`.
//!
//! ```text
//! TTY /dev/ttyUSB0
//! SENSORS 2
//! ROM 0 0x28 0xFF 0x64 0x1E 0x0F 0x00 0x00 0x34
//! ROM 1 0x28 0xAA 0x10 0x05 0x00 0x00 0x00 0x70
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use onewire_core::RomCode;

use crate::error::AppError;

/// Serial device used when the config does not name one.
pub const DEFAULT_TTY: &str = "/dev/ttyUSB0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tty: String,
    /// Sensors by index.
    pub roms: BTreeMap<usize, RomCode>,
}

/// A line of the config file that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tty: DEFAULT_TTY.into(),
            roms: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Config for freshly discovered sensors, numbered in discovery order.
    pub fn from_discovery(tty: &str, roms: &[RomCode]) -> Self {
        Self {
            tty: tty.into(),
            roms: roms.iter().copied().enumerate().collect(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut config = Config::default();
        let mut declared = None;
        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            let fail = |reason: String| ParseError {
                line: line_no,
                reason,
            };
            let line = line.split('#').next().unwrap_or_default().trim();
            let mut words = line.split_whitespace();
            let Some(key) = words.next() else {
                continue;
            };
            match key {
                "TTY" => {
                    config.tty = words
                        .next()
                        .ok_or_else(|| fail("TTY needs a device path".into()))?
                        .into();
                }
                "SENSORS" => {
                    let count = words
                        .next()
                        .and_then(|w| w.parse::<usize>().ok())
                        .ok_or_else(|| fail("SENSORS needs a count".into()))?;
                    declared = Some(count);
                }
                "ROM" => {
                    let index = words
                        .next()
                        .and_then(|w| w.parse::<usize>().ok())
                        .ok_or_else(|| fail("ROM needs a sensor index".into()))?;
                    let bytes = words.collect::<Vec<_>>().join(" ");
                    let rom: RomCode = bytes
                        .parse()
                        .map_err(|e| fail(format!("ROM {index}: {e}")))?;
                    if !rom.is_valid() {
                        log::warn!("config line {line_no}: ROM {rom} fails its CRC check");
                    }
                    if config.roms.insert(index, rom).is_some() {
                        return Err(fail(format!("ROM {index} given twice")));
                    }
                }
                other => log::debug!("config line {line_no}: ignoring {other}"),
            }
        }
        if let Some(count) = declared.filter(|&c| c != config.roms.len()) {
            log::warn!(
                "config declares {count} sensors but lists {} ROM codes",
                config.roms.len()
            );
        }
        Ok(config)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = writeln!(out, "TTY {}", self.tty);
        let _ = writeln!(out, "SENSORS {}", self.roms.len());
        for (index, rom) in &self.roms {
            let _ = write!(out, "ROM {index}");
            for byte in rom.as_bytes() {
                let _ = write!(out, " 0x{byte:02X}");
            }
            out.push('\n');
        }
        out
    }

    /// Reads the config file. A missing file gives the default config.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} not found, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(AppError::File {
                    path: path.into(),
                    source,
                });
            }
        };
        Config::parse(&text).map_err(|e| AppError::Config {
            path: path.into(),
            line: e.line,
            reason: e.reason,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        std::fs::write(path, self.render()).map_err(|source| AppError::File {
            path: path.into(),
            source,
        })
    }

    /// ROM code of sensor `index`.
    pub fn sensor(&self, index: usize) -> Result<RomCode, AppError> {
        if self.roms.is_empty() {
            return Err(AppError::NoSensorsConfigured);
        }
        self.roms
            .get(&index)
            .copied()
            .ok_or(AppError::InvalidSensorIndex {
                index,
                count: self.roms.len(),
            })
    }
}
