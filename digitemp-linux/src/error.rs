use std::path::PathBuf;

use onewire_core::OneWireError;

use crate::link::LinkError;

/// Errors that end a `digitemp` run, generic over the bus transport error.
#[derive(Debug, thiserror::Error)]
pub enum AppError<E = LinkError> {
    #[error("{path}:{line}: {reason}")]
    Config {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("output: {0}")]
    Io(#[from] std::io::Error),
    #[error("1-Wire bus: {0}")]
    Bus(#[from] OneWireError<E>),
    #[error("no sensors found on the bus")]
    NoSensorsFound,
    #[error("no sensors configured, run with --init first")]
    NoSensorsConfigured,
    #[error("sensor {index} is not configured ({count} sensors known)")]
    InvalidSensorIndex { index: usize, count: usize },
}
