use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use ds9097::SerialLink;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Errors from the host serial port.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },
    #[error("serial I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port is not open")]
    NotOpen,
}

/// [`SerialLink`] over a host serial device, opened 8N1 without flow control.
pub struct SerialPortLink {
    path: String,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortLink {
    /// A closed link to the device at `path`; reads wait at most `timeout`.
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            port: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, LinkError> {
        self.port.as_mut().ok_or(LinkError::NotOpen)
    }
}

impl SerialLink for SerialPortLink {
    type Error = LinkError;

    fn open(&mut self, baud: u32) -> Result<(), Self::Error> {
        self.close();
        let port = serialport::new(&self.path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open()
            .map_err(|source| LinkError::Open {
                path: self.path.clone(),
                source,
            })?;
        // stale echoes from the previous speed would shift every slot
        port.clear(serialport::ClearBuffer::All)
            .map_err(|source| LinkError::Open {
                path: self.path.clone(),
                source,
            })?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        self.port = None;
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.port()?.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.port()?.flush()?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut buf = [0u8; 1];
        match self.port()?.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(ref e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_link_refuses_io() {
        let mut link = SerialPortLink::new("/dev/null-ds9097", Duration::from_millis(10));
        assert_eq!(link.path(), "/dev/null-ds9097");
        assert!(matches!(link.write(&[0xf0]), Err(LinkError::NotOpen)));
        assert!(matches!(link.read_byte(), Err(LinkError::NotOpen)));
        link.close();
    }

    #[test]
    fn missing_device_fails_to_open() {
        let mut link = SerialPortLink::new("/dev/does-not-exist-ds9097", Duration::from_millis(10));
        let err = link.open(9600).unwrap_err();
        assert!(matches!(err, LinkError::Open { ref path, .. } if path == "/dev/does-not-exist-ds9097"));
        assert!(matches!(link.flush(), Err(LinkError::NotOpen)));
    }
}
