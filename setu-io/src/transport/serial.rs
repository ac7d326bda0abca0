//! UART link to a scanner

use super::Transport;
use crate::error::{Error, Result};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Serial port opened 8N1 without flow control
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
    baud: u32,
}

impl SerialTransport {
    /// Open `path` at `baud`; each read returns 0 bytes once `read_timeout` expires
    pub fn open(path: &str, baud: u32, read_timeout: Duration) -> Result<Self> {
        if baud == 0 {
            return Err(Error::Connect(format!("{}: baud rate must be non-zero", path)));
        }

        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        // Leftovers from a previous session would desync the first response
        if let Err(e) = port.clear(ClearBuffer::All) {
            log::debug!("{}: could not clear buffers: {}", path, e);
        }

        log::info!("Opened serial port: {} at {} baud", path, baud);
        Ok(Self {
            port,
            path: path.to_string(),
            baud,
        })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            other => Ok(other?),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.port.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.port.flush()?)
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.port.write_data_terminal_ready(level)?;
        log::trace!("{}: DTR {}", self.path, if level { "high" } else { "low" });
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        log::debug!("Closed serial port: {} ({} baud)", self.path, self.baud);
    }
}
