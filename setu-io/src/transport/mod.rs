//! Transport layer for sensor link I/O abstraction

use crate::error::Result;
use std::fmt;
use std::time::Duration;

#[cfg(any(test, feature = "mock"))]
mod mock;
mod serial;
mod udp;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use udp::UdpTransport;

/// Transport trait for scanner communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 on timeout)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Drive the DTR modem line (serial motor control on A-series scanners)
    fn set_dtr(&mut self, level: bool) -> Result<()> {
        let _ = level;
        Err(crate::Error::NotSupported(
            "DTR control not available on this link".to_string(),
        ))
    }
}

/// A fully resolved sensor link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// Serial port at a fixed baud rate
    Serial { path: String, baud: u32 },
    /// Network-attached scanner reached over UDP
    Udp { host: String, port: u16 },
}

impl Channel {
    /// True for serial links (motor control is only meaningful there)
    pub fn is_serial(&self) -> bool {
        matches!(self, Channel::Serial { .. })
    }

    /// Open the link; `read_timeout` bounds each individual read
    pub fn open(&self, read_timeout: Duration) -> Result<Box<dyn Transport>> {
        match self {
            Channel::Serial { path, baud } => {
                Ok(Box::new(SerialTransport::open(path, *baud, read_timeout)?))
            }
            Channel::Udp { host, port } => {
                Ok(Box::new(UdpTransport::connect(host, *port, read_timeout)?))
            }
        }
    }
}

/// Link requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSelector {
    /// Serial port; `baud = None` searches the configured candidate rates
    Serial { path: String, baud: Option<u32> },
    /// Network-attached scanner
    Network { host: String, port: u16 },
}

impl TransportSelector {
    /// Channels to try, in order
    pub fn candidates(&self, fallback_bauds: &[u32]) -> Vec<Channel> {
        match self {
            TransportSelector::Serial {
                path,
                baud: Some(baud),
            } => vec![Channel::Serial {
                path: path.clone(),
                baud: *baud,
            }],
            TransportSelector::Serial { path, baud: None } => fallback_bauds
                .iter()
                .map(|&baud| Channel::Serial {
                    path: path.clone(),
                    baud,
                })
                .collect(),
            TransportSelector::Network { host, port } => vec![Channel::Udp {
                host: host.clone(),
                port: *port,
            }],
        }
    }
}

impl fmt::Display for TransportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportSelector::Serial { path, .. } => write!(f, "{}", path),
            TransportSelector::Network { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Serial { path, baud } => write!(f, "serial {} @ {} baud", path, baud),
            Channel::Udp { host, port } => write!(f, "udp {}:{}", host, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_display() {
        let serial = Channel::Serial {
            path: "/dev/ttyUSB0".to_string(),
            baud: 115200,
        };
        assert_eq!(serial.to_string(), "serial /dev/ttyUSB0 @ 115200 baud");
        assert!(serial.is_serial());

        let udp = Channel::Udp {
            host: "192.168.11.2".to_string(),
            port: 8089,
        };
        assert_eq!(udp.to_string(), "udp 192.168.11.2:8089");
        assert!(!udp.is_serial());
    }

    #[test]
    fn test_selector_candidates() {
        let fallback = [115200, 256000];

        let explicit = TransportSelector::Serial {
            path: "/dev/ttyUSB0".to_string(),
            baud: Some(1_000_000),
        };
        assert_eq!(
            explicit.candidates(&fallback),
            vec![Channel::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud: 1_000_000
            }]
        );

        let search = TransportSelector::Serial {
            path: "/dev/ttyUSB0".to_string(),
            baud: None,
        };
        let bauds: Vec<u32> = search
            .candidates(&fallback)
            .into_iter()
            .map(|c| match c {
                Channel::Serial { baud, .. } => baud,
                Channel::Udp { .. } => 0,
            })
            .collect();
        assert_eq!(bauds, vec![115200, 256000]);

        let network = TransportSelector::Network {
            host: "192.168.11.2".to_string(),
            port: 8089,
        };
        assert_eq!(network.candidates(&fallback).len(), 1);
        assert_eq!(network.to_string(), "192.168.11.2:8089");
    }

    #[test]
    fn test_open_missing_serial_port_fails() {
        let channel = Channel::Serial {
            path: "/dev/setu-io-does-not-exist".to_string(),
            baud: 115200,
        };
        assert!(channel.open(Duration::from_millis(10)).is_err());
    }
}
