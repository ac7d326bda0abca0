//! UDP transport for network-attached scanners
//!
//! The scanner speaks the same byte protocol as over serial; each datagram
//! carries a slice of that stream. Received datagrams are buffered so callers
//! can read in chunks smaller than a datagram without truncation.

use super::Transport;
use crate::error::{Error, Result};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Largest datagram the scanner is expected to send
const MAX_DATAGRAM_SIZE: usize = 2048;

/// UDP transport bound to one scanner endpoint
pub struct UdpTransport {
    socket: UdpSocket,
    remote: SocketAddr,
    rx: Vec<u8>,
    rx_pos: usize,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to the scanner
    pub fn connect(host: &str, port: u16, read_timeout: Duration) -> Result<Self> {
        let remote = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Connect(format!("{}:{} did not resolve", host, port)))?;

        let bind_addr = if remote.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(remote)?;
        // A zero timeout would make reads block forever
        socket.set_read_timeout(Some(read_timeout.max(Duration::from_millis(1))))?;

        log::info!("Opened UDP link to scanner at {}", remote);

        Ok(Self {
            socket,
            remote,
            rx: Vec::with_capacity(MAX_DATAGRAM_SIZE),
            rx_pos: 0,
        })
    }

    fn buffered(&self) -> usize {
        self.rx.len() - self.rx_pos
    }
}

impl Transport for UdpTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if self.buffered() == 0 {
            self.rx.resize(MAX_DATAGRAM_SIZE, 0);
            self.rx_pos = 0;
            match self.socket.recv(&mut self.rx) {
                Ok(n) => self.rx.truncate(n),
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    self.rx.clear();
                    return Ok(0);
                }
                Err(e) => {
                    self.rx.clear();
                    return Err(e.into());
                }
            }
        }

        let n = self.buffered().min(buffer.len());
        buffer[..n].copy_from_slice(&self.rx[self.rx_pos..self.rx_pos + n]);
        self.rx_pos += n;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.socket.send(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        log::debug!("Closed UDP link to scanner at {}", self.remote);
    }
}
