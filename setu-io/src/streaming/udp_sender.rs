//! UDP datagram sender for sample streaming
//!
//! Fire-and-forget unicast (or broadcast) to one fixed destination:
//!
//! - **No framing**: each datagram is exactly one JSON message
//! - **No retries**: a failed send is reported to the caller, which logs it
//! - **Single owner**: the socket is created by [`UdpSender::init`] and
//!   released by [`UdpSender::close`] or on drop, whichever comes first

use crate::config::SenderConfig;
use crate::error::{Error, Result};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};

/// UDP sender bound to one destination
pub struct UdpSender {
    address: String,
    port: u16,
    destination: Option<SocketAddr>,
    socket: Option<UdpSocket>,
}

impl UdpSender {
    /// Create an uninitialized sender for `address:port`
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            destination: None,
            socket: None,
        }
    }

    pub fn from_config(config: &SenderConfig) -> Self {
        Self::new(config.address.clone(), config.port)
    }

    /// Resolve the destination and allocate the socket
    ///
    /// Calling `init` on a ready sender is a no-op.
    pub fn init(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        let destination = resolve(&self.address, self.port)?;
        let bind_addr = if destination.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| Error::SendInit(format!("cannot create socket: {}", e)))?;

        if let IpAddr::V4(ip) = destination.ip() {
            if ip.is_broadcast() {
                socket
                    .set_broadcast(true)
                    .map_err(|e| Error::SendInit(format!("cannot enable broadcast: {}", e)))?;
            }
        }

        log::info!("UDP sender ready (destination {})", destination);
        self.destination = Some(destination);
        self.socket = Some(socket);
        Ok(())
    }

    /// Send one datagram to the destination
    pub fn send(&self, message: &[u8]) -> Result<()> {
        let (Some(socket), Some(destination)) = (&self.socket, self.destination) else {
            return Err(Error::NotInitialized);
        };

        let sent = socket
            .send_to(message, destination)
            .map_err(|e| Error::Send(e.to_string()))?;
        if sent != message.len() {
            return Err(Error::Send(format!(
                "short write: {} of {} bytes",
                sent,
                message.len()
            )));
        }
        Ok(())
    }

    /// Release the socket (idempotent)
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            log::debug!("UDP sender closed");
        }
    }

    /// Check if the socket is allocated
    pub fn is_ready(&self) -> bool {
        self.socket.is_some()
    }

    /// Resolved destination, once initialized
    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination
    }
}

impl Drop for UdpSender {
    fn drop(&mut self) {
        self.close();
    }
}

/// Numeric addresses parse directly; anything else goes through the resolver
fn resolve(address: &str, port: u16) -> Result<SocketAddr> {
    let address = address.trim();
    if address.is_empty() || address.contains(char::is_whitespace) {
        return Err(Error::SendInit(format!("invalid address '{}'", address)));
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    (address, port)
        .to_socket_addrs()
        .map_err(|e| Error::SendInit(format!("cannot resolve '{}': {}", address, e)))?
        .next()
        .ok_or_else(|| Error::SendInit(format!("'{}' has no addresses", address)))
}
