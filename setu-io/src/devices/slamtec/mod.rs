//! SLAMTEC (RPLIDAR family) scanner driver
//!
//! Speaks the request/response protocol over any [`Transport`], so the same
//! driver serves USB-serial and network-attached scanners. Everything runs on
//! the caller's thread: `grab_scan_buffer` reads measurement nodes inline
//! until one full revolution has been collected.
//!
//! # Revolution Assembly
//!
//! ```text
//! node(S) node node ... node | node(S) node ...
//! └──────── revolution N ────┘ └── revolution N+1
//! ```
//!
//! Nodes received before the first start flag belong to a partial revolution
//! and are discarded.

pub mod protocol;

pub use protocol::{DEFAULT_MOTOR_PWM, QUALITY_SHIFT};

use crate::core::driver::ScannerDriver;
use crate::core::types::{DeviceInfo, HealthInfo, RawSample};
use crate::error::{Error, Result};
use crate::transport::{Channel, Transport};
use protocol::{
    ANS_TYPE_DEVHEALTH, ANS_TYPE_DEVINFO, ANS_TYPE_MEASUREMENT, CMD_FORCE_SCAN,
    CMD_GET_DEVICE_HEALTH, CMD_GET_DEVICE_INFO, CMD_SCAN, CMD_SET_MOTOR_PWM, CMD_STOP,
    DEVICE_HEALTH_SIZE, DEVICE_INFO_SIZE, MEASUREMENT_NODE_SIZE, RESPONSE_HEADER_SIZE,
    ResponseHeader, SYNC_BYTE, SYNC_BYTE_2,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Per-read timeout handed to the transport
const READ_TIMEOUT_MS: u64 = 50;
/// Upper bound on nodes buffered for one revolution
const MAX_REVOLUTION_NODES: usize = 8192;

/// SLAMTEC scanner driver
pub struct SlamtecDriver {
    transport: Option<Box<dyn Transport>>,
    /// Motor is driven through DTR/PWM only on serial links
    motor_control: bool,
    /// Bound on every blocking exchange
    timeout: Duration,
    rx: VecDeque<u8>,
    scanning: bool,
    /// Set once the first start flag has been seen
    synced: bool,
    revolution: Vec<RawSample>,
}

impl SlamtecDriver {
    /// Create an unconnected driver
    pub fn new(timeout: Duration) -> Self {
        Self {
            transport: None,
            motor_control: false,
            timeout,
            rx: VecDeque::with_capacity(512),
            scanning: false,
            synced: false,
            revolution: Vec::with_capacity(MAX_REVOLUTION_NODES),
        }
    }

    /// Attach an already-open transport
    pub fn with_transport<T: Transport + 'static>(
        transport: T,
        motor_control: bool,
        timeout: Duration,
    ) -> Self {
        let mut driver = Self::new(timeout);
        driver.transport = Some(Box::new(transport));
        driver.motor_control = motor_control;
        driver
    }

    /// Check if a scan is running
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    fn transport(&mut self) -> Result<&mut Box<dyn Transport>> {
        self.transport.as_mut().ok_or(Error::NotConnected)
    }

    fn send_command(&mut self, cmd: u8, payload: &[u8]) -> Result<()> {
        let packet = protocol::encode_request(cmd, payload)?;
        let transport = self.transport()?;
        transport.write(&packet)?;
        transport.flush()?;
        log::trace!("Slamtec: sent command {:#04x} ({} bytes)", cmd, packet.len());
        Ok(())
    }

    /// Read one byte, pulling from the transport as needed
    fn read_byte(&mut self, deadline: Instant) -> Result<u8> {
        if let Some(b) = self.rx.pop_front() {
            return Ok(b);
        }

        let mut chunk = [0u8; 256];
        loop {
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
            let n = self.transport()?.read(&mut chunk)?;
            if n > 0 {
                self.rx.extend(&chunk[..n]);
                break;
            }
        }
        self.rx.pop_front().ok_or(Error::Timeout)
    }

    fn read_exact(&mut self, buf: &mut [u8], deadline: Instant) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte(deadline)?;
        }
        Ok(())
    }

    /// Skip to the next response descriptor and parse it
    fn wait_response_header(&mut self, deadline: Instant) -> Result<ResponseHeader> {
        let mut header = [0u8; RESPONSE_HEADER_SIZE];
        let mut prev = self.read_byte(deadline)?;
        loop {
            let b = self.read_byte(deadline)?;
            if prev == SYNC_BYTE && b == SYNC_BYTE_2 {
                break;
            }
            prev = b;
        }
        header[0] = SYNC_BYTE;
        header[1] = SYNC_BYTE_2;
        self.read_exact(&mut header[2..], deadline)?;
        ResponseHeader::parse(&header)
    }

    /// Send a command and read its single-response payload
    fn query(&mut self, cmd: u8, answer_type: u8, size: usize) -> Result<Vec<u8>> {
        if self.scanning {
            return Err(Error::Other(
                "device query not possible while scanning".to_string(),
            ));
        }
        self.rx.clear();
        self.send_command(cmd, &[])?;

        let deadline = Instant::now() + self.timeout;
        let header = self.wait_response_header(deadline)?;
        header.expect(answer_type, size)?;

        let mut payload = vec![0u8; header.size as usize];
        self.read_exact(&mut payload, deadline)?;
        Ok(payload)
    }

    /// Read the next well-formed measurement node, resynchronising byte by byte
    fn read_node(&mut self, deadline: Instant) -> Result<RawSample> {
        let mut node = [0u8; MEASUREMENT_NODE_SIZE];
        self.read_exact(&mut node, deadline)?;
        loop {
            if let Some(sample) = protocol::parse_measurement_node(&node) {
                return Ok(sample);
            }
            node.rotate_left(1);
            node[MEASUREMENT_NODE_SIZE - 1] = self.read_byte(deadline)?;
        }
    }
}

impl ScannerDriver for SlamtecDriver {
    fn connect(&mut self, channel: &Channel) -> Result<()> {
        self.disconnect();

        let transport = channel.open(Duration::from_millis(READ_TIMEOUT_MS))?;
        self.transport = Some(transport);
        self.motor_control = channel.is_serial();
        log::info!("Slamtec: connected via {}", channel);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.transport.is_none() {
            return;
        }
        if self.scanning {
            if let Err(e) = self.stop() {
                log::debug!("Slamtec: stop during disconnect failed: {}", e);
            }
        }
        self.transport = None;
        self.rx.clear();
        log::debug!("Slamtec: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    fn device_info(&mut self) -> Result<DeviceInfo> {
        let payload = self.query(CMD_GET_DEVICE_INFO, ANS_TYPE_DEVINFO, DEVICE_INFO_SIZE)?;
        protocol::parse_device_info(&payload)
    }

    fn health(&mut self) -> Result<HealthInfo> {
        let payload = self.query(
            CMD_GET_DEVICE_HEALTH,
            ANS_TYPE_DEVHEALTH,
            DEVICE_HEALTH_SIZE,
        )?;
        protocol::parse_health(&payload)
    }

    fn set_motor_speed(&mut self, speed: Option<u16>) -> Result<()> {
        if !self.motor_control {
            return Err(Error::NotSupported(
                "motor control requires a serial link".to_string(),
            ));
        }
        let pwm = speed.unwrap_or(DEFAULT_MOTOR_PWM);

        // A-series adapters start the motor when DTR is cleared
        self.transport()?.set_dtr(pwm == 0)?;
        self.send_command(CMD_SET_MOTOR_PWM, &pwm.to_le_bytes())?;
        log::debug!("Slamtec: motor PWM set to {}", pwm);
        Ok(())
    }

    fn start_scan(&mut self, force: bool, use_typical: bool) -> Result<()> {
        if self.scanning {
            self.stop()?;
        }
        // Standard mode is the only mode spoken here; typical-mode selection
        // resolves to it on every supported model
        log::debug!(
            "Slamtec: starting scan (force={}, typical={})",
            force,
            use_typical
        );

        self.rx.clear();
        let cmd = if force { CMD_FORCE_SCAN } else { CMD_SCAN };
        self.send_command(cmd, &[])?;

        let deadline = Instant::now() + self.timeout;
        let header = self.wait_response_header(deadline)?;
        header.expect(ANS_TYPE_MEASUREMENT, MEASUREMENT_NODE_SIZE)?;

        self.scanning = true;
        self.synced = false;
        self.revolution.clear();
        log::info!("Slamtec: scan started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.scanning = false;
        self.synced = false;
        self.revolution.clear();
        self.send_command(CMD_STOP, &[])?;
        self.rx.clear();
        log::info!("Slamtec: scan stopped");
        Ok(())
    }

    fn grab_scan_buffer(&mut self, buffer: &mut [RawSample]) -> Result<usize> {
        if !self.scanning {
            return Err(Error::Acquire("scan not started".to_string()));
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let sample = self.read_node(deadline)?;

            if sample.is_start() {
                if self.synced && !self.revolution.is_empty() {
                    let count = self.revolution.len().min(buffer.len());
                    buffer[..count].copy_from_slice(&self.revolution[..count]);
                    self.revolution.clear();
                    self.revolution.push(sample);
                    log::trace!("Slamtec: revolution complete ({} nodes)", count);
                    return Ok(count);
                }
                self.synced = true;
                self.revolution.clear();
                self.revolution.push(sample);
            } else if self.synced && self.revolution.len() < MAX_REVOLUTION_NODES {
                self.revolution.push(sample);
            }
        }
    }
}

impl Drop for SlamtecDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}
