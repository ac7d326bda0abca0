//! Session bootstrap: connect, validate, scan, release
//!
//! A [`Session`] only exists for a connected scanner that answered the
//! identity query and did not report an internal error. The driver is owned
//! by the session and disconnected exactly once when the session is dropped,
//! whichever path led there.

use crate::acquisition::{AcquisitionLoop, LoopStats};
use crate::config::Config;
use crate::core::driver::ScannerDriver;
use crate::core::types::{DeviceInfo, HealthInfo, HealthStatus};
use crate::error::{Error, Result};
use crate::streaming::UdpSender;
use crate::transport::{Channel, TransportSelector};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Connected and validated scanner session
pub struct Session {
    driver: Box<dyn ScannerDriver>,
    channel: Channel,
    device_info: DeviceInfo,
    health: HealthInfo,
    config: Config,
    /// Cleared by the interrupt handler, polled by the acquisition loop
    running: Arc<AtomicBool>,
}

impl Session {
    /// Connect to the scanner and check its identity and health
    ///
    /// On failure the driver is disconnected before the error is returned.
    pub fn open(
        mut driver: Box<dyn ScannerDriver>,
        selector: &TransportSelector,
        config: &Config,
    ) -> Result<Self> {
        let (channel, device_info) =
            match connect_with_fallback(driver.as_mut(), selector, &config.serial.baud_rates) {
                Ok(connected) => connected,
                Err(e) => {
                    driver.disconnect();
                    return Err(e);
                }
            };

        log::info!("Lidar connected via {}", channel);
        log::info!("Lidar S/N: {}", device_info.serial_hex());
        log::info!(
            "Firmware Ver: {}.{:02}",
            device_info.firmware_major(),
            device_info.firmware_minor()
        );
        log::info!("Hardware Rev: {}", device_info.hardware_version);

        let health = match check_health(driver.as_mut()) {
            Ok(health) => health,
            Err(e) => {
                driver.disconnect();
                return Err(e);
            }
        };

        Ok(Self {
            driver,
            channel,
            device_info,
            health,
            config: config.clone(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Channel the scanner answered on
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn health(&self) -> HealthInfo {
        self.health
    }

    /// Shared running flag; clearing it ends [`Session::run`] after the current grab
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Route Ctrl-C to the running flag
    ///
    /// The handler only clears the flag; the acquisition loop does the rest.
    /// Can be installed once per process.
    pub fn install_shutdown_handler(&self) -> Result<()> {
        let running = Arc::clone(&self.running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))
    }

    /// Start the motor and scan, stream until stopped, then stop the motor
    pub fn run(&mut self) -> Result<LoopStats> {
        let mut sender = UdpSender::from_config(&self.config.sender);
        sender.init()?;

        let serial = self.channel.is_serial();
        if serial {
            if let Err(e) = self.driver.set_motor_speed(None) {
                log::warn!("Failed to start motor: {}", e);
            }
        }

        if let Err(e) = self.driver.start_scan(false, true) {
            log::error!("Failed to start scan: {}", e);
            if serial {
                self.stop_motor();
            }
            return Err(e);
        }
        log::info!(
            "Streaming samples to {}:{}. Press Ctrl-C to stop.",
            self.config.sender.address,
            self.config.sender.port
        );

        let stats = AcquisitionLoop::new(
            self.driver.as_mut(),
            &sender,
            Arc::clone(&self.running),
            &self.config.scan,
        )
        .run();

        if serial {
            self.stop_motor();
        }
        sender.close();
        Ok(stats)
    }

    fn stop_motor(&mut self) {
        if let Err(e) = self.driver.set_motor_speed(Some(0)) {
            log::warn!("Failed to stop motor: {}", e);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        log::debug!("Session closing, releasing lidar");
        self.driver.disconnect();
    }
}

/// Try each candidate channel in order; first channel that answers the identity query wins
///
/// A channel that connects but does not answer is disconnected before the
/// next one is tried.
fn connect_with_fallback(
    driver: &mut dyn ScannerDriver,
    selector: &TransportSelector,
    fallback_bauds: &[u32],
) -> Result<(Channel, DeviceInfo)> {
    let candidates = selector.candidates(fallback_bauds);
    let mut last_error = None;

    for channel in &candidates {
        log::info!("Connecting to lidar via {}...", channel);
        if let Err(e) = driver.connect(channel) {
            log::warn!("Connect via {} failed: {}", channel, e);
            driver.disconnect();
            last_error = Some(Error::Connect(format!("{} ({})", channel, e)));
            continue;
        }

        match driver.device_info() {
            Ok(info) => return Ok((channel.clone(), info)),
            Err(e) => {
                log::warn!("No device answer via {}: {}", channel, e);
                driver.disconnect();
                last_error = Some(Error::DeviceQuery(format!("{} ({})", channel, e)));
            }
        }
    }

    match last_error {
        Some(e) if candidates.len() == 1 => Err(e),
        _ => Err(Error::Connect(selector.to_string())),
    }
}

/// Query health; `Error` is fatal, `Warning` is logged and accepted
fn check_health(driver: &mut dyn ScannerDriver) -> Result<HealthInfo> {
    let health = driver
        .health()
        .map_err(|e| Error::DeviceQuery(format!("cannot retrieve health code: {}", e)))?;

    log::info!("Lidar health status: {:?}", health.status);
    match health.status {
        HealthStatus::Good => {}
        HealthStatus::Warning => {
            log::warn!("Lidar reports warning (code {:#06x})", health.error_code);
        }
        HealthStatus::Error => return Err(Error::Health(health.error_code)),
    }
    Ok(health)
}
