//! ScannerDriver trait definition

use crate::core::types::{DeviceInfo, HealthInfo, RawSample};
use crate::error::Result;
use crate::transport::Channel;

/// Capability surface the session and acquisition loop need from a scanner
pub trait ScannerDriver: Send {
    /// Open the given channel and attach to the scanner behind it
    ///
    /// Connecting while already connected drops the previous link first.
    fn connect(&mut self, channel: &Channel) -> Result<()>;

    /// Release the link (idempotent)
    fn disconnect(&mut self);

    /// Check whether a channel is attached
    fn is_connected(&self) -> bool;

    /// Query model, firmware, hardware revision and serial number
    fn device_info(&mut self) -> Result<DeviceInfo>;

    /// Query the health status
    fn health(&mut self) -> Result<HealthInfo>;

    /// Set motor speed; `None` selects the default running speed, `Some(0)` stops
    ///
    /// Links without motor control return [`crate::Error::NotSupported`].
    fn set_motor_speed(&mut self, speed: Option<u16>) -> Result<()>;

    /// Start continuous scanning
    fn start_scan(&mut self, force: bool, use_typical: bool) -> Result<()>;

    /// Stop scanning
    fn stop(&mut self) -> Result<()>;

    /// Block until a complete revolution is available and copy it into `buffer`
    ///
    /// Returns the number of samples written, at most `buffer.len()`.
    fn grab_scan_buffer(&mut self, buffer: &mut [RawSample]) -> Result<usize>;

    /// Sort samples into ascending angle order
    ///
    /// Stable, so reordering an ordered buffer leaves it unchanged.
    fn ascend_scan_data(&self, buffer: &mut [RawSample]) {
        buffer.sort_by_key(|s| s.angle_z_q14);
    }
}
