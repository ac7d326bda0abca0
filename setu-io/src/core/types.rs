//! Core data types for scanner identity, health and measurements.
//!
//! - [`RawSample`]: one quantized measurement as delivered by the driver
//! - [`EngineeringSample`]: the same measurement in millimeters and degrees
//! - [`DeviceInfo`] / [`HealthInfo`]: read once per session after connect

use std::fmt;

/// One quantized measurement node
///
/// Fixed-point layout used by SLAMTEC "HQ" nodes: distance in quarter
/// millimeters, angle in 1/16384 of 90 degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    /// Angle, `degrees * 16384 / 90`
    pub angle_z_q14: u16,
    /// Distance, `millimeters * 4`
    pub dist_mm_q2: u32,
    /// Signal quality, scaled by the device quality shift
    pub quality: u8,
    /// Bit 0 set on the first node of a revolution
    pub flag: u8,
}

impl RawSample {
    pub fn new(angle_z_q14: u16, dist_mm_q2: u32, quality: u8) -> Self {
        Self {
            angle_z_q14,
            dist_mm_q2,
            quality,
            flag: 0,
        }
    }

    /// True if this node starts a new revolution
    #[inline]
    pub fn is_start(&self) -> bool {
        self.flag & 0x01 != 0
    }

    /// Distance in millimeters
    #[inline]
    pub fn distance_mm(&self) -> f32 {
        self.dist_mm_q2 as f32 / 4.0
    }

    /// Angle in degrees, always in [0, 360)
    #[inline]
    pub fn angle_deg(&self) -> f32 {
        (self.angle_z_q14 as f32 * 90.0) / 16384.0
    }

    /// Convert to engineering units
    pub fn to_engineering(&self, quality_shift: u8) -> EngineeringSample {
        EngineeringSample {
            distance: self.distance_mm(),
            angle: self.angle_deg(),
            quality: self.quality >> quality_shift,
        }
    }
}

/// Measurement in engineering units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineeringSample {
    /// Distance in millimeters
    pub distance: f32,
    /// Angle in degrees (0-360)
    pub angle: f32,
    /// Signal quality (0-255)
    pub quality: u8,
}

/// Device identity returned by the info query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: u8,
    /// Major version in the high byte, minor in the low byte
    pub firmware_version: u16,
    pub hardware_version: u8,
    pub serial_number: [u8; 16],
}

impl DeviceInfo {
    pub fn firmware_major(&self) -> u8 {
        (self.firmware_version >> 8) as u8
    }

    pub fn firmware_minor(&self) -> u8 {
        (self.firmware_version & 0xFF) as u8
    }

    /// Serial number as upper-case hex
    pub fn serial_hex(&self) -> String {
        self.serial_number
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect()
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S/N {} firmware {}.{:02} hardware rev {}",
            self.serial_hex(),
            self.firmware_major(),
            self.firmware_minor(),
            self.hardware_version
        )
    }
}

/// Coarse operability signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Good,
    Warning,
    Error,
}

impl From<u8> for HealthStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => HealthStatus::Good,
            1 => HealthStatus::Warning,
            _ => HealthStatus::Error,
        }
    }
}

/// Health query result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub error_code: u16,
}

impl HealthInfo {
    pub fn good() -> Self {
        Self {
            status: HealthStatus::Good,
            error_code: 0,
        }
    }
}
