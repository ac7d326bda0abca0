//! SLAMTEC scanner protocol implementation
//!
//! Request:  [0xA5] [CMD] ([SIZE] [PAYLOAD...] [XOR checksum])
//! Response: [0xA5] [0x5A] [size:30 | mode:2 (u32 LE)] [TYPE] [DATA...]

use crate::core::types::{DeviceInfo, HealthInfo, HealthStatus, RawSample};
use crate::error::{Error, Result};

// Sync bytes
pub const SYNC_BYTE: u8 = 0xA5;
pub const SYNC_BYTE_2: u8 = 0x5A;

// Command IDs
pub const CMD_STOP: u8 = 0x25;
pub const CMD_SCAN: u8 = 0x20;
pub const CMD_FORCE_SCAN: u8 = 0x21;
pub const CMD_RESET: u8 = 0x40;
pub const CMD_GET_DEVICE_INFO: u8 = 0x50;
pub const CMD_GET_DEVICE_HEALTH: u8 = 0x52;
pub const CMD_SET_MOTOR_PWM: u8 = 0xF0;

// Answer types
pub const ANS_TYPE_DEVINFO: u8 = 0x04;
pub const ANS_TYPE_DEVHEALTH: u8 = 0x06;
pub const ANS_TYPE_MEASUREMENT: u8 = 0x81;

// Packet sizes
pub const RESPONSE_HEADER_SIZE: usize = 7;
pub const DEVICE_INFO_SIZE: usize = 20;
pub const DEVICE_HEALTH_SIZE: usize = 3;
pub const MEASUREMENT_NODE_SIZE: usize = 5;

/// Quality bits sit above the two sync bits of the first node byte
pub const QUALITY_SHIFT: u8 = 2;
/// Motor PWM used when no explicit speed is requested
pub const DEFAULT_MOTOR_PWM: u16 = 660;

/// Encode a request packet
pub fn encode_request(cmd: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Ok(vec![SYNC_BYTE, cmd]);
    }
    let size = u8::try_from(payload.len())
        .map_err(|_| Error::InvalidPacket(format!("payload too large: {}", payload.len())))?;

    let mut packet = Vec::with_capacity(payload.len() + 4);
    packet.extend_from_slice(&[SYNC_BYTE, cmd, size]);
    packet.extend_from_slice(payload);
    let checksum = packet.iter().fold(0u8, |acc, b| acc ^ b);
    packet.push(checksum);
    Ok(packet)
}

/// Response descriptor preceding every answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Payload size (single response) or node size (multiple response)
    pub size: u32,
    /// 0 = single response, 1 = multiple response
    pub send_mode: u8,
    pub answer_type: u8,
}

impl ResponseHeader {
    pub fn parse(bytes: &[u8; RESPONSE_HEADER_SIZE]) -> Result<Self> {
        if bytes[0] != SYNC_BYTE || bytes[1] != SYNC_BYTE_2 {
            return Err(Error::InvalidPacket(format!(
                "bad response sync {:#04x} {:#04x}",
                bytes[0], bytes[1]
            )));
        }
        let size_q30 = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        Ok(Self {
            size: size_q30 & 0x3FFF_FFFF,
            send_mode: (size_q30 >> 30) as u8,
            answer_type: bytes[6],
        })
    }

    /// Check answer type and minimum payload size
    pub fn expect(&self, answer_type: u8, min_size: usize) -> Result<()> {
        if self.answer_type != answer_type {
            return Err(Error::InvalidPacket(format!(
                "expected answer {:#04x}, got {:#04x}",
                answer_type, self.answer_type
            )));
        }
        if (self.size as usize) < min_size {
            return Err(Error::InvalidPacket(format!(
                "answer {:#04x} too short: {} < {}",
                answer_type, self.size, min_size
            )));
        }
        Ok(())
    }
}

/// Parse GET_INFO answer payload
///
/// Layout: model(1) firmware(2, LE, major in high byte) hardware(1) serial(16)
pub fn parse_device_info(payload: &[u8]) -> Result<DeviceInfo> {
    if payload.len() < DEVICE_INFO_SIZE {
        return Err(Error::InvalidPacket(format!(
            "device info payload {} bytes",
            payload.len()
        )));
    }
    let mut serial_number = [0u8; 16];
    serial_number.copy_from_slice(&payload[4..20]);
    Ok(DeviceInfo {
        model: payload[0],
        firmware_version: u16::from_le_bytes([payload[1], payload[2]]),
        hardware_version: payload[3],
        serial_number,
    })
}

/// Parse GET_HEALTH answer payload
///
/// Layout: status(1) error_code(2, LE)
pub fn parse_health(payload: &[u8]) -> Result<HealthInfo> {
    if payload.len() < DEVICE_HEALTH_SIZE {
        return Err(Error::InvalidPacket(format!(
            "health payload {} bytes",
            payload.len()
        )));
    }
    Ok(HealthInfo {
        status: HealthStatus::from(payload[0]),
        error_code: u16::from_le_bytes([payload[1], payload[2]]),
    })
}

/// Decode a standard 5-byte measurement node
///
/// Byte 0: start flag (bit 0), inverted start flag (bit 1), quality (bits 2-7)
/// Bytes 1-2: check bit (bit 0) + angle in 1/64 degree (LE)
/// Bytes 3-4: distance in 1/4 mm (LE)
///
/// Returns `None` when the sync or check bits are inconsistent, which means
/// the reader is not aligned on a node boundary.
pub fn parse_measurement_node(node: &[u8; MEASUREMENT_NODE_SIZE]) -> Option<RawSample> {
    let sync = node[0] & 0x01;
    let inverted_sync = (node[0] >> 1) & 0x01;
    if sync ^ inverted_sync != 1 || node[1] & 0x01 != 1 {
        return None;
    }

    let angle_q6 = u16::from_le_bytes([node[1], node[2]]) >> 1;
    let distance_q2 = u16::from_le_bytes([node[3], node[4]]);

    Some(RawSample {
        angle_z_q14: ((u32::from(angle_q6) << 8) / 90) as u16,
        dist_mm_q2: u32::from(distance_q2),
        quality: (node[0] >> QUALITY_SHIFT) << QUALITY_SHIFT,
        flag: sync,
    })
}

/// Encode a measurement node (scanner side, used by tests and simulators)
pub fn encode_measurement_node(
    start: bool,
    quality: u8,
    angle_q6: u16,
    distance_q2: u16,
) -> [u8; MEASUREMENT_NODE_SIZE] {
    let sync: u8 = if start { 0x01 } else { 0x02 };
    let angle = ((angle_q6 << 1) | 0x01).to_le_bytes();
    let distance = distance_q2.to_le_bytes();
    [
        (quality << QUALITY_SHIFT) | sync,
        angle[0],
        angle[1],
        distance[0],
        distance[1],
    ]
}

/// Encode a response descriptor (scanner side, used by tests and simulators)
pub fn encode_response_header(
    size: u32,
    send_mode: u8,
    answer_type: u8,
) -> [u8; RESPONSE_HEADER_SIZE] {
    let size_q30 = (size & 0x3FFF_FFFF) | (u32::from(send_mode) << 30);
    let b = size_q30.to_le_bytes();
    [SYNC_BYTE, SYNC_BYTE_2, b[0], b[1], b[2], b[3], answer_type]
}
