//! Outbound message format
//!
//! One JSON object per sample, fields in fixed order:
//!
//! ```text
//! {"type":"LIDAR","distance":100,"angle":45.5,"quality":47}
//! ```
//!
//! Integral floats are written without a fractional part so that consumers
//! parsing with integer-friendly readers see `100`, not `100.0`.

use crate::core::types::EngineeringSample;
use crate::error::Result;
use serde::{Serialize, Serializer};

/// Message type tag carried by every datagram
pub const MESSAGE_TYPE: &str = "LIDAR";

/// Lidar sample message
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct LidarMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Distance in millimeters
    #[serde(serialize_with = "compact_float")]
    pub distance: f32,
    /// Angle in degrees
    #[serde(serialize_with = "compact_float")]
    pub angle: f32,
    pub quality: u8,
}

impl LidarMessage {
    /// Serialize into `buffer`, replacing its contents
    ///
    /// The buffer is reused across samples so steady-state encoding does not
    /// allocate.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.clear();
        serde_json::to_writer(&mut *buffer, self)?;
        Ok(())
    }

    /// Serialize to a new byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl From<EngineeringSample> for LidarMessage {
    fn from(sample: EngineeringSample) -> Self {
        Self {
            kind: MESSAGE_TYPE,
            distance: sample.distance,
            angle: sample.angle,
            quality: sample.quality,
        }
    }
}

/// Write whole-number floats as integers
fn compact_float<S: Serializer>(
    value: &f32,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    // Beyond 2^24 every f32 is integral; the range check keeps the cast exact
    if value.fract() == 0.0 && value.abs() < 1e15 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f32(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RawSample;

    #[test]
    fn test_reference_message() {
        let msg = LidarMessage::from(RawSample::new(8192, 400, 0x40).to_engineering(6));
        assert_eq!(
            String::from_utf8(msg.to_bytes().unwrap()).unwrap(),
            r#"{"type":"LIDAR","distance":100,"angle":45,"quality":1}"#
        );
    }

    #[test]
    fn test_fractional_values() {
        let msg = LidarMessage::from(EngineeringSample {
            distance: 250.25,
            angle: 0.5,
            quality: 47,
        });
        assert_eq!(
            String::from_utf8(msg.to_bytes().unwrap()).unwrap(),
            r#"{"type":"LIDAR","distance":250.25,"angle":0.5,"quality":47}"#
        );
    }

    #[test]
    fn test_encode_into_reuses_buffer() {
        let mut buffer = Vec::with_capacity(128);
        let first = LidarMessage::from(EngineeringSample {
            distance: 1234.75,
            angle: 359.5,
            quality: 255,
        });
        first.encode_into(&mut buffer).unwrap();
        let capacity = buffer.capacity();

        let second = LidarMessage::from(EngineeringSample {
            distance: 0.0,
            angle: 0.0,
            quality: 0,
        });
        second.encode_into(&mut buffer).unwrap();
        assert_eq!(
            std::str::from_utf8(&buffer).unwrap(),
            r#"{"type":"LIDAR","distance":0,"angle":0,"quality":0}"#
        );
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn test_message_parses_back() {
        let msg = LidarMessage::from(EngineeringSample {
            distance: 812.5,
            angle: 271.40625,
            quality: 12,
        });
        let value: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(value["type"], "LIDAR");
        assert_eq!(value["distance"].as_f64(), Some(812.5));
        assert_eq!(value["angle"].as_f64(), Some(271.40625));
        assert_eq!(value["quality"].as_u64(), Some(12));
    }
}
