//! UDP streaming module for SetuIO

pub mod messages;
pub mod udp_sender;

pub use messages::{LidarMessage, MESSAGE_TYPE};
pub use udp_sender::UdpSender;
