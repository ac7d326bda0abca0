//! SetuIO - lidar scan relay
//!
//! Reads a SLAMTEC-style 2D lidar over a serial port or UDP and republishes
//! every sample as one JSON datagram:
//!
//! ```text
//! lidar ──serial/udp──► ScannerDriver ──► AcquisitionLoop ──► UdpSender ──► network
//! ```
//!
//! - [`session::Session`]: connect with baud fallback, health check, shutdown flag
//! - [`acquisition::AcquisitionLoop`]: grab, reorder by angle, convert, send
//! - [`streaming`]: JSON message format and datagram sender
//! - [`devices`]: SLAMTEC protocol driver (and a scripted mock with the `mock` feature)

pub mod acquisition;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod session;
pub mod streaming;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
