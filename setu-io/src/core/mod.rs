//! Core abstractions for scanner drivers.
//!
//! - [`driver::ScannerDriver`]: Trait to implement for new scanner hardware
//! - [`types`]: Samples, device identity and health

pub mod driver;
pub mod types;
