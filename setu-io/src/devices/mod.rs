//! Scanner driver implementations

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod slamtec;

use crate::config::Config;
use crate::core::driver::ScannerDriver;
use crate::error::{Error, Result};
use slamtec::SlamtecDriver;
use std::time::Duration;

/// Create a scanner driver based on configuration
pub fn create_device(config: &Config) -> Result<Box<dyn ScannerDriver>> {
    match config.device.driver.as_str() {
        "slamtec" => {
            let timeout = Duration::from_millis(config.device.timeout_ms);
            Ok(Box::new(SlamtecDriver::new(timeout)))
        }
        #[cfg(any(test, feature = "mock"))]
        "mock" => Ok(Box::new(mock::MockScanner::simulated())),
        _ => Err(Error::UnknownDevice(config.device.driver.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_slamtec() {
        let driver = create_device(&Config::default()).unwrap();
        assert!(!driver.is_connected());
    }

    #[test]
    fn test_unknown_device() {
        let mut config = Config::default();
        config.device.driver = "delta2d".to_string();
        let err = create_device(&config).err().unwrap();
        assert!(matches!(err, Error::UnknownDevice(ref name) if name == "delta2d"));
        assert_eq!(err.exit_code(), crate::error::exit_code::DRIVER_ALLOCATION);
    }
}
