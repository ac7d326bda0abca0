//! Application orchestration for the SetuIO relay
//!
//! Allocates the configured scanner driver, brings up the session and runs it
//! until Ctrl-C. Every failure is returned as an [`Error`] whose
//! [`Error::exit_code`] becomes the process status.

use crate::acquisition::LoopStats;
use crate::config::Config;
use crate::devices::create_device;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::TransportSelector;
use log::info;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Relay application: one scanner, one destination
pub struct SetuApp {
    session: Session,
}

impl SetuApp {
    /// Create the driver and open a validated session on `selector`
    pub fn new(config: &Config, selector: &TransportSelector) -> Result<Self> {
        info!("Initializing SetuIO ({} driver)", config.device.driver);

        let driver = create_device(config)?;
        let session = Session::open(driver, selector, config)?;

        info!(
            "✓ Lidar ready on {} ({})",
            session.channel(),
            session.device_info()
        );
        Ok(Self { session })
    }

    /// Route Ctrl-C to a graceful stop
    pub fn install_shutdown_handler(&self) -> Result<()> {
        self.session.install_shutdown_handler()
    }

    /// Flag that stops the relay when cleared
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.session.shutdown_handle()
    }

    /// Stream until stopped
    pub fn run(&mut self) -> Result<LoopStats> {
        let stats = self.session.run()?;
        info!(
            "Relayed {} samples from {} scans ({} acquire errors, {} send errors)",
            stats.samples_sent, stats.scans, stats.acquire_errors, stats.send_errors
        );
        Ok(stats)
    }
}

/// Full relay lifecycle, returning the process exit code
pub fn run(config: &Config, selector: &TransportSelector) -> i32 {
    let result = SetuApp::new(config, selector).and_then(|mut app| {
        app.install_shutdown_handler()?;
        app.run()
    });

    match result {
        Ok(_) => {
            info!("SetuIO stopped");
            crate::error::exit_code::SUCCESS
        }
        Err(e) => report(&e),
    }
}

fn report(error: &Error) -> i32 {
    log::error!("{}", error);
    if let Error::Health(_) = error {
        log::error!("Lidar must be rebooted before it can scan again");
    }
    error.exit_code()
}
