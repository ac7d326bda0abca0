//! Acquisition loop: grab, reorder, convert, send
//!
//! ```text
//! ┌──────────┐  cancel   ┌──────────┐  stop + settle  ┌─────────┐
//! │ Scanning │ ────────► │ Stopping │ ──────────────► │ Stopped │
//! └──────────┘           └──────────┘                 └─────────┘
//! ```
//!
//! The running flag is only checked between grabs: a buffer that has already
//! been retrieved is always sent in full. A grab blocks for at most the
//! driver timeout, which bounds the shutdown latency.
//!
//! Acquisition and send failures are transient. They are counted and logged
//! and the loop carries on with the next grab or the next sample.

use crate::config::ScanConfig;
use crate::core::driver::ScannerDriver;
use crate::core::types::RawSample;
use crate::streaming::{LidarMessage, UdpSender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Typical JSON message length is ~60 bytes
const PAYLOAD_CAPACITY: usize = 128;

/// Counters reported while running and on exit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Successful grabs
    pub scans: u64,
    /// Datagrams handed to the socket
    pub samples_sent: u64,
    pub acquire_errors: u64,
    pub send_errors: u64,
}

/// Scan-and-send loop over a connected, scanning driver
pub struct AcquisitionLoop<'a> {
    driver: &'a mut dyn ScannerDriver,
    sender: &'a UdpSender,
    running: Arc<AtomicBool>,
    quality_shift: u8,
    settle_delay: Duration,
    stats_interval: u64,
    /// Sized once, reused by every grab
    buffer: Vec<RawSample>,
    payload: Vec<u8>,
    stats: LoopStats,
}

impl<'a> AcquisitionLoop<'a> {
    pub fn new(
        driver: &'a mut dyn ScannerDriver,
        sender: &'a UdpSender,
        running: Arc<AtomicBool>,
        config: &ScanConfig,
    ) -> Self {
        Self {
            driver,
            sender,
            running,
            quality_shift: config.quality_shift,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            stats_interval: config.stats_interval,
            buffer: vec![RawSample::default(); config.capacity],
            payload: Vec::with_capacity(PAYLOAD_CAPACITY),
            stats: LoopStats::default(),
        }
    }

    /// Run until the running flag is cleared, then stop the scan
    pub fn run(mut self) -> LoopStats {
        log::info!(
            "Acquisition loop started (capacity {} samples)",
            self.buffer.len()
        );

        while self.running.load(Ordering::SeqCst) {
            self.step();
        }

        log::info!("Shutdown requested, stopping scan...");
        if let Err(e) = self.driver.stop() {
            log::warn!("Failed to stop scan: {}", e);
        }
        // Give the motor time to spin down before the caller issues motor commands
        std::thread::sleep(self.settle_delay);

        log::info!(
            "Acquisition loop stopped: scans={} sent={} acquire_errors={} send_errors={}",
            self.stats.scans,
            self.stats.samples_sent,
            self.stats.acquire_errors,
            self.stats.send_errors
        );
        self.stats
    }

    /// One grab and the sends that follow it
    fn step(&mut self) {
        let count = match self.driver.grab_scan_buffer(&mut self.buffer) {
            Ok(count) => count,
            Err(e) => {
                self.stats.acquire_errors += 1;
                if e.is_transient() {
                    log::warn!("Scan grab failed: {}", e);
                } else {
                    log::error!("Scan grab failed: {}", e);
                }
                return;
            }
        };

        let samples = &mut self.buffer[..count];
        self.driver.ascend_scan_data(samples);

        for raw in samples.iter() {
            let message = LidarMessage::from(raw.to_engineering(self.quality_shift));
            if let Err(e) = message.encode_into(&mut self.payload) {
                self.stats.send_errors += 1;
                log::warn!("Failed to encode sample: {}", e);
                continue;
            }
            match self.sender.send(&self.payload) {
                Ok(()) => self.stats.samples_sent += 1,
                Err(e) => {
                    self.stats.send_errors += 1;
                    log::warn!("Failed to send sample: {}", e);
                }
            }
        }

        self.stats.scans += 1;
        log::trace!("Scan {}: {} samples", self.stats.scans, count);

        if self.stats_interval > 0 && self.stats.scans % self.stats_interval == 0 {
            log::info!(
                "Lidar: Scans={} Sent={} AcquireErrors={} SendErrors={}",
                self.stats.scans,
                self.stats.samples_sent,
                self.stats.acquire_errors,
                self.stats.send_errors
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock::{MockCall, MockScanner};
    use crate::transport::Channel;
    use std::net::UdpSocket;

    fn scan_config() -> ScanConfig {
        ScanConfig {
            capacity: 16,
            settle_delay_ms: 0,
            quality_shift: 6,
            stats_interval: 0,
        }
    }

    fn receiver() -> (UdpSocket, UdpSender) {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        let mut sender = UdpSender::new("127.0.0.1", rx.local_addr().unwrap().port());
        sender.init().unwrap();
        (rx, sender)
    }

    fn scanning_mock() -> MockScanner {
        let mock = MockScanner::new();
        let mut drv = mock.clone();
        drv.connect(&Channel::Serial {
            path: "/dev/ttyUSB0".to_string(),
            baud: 115200,
        })
        .unwrap();
        drv.start_scan(false, true).unwrap();
        mock
    }

    fn recv_json(rx: &UdpSocket) -> serde_json::Value {
        let mut buf = [0u8; 256];
        let n = rx.recv(&mut buf).unwrap();
        serde_json::from_slice(&buf[..n]).unwrap()
    }

    #[test]
    fn test_sends_reordered_samples() {
        let mock = scanning_mock();
        let running = Arc::new(AtomicBool::new(true));
        mock.push_scan(vec![
            RawSample::new(16384, 800, 0x80),
            RawSample::new(8192, 400, 0x40),
        ]);
        mock.cancel_on_grab(1, Arc::clone(&running));

        let (rx, sender) = receiver();
        let mut drv = mock.clone();
        let stats = AcquisitionLoop::new(&mut drv, &sender, running, &scan_config()).run();

        assert_eq!(stats.scans, 1);
        assert_eq!(stats.samples_sent, 2);

        let first = recv_json(&rx);
        assert_eq!(first["angle"], 45);
        assert_eq!(first["distance"], 100);
        assert_eq!(first["quality"], 1);
        let second = recv_json(&rx);
        assert_eq!(second["angle"], 90);
        assert_eq!(second["distance"], 200);
    }

    #[test]
    fn test_cancel_during_grab_stops_after_that_iteration() {
        let mock = scanning_mock();
        let running = Arc::new(AtomicBool::new(true));
        for _ in 0..5 {
            mock.push_scan(vec![RawSample::new(0, 4, 0)]);
        }
        mock.cancel_on_grab(2, Arc::clone(&running));

        let (_rx, sender) = receiver();
        let mut drv = mock.clone();
        let stats = AcquisitionLoop::new(&mut drv, &sender, running, &scan_config()).run();

        // The buffer retrieved by the interrupted grab is still sent
        assert_eq!(stats.scans, 2);
        assert_eq!(stats.samples_sent, 2);
        assert_eq!(mock.count(&MockCall::Grab), 2);
        assert_eq!(mock.calls().last(), Some(&MockCall::Stop));
    }

    #[test]
    fn test_acquire_errors_are_transient() {
        let mock = scanning_mock();
        let running = Arc::new(AtomicBool::new(true));
        mock.push_failure("descriptor timeout");
        mock.push_failure("checksum");
        mock.push_scan(vec![RawSample::new(0, 4, 0); 3]);
        mock.cancel_on_grab(3, Arc::clone(&running));

        let (_rx, sender) = receiver();
        let mut drv = mock.clone();
        let stats = AcquisitionLoop::new(&mut drv, &sender, running, &scan_config()).run();

        assert_eq!(stats.acquire_errors, 2);
        assert_eq!(stats.scans, 1);
        assert_eq!(stats.samples_sent, 3);
    }

    #[test]
    fn test_send_errors_do_not_interrupt_buffer() {
        let mock = scanning_mock();
        let running = Arc::new(AtomicBool::new(true));
        mock.push_scan(vec![RawSample::new(0, 4, 0); 4]);
        mock.cancel_on_grab(1, Arc::clone(&running));

        // Never initialized: every send fails
        let sender = UdpSender::new("127.0.0.1", 7000);
        let mut drv = mock.clone();
        let stats = AcquisitionLoop::new(&mut drv, &sender, running, &scan_config()).run();

        assert_eq!(stats.scans, 1);
        assert_eq!(stats.send_errors, 4);
        assert_eq!(stats.samples_sent, 0);
    }

    #[test]
    fn test_capacity_bounds_grab() {
        let mock = scanning_mock();
        let running = Arc::new(AtomicBool::new(true));
        mock.push_scan(vec![RawSample::new(0, 4, 0); 40]);
        mock.cancel_on_grab(1, Arc::clone(&running));

        let (_rx, sender) = receiver();
        let mut drv = mock.clone();
        let stats = AcquisitionLoop::new(&mut drv, &sender, running, &scan_config()).run();
        assert_eq!(stats.samples_sent, 16);
    }

    #[test]
    fn test_cleared_flag_skips_grabs() {
        let mock = scanning_mock();
        let running = Arc::new(AtomicBool::new(false));

        let (_rx, sender) = receiver();
        let mut drv = mock.clone();
        let stats = AcquisitionLoop::new(&mut drv, &sender, running, &scan_config()).run();

        assert_eq!(stats, LoopStats::default());
        assert_eq!(mock.count(&MockCall::Grab), 0);
        assert_eq!(mock.count(&MockCall::Stop), 1);
    }
}
