//! Scripted scanner driver for hardware-free runs and tests
//!
//! Clones share state, so a test can hand one clone to the session and keep
//! another to script behaviour and inspect the call log afterwards.

use crate::core::driver::ScannerDriver;
use crate::core::types::{DeviceInfo, HealthInfo, RawSample};
use crate::error::{Error, Result};
use crate::transport::Channel;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Nodes per synthetic revolution
const SYNTHETIC_NODES: u16 = 360;
/// Synthetic revolution period (10 Hz)
const SYNTHETIC_PERIOD_MS: u64 = 100;

/// Driver calls recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect(Channel),
    Disconnect,
    DeviceInfo,
    Health,
    SetMotorSpeed(Option<u16>),
    StartScan,
    Stop,
    Grab,
}

enum ScriptedGrab {
    Samples(Vec<RawSample>),
    Failure(String),
}

struct MockScannerState {
    /// Baud rates accepted by connect (`None` = any)
    accepted_bauds: Option<Vec<u32>>,
    /// Baud rates at which the device answers queries (`None` = any)
    responsive_bauds: Option<Vec<u32>>,
    accept_udp: bool,
    /// `start_scan` answers with a timeout
    fail_start_scan: bool,
    device_info: DeviceInfo,
    health: Option<HealthInfo>,
    scans: VecDeque<ScriptedGrab>,
    /// Generate revolutions when the script is exhausted
    synthetic: bool,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
    grabs: usize,
    connected: Option<Channel>,
    scanning: bool,
    calls: Vec<MockCall>,
}

/// Mock scanner driver
#[derive(Clone)]
pub struct MockScanner {
    state: Arc<Mutex<MockScannerState>>,
}

impl MockScanner {
    /// Create a mock that accepts every channel and reports good health
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockScannerState {
                accepted_bauds: None,
                responsive_bauds: None,
                accept_udp: true,
                fail_start_scan: false,
                device_info: DeviceInfo {
                    model: 0x18,
                    firmware_version: 0x011D,
                    hardware_version: 7,
                    serial_number: *b"SETU-IO-MOCK-001",
                },
                health: Some(HealthInfo::good()),
                scans: VecDeque::new(),
                synthetic: false,
                cancel_after: None,
                grabs: 0,
                connected: None,
                scanning: false,
                calls: Vec::new(),
            })),
        }
    }

    /// Mock that produces a synthetic circular room forever
    pub fn simulated() -> Self {
        let mock = Self::new();
        mock.state.lock().synthetic = true;
        mock
    }

    /// Only these baud rates connect
    pub fn accept_bauds(self, bauds: &[u32]) -> Self {
        self.state.lock().accepted_bauds = Some(bauds.to_vec());
        self
    }

    /// Connect succeeds at any rate, but only these rates answer queries
    pub fn respond_at_bauds(self, bauds: &[u32]) -> Self {
        self.state.lock().responsive_bauds = Some(bauds.to_vec());
        self
    }

    /// Reject network channels
    pub fn reject_udp(self) -> Self {
        self.state.lock().accept_udp = false;
        self
    }

    /// Scanner never acknowledges the scan request
    pub fn fail_start_scan(self) -> Self {
        self.state.lock().fail_start_scan = true;
        self
    }

    /// Health answer; `None` makes the query fail
    pub fn with_health(self, health: Option<HealthInfo>) -> Self {
        self.state.lock().health = health;
        self
    }

    /// Queue one successful grab
    pub fn push_scan(&self, samples: Vec<RawSample>) {
        self.state
            .lock()
            .scans
            .push_back(ScriptedGrab::Samples(samples));
    }

    /// Queue one failing grab
    pub fn push_failure(&self, message: &str) {
        self.state
            .lock()
            .scans
            .push_back(ScriptedGrab::Failure(message.to_string()));
    }

    /// Clear `running` while the n-th grab (1-based) is blocked
    pub fn cancel_on_grab(&self, n: usize, running: Arc<AtomicBool>) {
        self.state.lock().cancel_after = Some((n, running));
    }

    /// Recorded calls
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Number of recorded calls matching `call`
    pub fn count(&self, call: &MockCall) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Channel currently connected
    pub fn connected_channel(&self) -> Option<Channel> {
        self.state.lock().connected.clone()
    }

    fn synthetic_revolution() -> Vec<RawSample> {
        (0..SYNTHETIC_NODES)
            .map(|deg| {
                let mut sample = RawSample::new(
                    ((u32::from(deg) << 14) / 90) as u16,
                    // 2 m radius room with a gentle ripple
                    8000 + u32::from(deg % 30) * 4,
                    47 << crate::devices::slamtec::QUALITY_SHIFT,
                );
                sample.flag = u8::from(deg == 0);
                sample
            })
            .collect()
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerDriver for MockScanner {
    fn connect(&mut self, channel: &Channel) -> Result<()> {
        self.disconnect();

        let mut state = self.state.lock();
        state.calls.push(MockCall::Connect(channel.clone()));
        let accepted = match channel {
            Channel::Serial { baud, .. } => state
                .accepted_bauds
                .as_ref()
                .is_none_or(|bauds| bauds.contains(baud)),
            Channel::Udp { .. } => state.accept_udp,
        };
        if !accepted {
            return Err(Error::Connect(channel.to_string()));
        }
        state.connected = Some(channel.clone());
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state.lock();
        if state.connected.take().is_some() {
            state.scanning = false;
            state.calls.push(MockCall::Disconnect);
        }
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected.is_some()
    }

    fn device_info(&mut self) -> Result<DeviceInfo> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::DeviceInfo);
        let responsive = match &state.connected {
            None => return Err(Error::NotConnected),
            Some(Channel::Serial { baud, .. }) => state
                .responsive_bauds
                .as_ref()
                .is_none_or(|bauds| bauds.contains(baud)),
            Some(Channel::Udp { .. }) => true,
        };
        if !responsive {
            return Err(Error::Timeout);
        }
        Ok(state.device_info.clone())
    }

    fn health(&mut self) -> Result<HealthInfo> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Health);
        if state.connected.is_none() {
            return Err(Error::NotConnected);
        }
        state.health.ok_or(Error::Timeout)
    }

    fn set_motor_speed(&mut self, speed: Option<u16>) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::SetMotorSpeed(speed));
        match &state.connected {
            Some(Channel::Serial { .. }) => Ok(()),
            Some(Channel::Udp { .. }) => Err(Error::NotSupported(
                "motor control requires a serial link".to_string(),
            )),
            None => Err(Error::NotConnected),
        }
    }

    fn start_scan(&mut self, _force: bool, _use_typical: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::StartScan);
        if state.connected.is_none() {
            return Err(Error::NotConnected);
        }
        if state.fail_start_scan {
            return Err(Error::Timeout);
        }
        state.scanning = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Stop);
        state.scanning = false;
        Ok(())
    }

    fn grab_scan_buffer(&mut self, buffer: &mut [RawSample]) -> Result<usize> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Grab);
        state.grabs += 1;

        // Simulates the interrupt arriving while the grab is blocked
        let grabs = state.grabs;
        if let Some((n, running)) = &state.cancel_after {
            if *n == grabs {
                running.store(false, Ordering::SeqCst);
            }
        }

        if !state.scanning {
            return Err(Error::Acquire("scan not started".to_string()));
        }

        let next = state.scans.pop_front();
        let synthetic = state.synthetic;
        drop(state);

        let samples = match next {
            Some(ScriptedGrab::Samples(samples)) => samples,
            Some(ScriptedGrab::Failure(message)) => return Err(Error::Acquire(message)),
            None if synthetic => {
                std::thread::sleep(Duration::from_millis(SYNTHETIC_PERIOD_MS));
                Self::synthetic_revolution()
            }
            None => {
                std::thread::sleep(Duration::from_millis(1));
                return Err(Error::Timeout);
            }
        };

        let count = samples.len().min(buffer.len());
        buffer[..count].copy_from_slice(&samples[..count]);
        Ok(count)
    }
}
