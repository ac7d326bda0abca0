//! Scripted byte link for driver tests
//!
//! Bytes queued with [`MockTransport::inject_read`] come back from `read`;
//! every `write` is logged as one packet. Clones share state, so a test keeps
//! one handle while the driver owns another.

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[derive(Default)]
struct LinkState {
    incoming: VecDeque<u8>,
    packets: Vec<Vec<u8>>,
    dtr_history: Vec<bool>,
    /// Cable pulled: reads and writes fail
    unplugged: bool,
}

/// In-memory transport
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<LinkState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if sent by the scanner
    pub fn inject_read(&self, data: &[u8]) {
        self.state.lock().incoming.extend(data);
    }

    /// Everything written so far, concatenated
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().packets.concat()
    }

    /// Writes in order, one entry per `write` call
    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.state.lock().packets.clone()
    }

    pub fn clear_written(&self) {
        self.state.lock().packets.clear();
    }

    /// Last DTR level set, if any
    pub fn dtr(&self) -> Option<bool> {
        self.state.lock().dtr_history.last().copied()
    }

    /// Make every following read and write fail
    pub fn unplug(&self) {
        self.state.lock().unplugged = true;
    }

    fn check_link(state: &LinkState) -> Result<()> {
        if state.unplugged {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock link unplugged",
            )));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        Self::check_link(&state)?;
        let n = state.incoming.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        Self::check_link(&state)?;
        state.packets.push(data.to_vec());
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Self::check_link(&self.state.lock())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_link(&state)?;
        state.dtr_history.push(level);
        Ok(())
    }
}
