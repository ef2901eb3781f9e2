#![allow(dead_code)]

use parking_lot::Mutex;
use rs485_core::{HalfDuplexPort, LinkConfig};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Rts(bool),
    Timeout(Duration),
    Write(Vec<u8>),
    Flush,
    Read,
}

/// How the fake device answers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Reply {
    /// Nothing ever arrives; reads time out at once.
    #[default]
    Silent,
    /// Every written byte comes straight back.
    Echo,
    /// One byte per read, never a terminator.
    Trickle,
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<(Instant, Call)>,
    pub rts: Option<bool>,
    pub inbound: VecDeque<u8>,
    pub reply: Reply,
    pub fail_write: bool,
    /// Refuse to drive RTS to this level. The attempt is still recorded.
    pub fail_rts: Option<bool>,
    pub fail_read: Option<io::ErrorKind>,
    pub closed: bool,
}

impl MockState {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn first(&self, wanted: &Call) -> Option<Instant> {
        self.calls.iter().find(|(_, c)| c == wanted).map(|(at, _)| *at)
    }

    pub fn rts_levels(&self) -> Vec<bool> {
        self.calls
            .iter()
            .filter_map(|(_, c)| match c {
                Call::Rts(level) => Some(*level),
                _ => None,
            })
            .collect()
    }

    pub fn written(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|(_, c)| match c {
                Call::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn record(&mut self, call: Call) {
        self.calls.push((Instant::now(), call));
    }
}

pub struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    pub fn new(reply: Reply) -> (Self, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState {
            reply,
            ..Default::default()
        }));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    pub fn attach(state: &Arc<Mutex<MockState>>) -> Self {
        state.lock().closed = false;
        Self {
            state: state.clone(),
        }
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.record(Call::Read);
        if let Some(kind) = state.fail_read {
            return Err(io::Error::from(kind));
        }
        if state.reply == Reply::Trickle {
            drop(state);
            std::thread::sleep(Duration::from_millis(5));
            buf[0] = b'.';
            return Ok(1);
        }
        if state.inbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock read timed out"));
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.record(Call::Write(buf.to_vec()));
        if state.fail_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failed"));
        }
        if state.reply == Reply::Echo {
            state.inbound.extend(buf.iter().copied());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().record(Call::Flush);
        Ok(())
    }
}

impl HalfDuplexPort for MockPort {
    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        let mut state = self.state.lock();
        state.record(Call::Rts(level));
        if state.fail_rts == Some(level) {
            return Err(io::Error::new(io::ErrorKind::Other, "mock rts failed"));
        }
        state.rts = Some(level);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.state.lock().record(Call::Timeout(timeout));
        Ok(())
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        self.state.lock().closed = true;
    }
}

pub fn config() -> LinkConfig {
    LinkConfig::new("/dev/ttyMOCK0", 9600)
}

/// Same as [`config`] without the settle pauses.
pub fn fast_config() -> LinkConfig {
    LinkConfig {
        settle_delay: Duration::ZERO,
        ..config()
    }
}
