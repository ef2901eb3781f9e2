//! Background worker that owns a [`Connection`] so blocking connects and
//! transactions never run on the caller's event loop.
//!
//! Requests go in over one channel; [`SessionEvent`]s come back over another
//! and every step is also appended to a shared [`LogStore`].

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::{
    ConnectError, Connection, HalfDuplexPort, LinkConfig, LogKind, LogStore, SessionError,
    TransactError,
};

const LOG_CAPACITY: usize = 10_000;

/// What the front end may offer right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// A command is on the wire; further sends are refused.
    Busy,
}

#[derive(Debug)]
pub enum SessionEvent {
    Connected { port: String, baud_rate: u32 },
    ConnectFailed(String),
    Response { command: String, response: String },
    TransactFailed { command: String, error: TransactError },
    Disconnected,
}

enum Command {
    Connect(LinkConfig),
    Send(String),
    Disconnect,
    Shutdown,
}

pub struct Session {
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<SessionEvent>,
    state: Arc<Mutex<SessionState>>,
    log: Arc<Mutex<LogStore>>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Session backed by real serial ports.
    pub fn spawn() -> Self {
        Self::spawn_with(crate::connect)
    }

    /// Session that opens connections through `opener`.
    pub fn spawn_with<P, F>(opener: F) -> Self
    where
        P: HalfDuplexPort + 'static,
        F: FnMut(LinkConfig) -> Result<Connection<P>, ConnectError> + Send + 'static,
    {
        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<SessionEvent>();
        let state = Arc::new(Mutex::new(SessionState::Disconnected));
        let log = Arc::new(Mutex::new(LogStore::new(LOG_CAPACITY)));
        log.lock().push(LogKind::Info, "Application ready.");

        let worker = Worker {
            opener,
            conn: None,
            tx_evt,
            state: state.clone(),
            log: log.clone(),
        };
        let handle = std::thread::spawn(move || worker.run(rx_cmd));

        Self {
            tx_cmd,
            rx_evt,
            state,
            log,
            worker: Some(handle),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn connect(&self, cfg: LinkConfig) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if matches!(*state, SessionState::Connecting | SessionState::Busy) {
            return Err(SessionError::Busy);
        }
        let previous = *state;
        *state = SessionState::Connecting;
        self.tx_cmd.send(Command::Connect(cfg)).map_err(|_| {
            *state = previous;
            SessionError::WorkerGone
        })
    }

    /// Connect when disconnected, disconnect when connected.
    pub fn toggle(&self, cfg: LinkConfig) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Connected => self.disconnect(),
            SessionState::Disconnected => self.connect(cfg),
            SessionState::Connecting | SessionState::Busy => Err(SessionError::Busy),
        }
    }

    pub fn send(&self, command: impl Into<String>) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        let previous = *state;
        match previous {
            SessionState::Connecting | SessionState::Busy => return Err(SessionError::Busy),
            SessionState::Connected => *state = SessionState::Busy,
            // the worker reports the missing connection
            SessionState::Disconnected => {}
        }
        self.tx_cmd.send(Command::Send(command.into())).map_err(|_| {
            *state = previous;
            SessionError::WorkerGone
        })
    }

    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.tx_cmd
            .send(Command::Disconnect)
            .map_err(|_| SessionError::WorkerGone)
    }

    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.rx_evt
    }

    pub fn log(&self) -> MutexGuard<'_, LogStore> {
        self.log.lock()
    }

    pub fn log_text(&self) -> String {
        self.log.lock().to_text()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("session worker panicked");
            }
        }
    }
}

struct Worker<P, F> {
    opener: F,
    conn: Option<Connection<P>>,
    tx_evt: Sender<SessionEvent>,
    state: Arc<Mutex<SessionState>>,
    log: Arc<Mutex<LogStore>>,
}

impl<P, F> Worker<P, F>
where
    P: HalfDuplexPort,
    F: FnMut(LinkConfig) -> Result<Connection<P>, ConnectError>,
{
    fn run(mut self, rx_cmd: Receiver<Command>) {
        while let Ok(cmd) = rx_cmd.recv() {
            match cmd {
                Command::Connect(cfg) => self.connect(cfg),
                Command::Send(command) => self.send(command),
                Command::Disconnect => self.disconnect(),
                Command::Shutdown => break,
            }
        }
        if let Some(mut conn) = self.conn.take() {
            conn.disconnect();
        }
        log::debug!("session worker stopped");
    }

    fn is_open(&self) -> bool {
        self.conn.as_ref().map_or(false, Connection::is_open)
    }

    fn add_log(&self, kind: LogKind, message: String) {
        log::debug!("{message}");
        self.log.lock().push(kind, message);
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.tx_evt.send(event);
    }

    fn connect(&mut self, cfg: LinkConfig) {
        // state stays Connecting until the new port is open
        if self.close() {
            self.emit(SessionEvent::Disconnected);
        }
        if cfg.port_name.trim().is_empty() {
            self.add_log(LogKind::Error, "ERROR: Please select a COM port.".into());
            self.set_state(SessionState::Disconnected);
            self.emit(SessionEvent::ConnectFailed(ConnectError::NoPortSelected.to_string()));
            return;
        }

        let (port, baud_rate) = (cfg.port_name.clone(), cfg.baud_rate);
        match (self.opener)(cfg) {
            Ok(conn) => {
                self.conn = Some(conn);
                self.add_log(
                    LogKind::Info,
                    format!("Successfully connected to {port} at {baud_rate} baud."),
                );
                self.set_state(SessionState::Connected);
                self.emit(SessionEvent::Connected { port, baud_rate });
            }
            Err(e) => {
                self.add_log(LogKind::Error, format!("ERROR: Failed to connect. Details: {e}"));
                self.set_state(SessionState::Disconnected);
                self.emit(SessionEvent::ConnectFailed(e.to_string()));
            }
        }
    }

    fn send(&mut self, command: String) {
        let result = if self.is_open() {
            self.add_log(LogKind::Tx, format!("Sending command: '{command}'..."));
            match self.conn.as_mut() {
                Some(conn) => conn.transact(&command),
                None => Err(TransactError::NotConnected),
            }
        } else {
            self.add_log(
                LogKind::Error,
                "ERROR: Not connected. Please connect to a port first.".into(),
            );
            Err(TransactError::NotConnected)
        };

        match result {
            Ok(response) => {
                self.add_log(LogKind::Rx, format!("Received response: '{response}'"));
                self.set_state(SessionState::Connected);
                self.emit(SessionEvent::Response { command, response });
            }
            Err(error) => {
                match &error {
                    TransactError::NotConnected => {}
                    TransactError::Timeout(limit) => self.add_log(
                        LogKind::Error,
                        format!(
                            "ERROR: The operation timed out. No response received within {} ms.",
                            limit.as_millis()
                        ),
                    ),
                    TransactError::Io(e) => self.add_log(
                        LogKind::Error,
                        format!("An error occurred while sending command: {e}"),
                    ),
                }
                let closed = error.is_fatal() && self.close();
                let state = if self.is_open() {
                    SessionState::Connected
                } else {
                    SessionState::Disconnected
                };
                self.set_state(state);
                self.emit(SessionEvent::TransactFailed { command, error });
                if closed {
                    self.emit(SessionEvent::Disconnected);
                }
            }
        }
    }

    /// Drop the connection. Returns whether an open port was closed.
    fn close(&mut self) -> bool {
        match self.conn.take() {
            Some(mut conn) if conn.is_open() => {
                conn.disconnect();
                self.add_log(LogKind::Info, "Serial port closed.".into());
                true
            }
            _ => false,
        }
    }

    fn disconnect(&mut self) {
        let closed = self.close();
        self.set_state(SessionState::Disconnected);
        if closed {
            self.emit(SessionEvent::Disconnected);
        }
    }
}
