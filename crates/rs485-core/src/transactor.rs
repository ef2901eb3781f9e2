//! Half-duplex request/response over a host-switched RS-485 transceiver.
//!
//! The transceiver has no automatic direction control, so every exchange
//! raises transmit-enable, waits for the driver to come up, writes one line,
//! waits for the last byte to leave the shift register, drops
//! transmit-enable and only then listens for the reply. Releasing early
//! truncates the tail of the command on real hardware.

use log::{debug, info, trace, warn};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::{ConnectError, HalfDuplexPort, LinkConfig, TransactError};

/// Open `config.port_name` with 8-N-1 framing and no flow control.
///
/// On Unix the port is opened exclusively, so a second owner gets
/// [`ConnectError::Unavailable`].
pub fn connect(config: LinkConfig) -> Result<Connection, ConnectError> {
    validate(&config)?;
    let port = serialport::new(&config.port_name, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout)
        .open()
        .map_err(|e| ConnectError::from_serial(&config.port_name, e))?;
    Connection::open_with(config, port)
}

fn validate(config: &LinkConfig) -> Result<(), ConnectError> {
    if config.port_name.trim().is_empty() {
        return Err(ConnectError::NoPortSelected);
    }
    if config.baud_rate == 0 {
        return Err(ConnectError::InvalidConfig("baud rate must be positive".into()));
    }
    Ok(())
}

/// An exclusively owned port plus the settings used to talk over it.
///
/// Calls need `&mut self`, so a single `Connection` can never run two
/// transactions at once.
pub struct Connection<P = Box<dyn SerialPort>> {
    config: LinkConfig,
    port: Option<P>,
    /// Bytes read past the end of the last returned line.
    pending: Vec<u8>,
}

impl<P: HalfDuplexPort> Connection<P> {
    /// A connection that was never opened. Every transaction fails with
    /// [`TransactError::NotConnected`].
    pub fn closed(config: LinkConfig) -> Self {
        Self {
            config,
            port: None,
            pending: Vec::new(),
        }
    }

    /// Take ownership of an already opened port and put it in receive mode.
    pub fn open_with(config: LinkConfig, mut port: P) -> Result<Self, ConnectError> {
        validate(&config)?;
        port.set_rts(config.rts_polarity.level(false))?;
        port.set_timeout(config.read_timeout)?;
        info!("opened {} at {} baud", config.port_name, config.baud_rate);
        Ok(Self {
            config,
            port: Some(port),
            pending: Vec::new(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Release the port. Safe to call any number of times.
    pub fn disconnect(&mut self) {
        self.pending.clear();
        if let Some(port) = self.port.take() {
            drop(port);
            info!("closed {}", self.config.port_name);
        }
    }

    /// Send `command` as one line and return the next line the device sends
    /// back, without its terminator.
    pub fn transact(&mut self, command: &str) -> Result<String, TransactError> {
        let Some(port) = self.port.as_mut() else {
            return Err(TransactError::NotConnected);
        };
        let cfg = &self.config;

        let line = cfg.encoding.encode_line(command, cfg.line_ending);
        debug!("{} tx {:?}", cfg.port_name, command);

        let written = write_line(port, cfg, &line);
        let released = port.set_rts(cfg.rts_polarity.level(false));
        trace!("{} transmit-enable released", cfg.port_name);
        if let Err(e) = &released {
            warn!("{}: failed to release transmit-enable: {e}", cfg.port_name);
        }
        written?;
        released?;

        let raw = read_line(port, &mut self.pending, cfg)?;
        let response = cfg.encoding.decode(&raw);
        debug!("{} rx {:?}", cfg.port_name, response);
        Ok(response)
    }
}

/// Steps 1 to 4 of an exchange: enable, settle, write, drain.
fn write_line<P: HalfDuplexPort>(port: &mut P, cfg: &LinkConfig, line: &[u8]) -> io::Result<()> {
    port.set_rts(cfg.rts_polarity.level(true))?;
    trace!("{} transmit-enable asserted", cfg.port_name);
    thread::sleep(cfg.settle_delay);
    port.set_timeout(cfg.write_timeout)?;
    port.write_all(line)?;
    port.flush()?;
    thread::sleep(cfg.settle_delay);
    Ok(())
}

fn read_line<P: HalfDuplexPort>(
    port: &mut P,
    pending: &mut Vec<u8>,
    cfg: &LinkConfig,
) -> Result<Vec<u8>, TransactError> {
    let deadline = Instant::now() + cfg.read_timeout;
    let mut chunk = [0u8; 256];
    loop {
        if let Some(line) = cfg.encoding.take_line(pending, cfg.line_ending) {
            return Ok(line);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::ZERO {
            warn!("{}: no response within {:?}", cfg.port_name, cfg.read_timeout);
            return Err(TransactError::Timeout(cfg.read_timeout));
        }
        port.set_timeout(remaining)?;
        match port.read(&mut chunk) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "port closed").into());
            }
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                warn!("{}: no response within {:?}", cfg.port_name, cfg.read_timeout);
                return Err(TransactError::Timeout(cfg.read_timeout));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}
