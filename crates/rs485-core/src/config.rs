use std::time::Duration;

use crate::TextEncoding;

/// Baud rates offered by the port picker.
pub const STANDARD_BAUD_RATES: [u32; 5] = [9600, 19_200, 38_400, 57_600, 115_200];

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

pub fn is_standard_baud(rate: u32) -> bool {
    STANDARD_BAUD_RATES.contains(&rate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    LF,
    CR,
    CRLF,
}

impl LineEnding {
    /// Terminator as text; [`TextEncoding::terminator`] turns it into wire bytes.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::LF => "\n",
            LineEnding::CR => "\r",
            LineEnding::CRLF => "\r\n",
        }
    }
}

impl std::str::FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lf" => Ok(Self::LF),
            "cr" => Ok(Self::CR),
            "crlf" => Ok(Self::CRLF),
            other => Err(format!("unknown line ending '{other}' (expected lf, cr or crlf)")),
        }
    }
}

/// Which RTS level turns the transceiver driver on.
///
/// Most USB/RS-485 adapters that leave direction control to the host wire
/// RTS straight to DE, so asserting RTS means "transmit". A few boards put an
/// inverter in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtsPolarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

impl RtsPolarity {
    /// RTS level to write for the requested transmit-enable state.
    pub fn level(self, transmit: bool) -> bool {
        match self {
            RtsPolarity::ActiveHigh => transmit,
            RtsPolarity::ActiveLow => !transmit,
        }
    }
}

/// Everything needed to open a port and run transactions on it.
///
/// Framing is always 8 data bits, no parity, one stop bit and no flow
/// control; those are applied by [`crate::connect`] and are not part of the
/// configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Pause after asserting and before releasing transmit-enable.
    pub settle_delay: Duration,
    pub line_ending: LineEnding,
    pub rts_polarity: RtsPolarity,
    pub encoding: TextEncoding,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            line_ending: LineEnding::LF,
            rts_polarity: RtsPolarity::ActiveHigh,
            encoding: TextEncoding::Utf8,
        }
    }
}

impl LinkConfig {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }
}
