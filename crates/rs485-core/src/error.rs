use std::io;
use std::time::Duration;

use thiserror::Error;

/// Why a port could not be opened. The connection is left closed.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no serial port selected")]
    NoPortSelected,

    #[error("invalid port configuration: {0}")]
    InvalidConfig(String),

    #[error("port not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("port unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectError {
    /// Classify an error returned by `serialport` while opening `port`.
    pub fn from_serial(port: &str, err: serialport::Error) -> Self {
        let detail = format!("{port}: {}", err.description);
        match err.kind {
            serialport::ErrorKind::NoDevice => ConnectError::Unavailable(detail),
            serialport::ErrorKind::InvalidInput => ConnectError::InvalidConfig(detail),
            serialport::ErrorKind::Io(io::ErrorKind::NotFound) => ConnectError::NotFound(detail),
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                ConnectError::PermissionDenied(detail)
            }
            serialport::ErrorKind::Io(kind) => ConnectError::Io(io::Error::new(kind, detail)),
            serialport::ErrorKind::Unknown => ConnectError::Unavailable(detail),
        }
    }
}

/// Why a single request/response exchange failed.
#[derive(Debug, Error)]
pub enum TransactError {
    #[error("not connected")]
    NotConnected,

    /// No complete line arrived in time. The connection is still usable.
    #[error("no response within {} ms", .0.as_millis())]
    Timeout(Duration),

    /// Transport fault. The connection should be dropped and reopened.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransactError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransactError::Io(_))
    }
}

/// Request rejected by a [`crate::Session`] before reaching the worker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a connect or send is already in progress")]
    Busy,

    #[error("session worker has stopped")]
    WorkerGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_error_kinds_are_classified() {
        let err = serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::NotFound),
            "No such file or directory",
        );
        match ConnectError::from_serial("/dev/ttyUSB9", err) {
            ConnectError::NotFound(detail) => {
                assert_eq!(detail, "/dev/ttyUSB9: No such file or directory")
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "Device or resource busy");
        assert!(matches!(
            ConnectError::from_serial("COM3", err),
            ConnectError::Unavailable(_)
        ));

        let err = serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud");
        assert!(matches!(
            ConnectError::from_serial("COM3", err),
            ConnectError::InvalidConfig(_)
        ));
    }

    #[test]
    fn only_io_is_fatal() {
        assert!(!TransactError::NotConnected.is_fatal());
        assert!(!TransactError::Timeout(Duration::from_millis(2000)).is_fatal());
        assert!(TransactError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
    }

    #[test]
    fn timeout_message_reports_millis() {
        let err = TransactError::Timeout(Duration::from_millis(2000));
        assert_eq!(err.to_string(), "no response within 2000 ms");
    }
}
