//! Core functionalities: half-duplex serial transactions, session worker, activity log.

pub mod config;
pub mod encoding;
pub mod error;
pub mod logbuf;
pub mod port;
pub mod session;
pub mod transactor;

pub use config::{is_standard_baud, LineEnding, LinkConfig, RtsPolarity, STANDARD_BAUD_RATES};
pub use encoding::TextEncoding;
pub use error::{ConnectError, SessionError, TransactError};
pub use logbuf::{LogEntry, LogKind, LogStore};
pub use port::{list_ports, HalfDuplexPort, PortInfo};
pub use session::{Session, SessionEvent, SessionState};
pub use transactor::{connect, Connection};
