//! Driver and snapshot error types.

use crate::sfr::Port;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Failure of a driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("pin {port}{pin} does not exist")]
    InvalidPin { port: Port, pin: u8 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("duty cycle {0}% is above 100%")]
    InvalidDutyCycle(u8),
    #[error("EEPROM address 0x{0:03X} is out of range")]
    AddressOutOfRange(u16),
    #[error("LCD position row {row} column {column} is out of range")]
    InvalidPosition { row: u8, column: u8 },
    #[error("servo angle is outside the configured range")]
    AngleOutOfRange,
    #[error("no data available")]
    NotReady,
    #[error("start condition not detected")]
    StartNotDetected,
    #[error("stop condition not detected")]
    StopNotDetected,
    #[error("target did not acknowledge")]
    Nack,
    #[error("MSSP write collision")]
    WriteCollision,
    #[error("MSSP receive overflow")]
    Overflow,
    #[error("status bit poll timed out")]
    Timeout,
}

impl embedded_hal::digital::Error for Error {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        match self {
            Error::Overflow => embedded_hal::spi::ErrorKind::Overrun,
            _ => embedded_hal::spi::ErrorKind::Other,
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            Error::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Error::Overflow => ErrorKind::Overrun,
            Error::WriteCollision => ErrorKind::ArbitrationLoss,
            _ => ErrorKind::Other,
        }
    }
}

/// Failure while saving or loading a simulator snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("decompress error: {0}")]
    Decompress(String),
    #[error("file too small")]
    Truncated,
    #[error("not a snapshot file (bad magic)")]
    BadMagic,
    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("chip mismatch: snapshot=0x{found:02X} current=0x{expected:02X}")]
    Chip { found: u8, expected: u8 },
}
