//! Coarse error codes for a network stack adapter

use crate::modem::Error as ModemError;

/// The single error code surfaced to a socket API built on top of the driver.
///
/// The driver reports detailed [`modem::Error`](crate::modem::Error) values;
/// socket layers usually only distinguish a handful of cases, which is what
/// this enum collapses them into.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// No cellular data link.
    NoConnection,
    /// Socket handle invalid or no free socket.
    NoSocket,
    /// The modem misbehaved or stopped answering.
    DeviceError,
    /// Invalid argument.
    Parameter,
    /// The modem cannot do this at all (bind, listen, accept).
    Unsupported,
    /// Not finished yet, call again.
    WouldBlock,
}

impl From<ModemError> for Error {
    fn from(err: ModemError) -> Self {
        match err {
            ModemError::NotPoweredOn
            | ModemError::NoCellLink
            | ModemError::PowerOnFailed
            | ModemError::InitFailed
            | ModemError::SmsUnavailable => Error::NoConnection,
            ModemError::NoFreeSocketSlot
            | ModemError::SocketNotOpen
            | ModemError::BadSocketHandle
            | ModemError::SocketNotConnected => Error::NoSocket,
            ModemError::InvalidParameter | ModemError::BufferOverflow => Error::Parameter,
            ModemError::Unsupported => Error::Unsupported,
            ModemError::WouldBlock => Error::WouldBlock,
            ModemError::Timeout
            | ModemError::NoResponse
            | ModemError::CommandFailed
            | ModemError::ExtendedError
            | ModemError::CmeError
            | ModemError::InvalidResponse
            | ModemError::SocketReset
            | ModemError::Serial => Error::DeviceError,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NoConnection => defmt::write!(f, "NoConnection"),
            Error::NoSocket => defmt::write!(f, "NoSocket"),
            Error::DeviceError => defmt::write!(f, "DeviceError"),
            Error::Parameter => defmt::write!(f, "Parameter"),
            Error::Unsupported => defmt::write!(f, "Unsupported"),
            Error::WouldBlock => defmt::write!(f, "WouldBlock"),
        }
    }
}
