//! Error type of the modem controller

use core::fmt;

/// Errors reported by [`Modem`](super::Modem).
///
/// Grouped by the layer that produces them. All variants are plain data so the
/// type stays `Copy` and can be stored inside a completed socket operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    // Transport
    /// No terminal token arrived before the command timeout.
    Timeout,
    /// The modem answered `ERROR`.
    CommandFailed,
    /// The modem answered `@EXTERR`.
    ExtendedError,
    /// The modem answered `+CME ERROR`.
    CmeError,
    /// The UART reported an error.
    Serial,

    // Link
    /// The modem is off, nothing was sent.
    NotPoweredOn,
    /// SIM not ready or not registered for data.
    NoCellLink,
    /// A previous command timed out; gated commands are refused until the
    /// modem answers again.
    NoResponse,
    /// The modem never answered `AT` after the power sequence.
    PowerOnFailed,
    /// The initialisation handshake failed, even after a reboot.
    InitFailed,

    // Sessions
    /// All socket slots are in use.
    NoFreeSocketSlot,
    /// The slot is not allocated.
    SocketNotOpen,
    /// The handle is out of range or belongs to an earlier use of the slot.
    BadSocketHandle,
    /// The socket has no modem-side connection.
    SocketNotConnected,
    /// The modem dropped the socket after a fatal write/read error. It is
    /// reopened on the next use.
    SocketReset,

    // Everything else
    /// Not finished yet, call again.
    WouldBlock,
    /// Argument out of range (IP string, SMS length, slot, ...).
    InvalidParameter,
    /// The modem answered `OK` but the payload could not be parsed.
    InvalidResponse,
    /// A fixed-capacity buffer was too small.
    BufferOverflow,
    /// bind / listen / accept.
    Unsupported,
    /// Registration does not allow SMS.
    SmsUnavailable,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Error::Timeout => "command timed out",
            Error::CommandFailed => "modem returned ERROR",
            Error::ExtendedError => "modem returned @EXTERR",
            Error::CmeError => "modem returned +CME ERROR",
            Error::Serial => "serial port error",
            Error::NotPoweredOn => "modem not powered on",
            Error::NoCellLink => "no cellular link",
            Error::NoResponse => "modem not responding",
            Error::PowerOnFailed => "modem did not power up",
            Error::InitFailed => "modem initialisation failed",
            Error::NoFreeSocketSlot => "no free socket slot",
            Error::SocketNotOpen => "socket not open",
            Error::BadSocketHandle => "bad socket handle",
            Error::SocketNotConnected => "socket not connected",
            Error::SocketReset => "socket reset by modem",
            Error::WouldBlock => "operation would block",
            Error::InvalidParameter => "invalid parameter",
            Error::InvalidResponse => "unexpected modem response",
            Error::BufferOverflow => "buffer overflow",
            Error::Unsupported => "operation not supported",
            Error::SmsUnavailable => "SMS service unavailable",
        };
        f.write_str(s)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::CommandFailed => defmt::write!(f, "CommandFailed"),
            Error::ExtendedError => defmt::write!(f, "ExtendedError"),
            Error::CmeError => defmt::write!(f, "CmeError"),
            Error::Serial => defmt::write!(f, "Serial"),
            Error::NotPoweredOn => defmt::write!(f, "NotPoweredOn"),
            Error::NoCellLink => defmt::write!(f, "NoCellLink"),
            Error::NoResponse => defmt::write!(f, "NoResponse"),
            Error::PowerOnFailed => defmt::write!(f, "PowerOnFailed"),
            Error::InitFailed => defmt::write!(f, "InitFailed"),
            Error::NoFreeSocketSlot => defmt::write!(f, "NoFreeSocketSlot"),
            Error::SocketNotOpen => defmt::write!(f, "SocketNotOpen"),
            Error::BadSocketHandle => defmt::write!(f, "BadSocketHandle"),
            Error::SocketNotConnected => defmt::write!(f, "SocketNotConnected"),
            Error::SocketReset => defmt::write!(f, "SocketReset"),
            Error::WouldBlock => defmt::write!(f, "WouldBlock"),
            Error::InvalidParameter => defmt::write!(f, "InvalidParameter"),
            Error::InvalidResponse => defmt::write!(f, "InvalidResponse"),
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            Error::Unsupported => defmt::write!(f, "Unsupported"),
            Error::SmsUnavailable => defmt::write!(f, "SmsUnavailable"),
        }
    }
}
