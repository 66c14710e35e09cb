//! Line transport: one AT command out, CR/LF framed lines back.
//!
//! The modem answers every command with zero or more information lines and a
//! terminal token. Lines are accumulated (without their CR/LF) into a single
//! response buffer, and after each line the buffer is searched for a terminal
//! token:
//!
//! ```text
//!  TX  AT@SOCKCREAT=1,0\r\n
//!  RX  \r\n@SOCKCREAT:3\r\n\r\nOK\r\n
//!      └────── response = "@SOCKCREAT:3OK" ──────┘  → CommandStatus::Ok
//! ```
//!
//! The first match wins in this order: `OK`, `+CME ERROR`, `@EXTERR`,
//! `ERROR`. Nothing before the deadline is a [`CommandStatus::Timeout`], with
//! whatever arrived kept as a partial response.
//!
//! Once the buffer is full, the start of each further line is still kept
//! aside and searched, so an oversized answer still completes on its token.

use heapless::String;

use super::Error;
use super::config::MAX_RESPONSE_LEN;
use crate::network::{Clock, Read, Write};

/// Sleep between polls of an idle UART.
const POLL_INTERVAL_MS: u32 = 1;
/// Characters of a line kept after the response buffer is full.
const SPILL_LEN: usize = 16;

/// Outcome of one command/response exchange.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommandStatus {
    /// `OK` seen.
    Ok,
    /// Plain `ERROR` seen.
    GenericError,
    /// `@EXTERR` seen.
    ExtendedError,
    /// `+CME ERROR` seen.
    CmeError,
    /// No terminal token before the deadline.
    Timeout,
}

impl CommandStatus {
    /// `Ok(())` for [`CommandStatus::Ok`], the matching [`Error`] otherwise.
    pub fn into_result(self) -> Result<(), Error> {
        match self {
            CommandStatus::Ok => Ok(()),
            CommandStatus::GenericError => Err(Error::CommandFailed),
            CommandStatus::ExtendedError => Err(Error::ExtendedError),
            CommandStatus::CmeError => Err(Error::CmeError),
            CommandStatus::Timeout => Err(Error::Timeout),
        }
    }

    /// Errors after which the modem-side socket state can no longer be
    /// trusted.
    pub fn is_fatal_for_socket(self) -> bool {
        matches!(self, CommandStatus::ExtendedError | CommandStatus::CmeError)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommandStatus {
    fn format(&self, f: defmt::Formatter) {
        match self {
            CommandStatus::Ok => defmt::write!(f, "Ok"),
            CommandStatus::GenericError => defmt::write!(f, "GenericError"),
            CommandStatus::ExtendedError => defmt::write!(f, "ExtendedError"),
            CommandStatus::CmeError => defmt::write!(f, "CmeError"),
            CommandStatus::Timeout => defmt::write!(f, "Timeout"),
        }
    }
}

/// How a command line is terminated on the wire.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Terminator {
    /// `\r\n`, the normal case.
    CrLf,
    /// A bare `\r`. The SMS address phase wants nothing else.
    Cr,
    /// Ctrl-Z followed by `\r\n`, ends an SMS body.
    CtrlZ,
}

/// Search an accumulated response for a terminal token.
pub fn classify(response: &str) -> Option<CommandStatus> {
    if response.contains("OK") {
        Some(CommandStatus::Ok)
    } else if response.contains("+CME ERROR") {
        Some(CommandStatus::CmeError)
    } else if response.contains("@EXTERR") {
        Some(CommandStatus::ExtendedError)
    } else if response.contains("ERROR") {
        Some(CommandStatus::GenericError)
    } else {
        None
    }
}

/// UART plus clock, with the response buffer of the last exchange.
#[derive(Debug)]
pub struct Transport<S, C> {
    serial: S,
    clock: C,
    gap_ms: u32,
    response: String<MAX_RESPONSE_LEN>,
    overflowed: bool,
    spill: String<SPILL_LEN>,
}

impl<S, C> Transport<S, C>
where
    S: Read + Write,
    C: Clock,
{
    /// Wrap a UART and a clock.
    pub fn new(serial: S, clock: C) -> Self {
        Self {
            serial,
            clock,
            gap_ms: 0,
            response: String::new(),
            overflowed: false,
            spill: String::new(),
        }
    }

    /// Pause inserted before every command.
    pub fn set_command_gap(&mut self, ms: u32) {
        self.gap_ms = ms;
    }

    /// Text of the last exchange.
    pub fn response(&self) -> &str {
        self.response.as_str()
    }

    /// True if the last response hit [`MAX_RESPONSE_LEN`] and lost characters.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Milliseconds from the clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Sleep on the clock.
    pub fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms)
    }

    /// Give the UART and clock back.
    pub fn release(self) -> (S, C) {
        (self.serial, self.clock)
    }

    /// Write `cmd` and its terminator, then collect lines until a terminal
    /// token or `timeout_ms`.
    ///
    /// An empty `cmd` sends nothing and only listens.
    pub fn send_command(
        &mut self,
        cmd: &str,
        terminator: Terminator,
        timeout_ms: u32,
    ) -> Result<CommandStatus, Error> {
        self.response.clear();
        self.overflowed = false;

        if self.gap_ms > 0 {
            self.clock.delay_ms(self.gap_ms);
        }

        if !cmd.is_empty() {
            self.send_line(cmd.as_bytes(), terminator)?;
        }

        let start = self.clock.now_ms();
        loop {
            let elapsed = self.clock.now_ms().saturating_sub(start);
            if elapsed >= u64::from(timeout_ms) {
                return Ok(CommandStatus::Timeout);
            }
            let remaining = timeout_ms - elapsed as u32;
            if self.read_line(remaining)? == 0 && self.spill.is_empty() {
                continue;
            }
            if let Some(status) = classify(&self.response).or_else(|| classify(&self.spill)) {
                return Ok(status);
            }
        }
    }

    /// Write raw bytes followed by `terminator`.
    pub fn send_line(&mut self, bytes: &[u8], terminator: Terminator) -> Result<(), Error> {
        self.write_all(bytes)?;
        match terminator {
            Terminator::CrLf => self.write_all(b"\r\n")?,
            Terminator::Cr => self.write_all(b"\r")?,
            Terminator::CtrlZ => self.write_all(b"\x1a\r\n")?,
        }
        self.serial.flush().map_err(|_| Error::Serial)
    }

    /// Append the next line to the response buffer.
    ///
    /// Printable characters are kept; a CR/LF pair in either order ends the
    /// line. Returns the number of characters appended, which is zero for a
    /// blank line or when `timeout_ms` passes with nothing received.
    ///
    /// Characters that no longer fit go to a short per-line spill so the
    /// terminal token of an oversized response is not lost.
    pub fn read_line(&mut self, timeout_ms: u32) -> Result<usize, Error> {
        self.spill.clear();
        let start = self.clock.now_ms();
        let mut prev = 0u8;
        let mut len = 0;
        let mut byte = [0u8; 1];

        while self.clock.now_ms().saturating_sub(start) < u64::from(timeout_ms) {
            if self.serial.read(&mut byte).map_err(|_| Error::Serial)? == 0 {
                self.clock.delay_ms(POLL_INTERVAL_MS);
                continue;
            }
            let c = byte[0];
            if (0x20..=0x7e).contains(&c) {
                if self.response.push(c as char).is_ok() {
                    len += 1;
                } else {
                    let _ = self.spill.push(c as char);
                    if !self.overflowed {
                        self.overflowed = true;
                        warn!("response longer than {} bytes, truncating", MAX_RESPONSE_LEN);
                    }
                }
            } else if (prev == b'\r' && c == b'\n') || (prev == b'\n' && c == b'\r') {
                break;
            }
            prev = c;
        }

        Ok(len)
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            let n = self.serial.write(bytes).map_err(|_| Error::Serial)?;
            if n == 0 {
                return Err(Error::Serial);
            }
            bytes = &bytes[n..];
        }
        Ok(())
    }
}
