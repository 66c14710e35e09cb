//! # Modem controller
//!
//! [`Modem`] owns everything: the UART and clock (through the
//! [transport](transport)), the power pins, the link state, the socket table
//! and the SMS listener. There are no globals; share it between contexts with
//! [`SharedModem`].
//!
//! ## Command gating
//!
//! Commands fall in two classes:
//!
//! - **ungated** (`AT`, init handshake, `AT@SOCKREAD`, `AT@SOCKCLOSE`, status
//!   queries): sent whenever the modem is powered.
//! - **gated** (`AT@SOCKCREAT`, `AT@SOCKCONN`, `AT@SOCKWRITE`,
//!   `AT@DNSRESVDON`): preceded by a registration check (`AT+CSQ`,
//!   `AT+CPIN?`, `AT+CREG?`) and refused with [`Error::NoCellLink`] if it fails.
//!   While the link is [`LinkState::NoResponse`] they are refused without any
//!   traffic.
//!
//! Any command that times out moves the link to `NoResponse`; the next command
//! that gets any answer moves it back to `On`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wnclink::modem::{Config, Modem, Protocol};
//! # use wnclink::network::{Clock, Read, Write};
//! # struct Uart;
//! # impl Read for Uart {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for Uart {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Timer;
//! # impl Clock for Timer {
//! #     fn now_ms(&self) -> u64 { 0 }
//! #     fn delay_ms(&mut self, _ms: u32) {}
//! # }
//! # fn main() -> Result<(), wnclink::Error> {
//! let mut modem = Modem::new(Uart, Timer, (), Config::default());
//! modem.connect()?;
//!
//! let sock = modem.socket_open(Protocol::Tcp)?;
//! modem.socket_connect(sock, "93.184.216.34", 80)?;
//!
//! // Non-blocking: the first call queues the data, ticks move it.
//! let _ = modem.socket_send(sock, b"GET / HTTP/1.0\r\n\r\n");
//! while modem.tick().is_some() {}
//! let sent = modem.socket_send(sock, b"GET / HTTP/1.0\r\n\r\n")?;
//! # let _ = sent;
//! # Ok(())
//! # }
//! ```

use heapless::String;

use crate::network::{Clock, PowerControl, Read, Write};

/// Command builders and response parsers.
pub mod command;
/// Tunables and capacities.
pub mod config;
mod error;
pub mod hex;
mod link;
mod scheduler;
mod session;
/// Single-lock wrapper for sharing a [`Modem`].
pub mod shared;
pub mod sms;
pub mod socket;
pub mod status;
pub mod transport;


pub use config::{Config, DEFAULT_APN, DebugLevel};
pub use error::Error;
pub use shared::SharedModem;
pub use sms::{SmsCallback, SmsList, SmsMessage, SmsSlot};
pub use socket::{IoState, Protocol, SocketCallback, SocketHandle};
pub use status::{IpStats, LinkState, NetworkTime, Signal, Status};
pub use transport::{CommandStatus, Terminator};

use config::{MAX_APN_LEN, TRUNCATE_LOG_LEN};
use sms::SmsListener;
use socket::SocketTable;
use transport::Transport;

/// The WNC modem driver.
///
/// Generic over the UART `S`, the clock `C` and the power pins `P`. Every
/// method takes `&mut self`, so at most one AT exchange is ever in flight.
#[derive(Debug)]
pub struct Modem<S, C, P> {
    transport: Transport<S, C>,
    power: P,
    config: Config,
    state: LinkState,
    sms_ready: bool,
    apn: String<MAX_APN_LEN>,
    signal: Option<Signal>,
    debug: DebugLevel,
    sockets: SocketTable,
    sms: SmsListener,
}

impl<S, C, P> Modem<S, C, P>
where
    S: Read + Write,
    C: Clock,
    P: PowerControl,
{
    /// Create a driver for a modem that is still off.
    pub fn new(serial: S, clock: C, power: P, config: Config) -> Self {
        let mut transport = Transport::new(serial, clock);
        transport.set_command_gap(config.command_gap_ms);
        Self {
            transport,
            power,
            config,
            state: LinkState::Off,
            sms_ready: false,
            apn: String::new(),
            signal: None,
            debug: DebugLevel::OFF,
            sockets: SocketTable::new(),
            sms: SmsListener::default(),
        }
    }

    /// Tear down the driver and return the peripherals.
    pub fn release(self) -> (S, C, P) {
        let (serial, clock) = self.transport.release();
        (serial, clock, self.power)
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// True when registered for data and answering.
    pub fn registered(&self) -> bool {
        self.state == LinkState::On
    }

    /// True when the last registration check allowed SMS.
    pub fn sms_ready(&self) -> bool {
        self.sms_ready
    }

    /// APN last applied successfully, empty before that.
    pub fn apn(&self) -> &str {
        &self.apn
    }

    /// Socket table, for inspection.
    pub fn sockets(&self) -> &SocketTable {
        &self.sockets
    }

    /// Set the runtime log verbosity.
    pub fn set_debug_level(&mut self, level: DebugLevel) {
        self.debug = level;
    }

    /// Runtime log verbosity.
    pub fn debug_level(&self) -> DebugLevel {
        self.debug
    }

    /// Change the timeout of ordinary commands.
    pub fn set_command_timeout(&mut self, ms: u32) {
        self.config.command_timeout_ms = ms;
    }

    /// Text of the last response.
    pub fn last_response(&self) -> &str {
        self.transport.response()
    }

    /// Snapshot of link and socket state for diagnostics.
    pub fn status(&self) -> Status<'_> {
        Status {
            state: self.state,
            sms_ready: self.sms_ready,
            apn: &self.apn,
            signal: self.signal,
            sockets_open: self.sockets.open_count() as u8,
            sockets_connected: self.sockets.connected_count() as u8,
        }
    }

    /// Exchange without touching the link state. Refused while off.
    fn raw(&mut self, cmd: &str, terminator: Terminator, timeout_ms: u32) -> Result<CommandStatus, Error> {
        if self.state == LinkState::Off {
            return Err(Error::NotPoweredOn);
        }
        self.transport.send_command(cmd, terminator, timeout_ms)
    }

    /// Ungated command. A timeout moves the link to `NoResponse`, any answer
    /// moves it out again.
    fn at(&mut self, cmd: &str, timeout_ms: u32) -> Result<CommandStatus, Error> {
        self.trace_line("TX:", cmd);
        let status = self.raw(cmd, Terminator::CrLf, timeout_ms)?;
        self.track_answer(cmd, status);
        Ok(status)
    }

    /// Link bookkeeping after an exchange: `NoResponse` on timeout, back to
    /// `On` on any answer.
    fn track_answer(&mut self, cmd: &str, status: CommandStatus) {
        if status == CommandStatus::Timeout {
            self.state = LinkState::NoResponse;
            warn!("AT command timeout: {}", cmd);
        } else {
            if self.state == LinkState::NoResponse {
                self.state = LinkState::On;
            }
            let response = self.transport.response();
            if self.debug.contains(DebugLevel::VERBOSE) {
                debug!("RX: {}", response);
            } else if self.debug.contains(DebugLevel::BASIC) {
                log_shortened("RX:", response);
            }
        }
    }

    /// Gated command: registration check first, then the command.
    fn gated(&mut self, cmd: &str, timeout_ms: u32) -> Result<CommandStatus, Error> {
        match self.state {
            LinkState::Off => return Err(Error::NotPoweredOn),
            LinkState::NoResponse => {
                self.trace_line("modem not answering, refused:", cmd);
                return Err(Error::NoResponse);
            }
            _ => {}
        }
        if let Err(err) = self.check_cell_link() {
            self.trace_line("FAIL send cmd:", cmd);
            return Err(match err {
                Error::NotPoweredOn | Error::NoResponse => err,
                _ => Error::NoCellLink,
            });
        }
        if self.config.check_network_status {
            self.at(command::SOCKET_DIAL_QUERY, self.config.command_timeout_ms)?;
        }
        self.at(cmd, timeout_ms)
    }

    fn trace_line(&self, prefix: &str, line: &str) {
        if self.debug.contains(DebugLevel::VERBOSE) {
            debug!("{} {}", prefix, line);
        } else if self.debug.contains(DebugLevel::BASIC) {
            log_shortened(prefix, line);
        }
    }

    fn dump(&self, prefix: &str, data: &[u8]) {
        if !self.debug.contains(DebugLevel::DUMP) {
            return;
        }
        for (i, row) in data.chunks(16).enumerate() {
            let mut line: String<48> = String::new();
            // 16 bytes encode to 32 digits
            let _ = hex::encode_into(row, &mut line);
            debug!("{} {}: {}", prefix, i * 16, line.as_str());
        }
    }

    /// Send an arbitrary command and copy the response into `resp`.
    ///
    /// Returns the full response length; if that exceeds `resp.len()` the copy
    /// is truncated. Ungated.
    pub fn send_custom(&mut self, cmd: &str, resp: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        if resp.is_empty() {
            return Err(Error::InvalidParameter);
        }
        self.at(cmd, timeout_ms)?;
        let text = self.transport.response().as_bytes();
        let n = text.len().min(resp.len());
        resp[..n].copy_from_slice(&text[..n]);
        if text.len() > resp.len() {
            warn!("custom command response truncated to {} bytes", resp.len());
        }
        Ok(text.len())
    }

    /// `AT@PINGREQ` an address.
    pub fn ping_ip(&mut self, ip: &str) -> Result<(), Error> {
        if !command::is_ipv4_literal(ip) {
            return Err(Error::InvalidParameter);
        }
        let cmd = command::ping(ip)?;
        self.at(&cmd, self.config.ping_timeout_ms)?.into_result()
    }

    /// Resolve `host` and ping the result. Unlike [`resolve`](Self::resolve),
    /// nothing is recorded on the current socket.
    pub fn ping_url(&mut self, host: &str) -> Result<(), Error> {
        let ip = self.lookup(host)?;
        self.ping_ip(&ip)
    }

    /// Network time from `AT+CCLK?`.
    pub fn network_time(&mut self) -> Result<NetworkTime, Error> {
        self.at(command::CLOCK, self.config.command_timeout_ms)?.into_result()?;
        command::parse_time(self.transport.response()).ok_or(Error::InvalidResponse)
    }

    /// RSSI and bit error rate from `AT+CSQ`.
    pub fn signal(&mut self) -> Result<Signal, Error> {
        self.at(command::SIGNAL_QUALITY, self.config.command_timeout_ms)?
            .into_result()?;
        let signal = command::parse_signal(self.transport.response()).ok_or(Error::InvalidResponse)?;
        self.signal = Some(signal);
        Ok(signal)
    }

    /// Run every `AT%MEAS` report and hand each successful response to `sink`.
    ///
    /// Returns the number of reports delivered.
    pub fn signal_quality_log(&mut self, mut sink: impl FnMut(u8, &str)) -> Result<usize, Error> {
        let mut delivered = 0;
        for report in command::MEASUREMENT_REPORTS {
            let cmd = command::measurement(report)?;
            if self.at(&cmd, self.config.command_timeout_ms)? == CommandStatus::Ok {
                sink(report, self.transport.response());
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// SIM serial number.
    pub fn iccid(&mut self) -> Result<String<24>, Error> {
        self.at(command::ICCID, self.config.command_timeout_ms)?.into_result()?;
        let iccid = command::parse_iccid(self.transport.response()).ok_or(Error::InvalidResponse)?;
        String::try_from(iccid).map_err(|_| Error::InvalidResponse)
    }

    /// Phone-number equivalent the carrier's IoT SMS service uses.
    pub fn msisdn(&mut self) -> Result<String<16>, Error> {
        let iccid = self.iccid()?;
        sms::iccid_to_msisdn(&iccid).ok_or(Error::InvalidResponse)
    }

    /// Pseudo MAC address derived from the ICCID.
    pub fn mac_address(&mut self) -> Result<String<17>, Error> {
        let iccid = self.iccid()?;
        status::mac_from_iccid(&iccid).ok_or(Error::InvalidResponse)
    }

    /// Addresses of the data session.
    pub fn ip_stats(&mut self) -> Result<IpStats, Error> {
        self.at(command::CONTEXT_INFO, self.config.command_timeout_ms)?
            .into_result()?;
        let stats = command::parse_ip_stats(self.transport.response()).ok_or(Error::InvalidResponse)?;
        debug!(
            "ip {} mask {} gw {} dns {} / {}",
            stats.ip.as_str(),
            stats.mask.as_str(),
            stats.gateway.as_str(),
            stats.dns_primary.as_str(),
            stats.dns_secondary.as_str()
        );
        Ok(stats)
    }
}

/// Log `text`, keeping only the first and last 40 characters of long lines.
fn log_shortened(prefix: &str, text: &str) {
    if text.len() <= TRUNCATE_LOG_LEN || !text.is_ascii() {
        debug!("{} {}", prefix, text);
    } else {
        let half = TRUNCATE_LOG_LEN / 2;
        debug!("{} {}..{}", prefix, &text[..half], &text[text.len() - half..]);
    }
}
