//! # wnclink - WNC LTE modem driver
//!
//! A `no_std` driver for the WNC M14A2A / M18Q2 family of LTE data modules. The
//! modem has no native socket API on the host side: everything goes through a
//! half-duplex AT command channel with ad-hoc framing, hex-encoded payloads and
//! fragile timing. This crate turns that channel into something a network stack
//! adapter can use: TCP/UDP sockets, DNS, SMS and link supervision.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Modem API    socket_open / socket_send / socket_recv / sms_* │
//! ├───────────────────────┬──────────────────────────────────────┤
//! │ Socket table          │ I/O scheduler (tick driven)          │
//! ├───────────────────────┴──────────────────────────────────────┤
//! │ Command dispatcher    AT@SOCKWRITE, AT+CREG?, AT@DNSRESVDON  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Link state machine    Off → OnNoCellLink → On / NoResponse   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Line transport        CR/LF lines, OK / ERROR classification │
//! └──────────────────────────────────────────────────────────────┘
//!            │ network::Read + network::Write (UART)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wnclink::modem::{Config, Modem, Protocol};
//! # use wnclink::network::{Clock, PowerControl, Read, Write};
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
//! # struct Pins;
//! # impl PowerControl for Pins {
//! #     fn power_sequence(&mut self) {}
//! # }
//!
//! let mut modem = Modem::new(Uart, Timer, Pins, Config::default());
//! // modem.connect()?;
//! // let handle = modem.socket_open(Protocol::Tcp)?;
//! // modem.socket_connect(handle, "example.com", 80)?;
//! // loop { if let Some(delay) = modem.tick() { /* re-arm timer */ } }
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Route driver logging through `defmt`
//! - `log`: Route driver logging through the `log` facade

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Hardware seams the driver is generic over.
///
/// The UART is described by the [`network::Read`] and [`network::Write`]
/// traits, time by [`network::Clock`] and the power/reset pins by
/// [`network::PowerControl`].
pub mod network;

/// The modem controller: transport, command set, link supervision, sockets,
/// scheduler and SMS.
pub mod modem;

pub use modem::{Config, Error, Modem, SharedModem};
