//! Hardware abstraction for the modem driver.
//!
//! The driver never touches a peripheral directly. A board support crate
//! provides:
//!
//! - a UART implementing [`Read`] and [`Write`]. `read` must not block: it
//!   returns `Ok(0)` when no byte is pending.
//! - a [`Clock`] giving monotonic milliseconds and a sleep.
//! - a [`PowerControl`] that runs the GPIO bring-up of the module.

#![deny(unsafe_code)]

/// Coarse error codes reported to a network stack adapter.
pub mod error;

/// Re-exports of the hardware traits
pub mod prelude {
    pub use super::{Clock, PowerControl, Read, Write};
}

/// Byte source of the modem UART.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read whatever is pending into `buf`, returning `Ok(0)` if nothing is.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte sink of the modem UART.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the UART
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Monotonic time source.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. Must never go backwards.
    fn now_ms(&self) -> u64;
    /// Sleep for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Power and reset lines of the module.
///
/// Called once per [`power_on`](crate::modem::Modem::power_on) before the
/// driver starts polling for `OK`.
pub trait PowerControl {
    /// Drive the power-up sequence (shutdown, power-on, reset, level shifter
    /// enable, ...). Must return once the pins are in their run state.
    fn power_sequence(&mut self);
}

/// Boards whose modem is always powered.
impl PowerControl for () {
    fn power_sequence(&mut self) {}
}
