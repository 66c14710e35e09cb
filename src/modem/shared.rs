use spin::Mutex;

use super::{Error, Modem};
use crate::network::{Clock, PowerControl, Read, Write};

/// A [`Modem`] behind a single spin lock.
///
/// The foreground code and whatever drives [`tick`](Modem::tick) (a timer
/// interrupt, a second thread) each take the lock for one operation, so AT
/// exchanges from different contexts never interleave on the UART.
///
/// ```rust
/// # use wnclink::network::{Clock, Read, Write};
/// # use wnclink::modem::{Config, Modem, SharedModem};
/// # struct Uart;
/// # impl Read for Uart {
/// #     type Error = ();
/// #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
/// # }
/// # impl Write for Uart {
/// #     type Error = ();
/// #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
/// #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
/// # }
/// # struct Timer;
/// # impl Clock for Timer {
/// #     fn now_ms(&self) -> u64 { 0 }
/// #     fn delay_ms(&mut self, _ms: u32) {}
/// # }
/// let modem = SharedModem::new(Modem::new(Uart, Timer, (), Config::default()));
/// assert!(!modem.with(|m| m.registered()));
/// assert_eq!(modem.tick(), None);
/// ```
#[derive(Debug)]
pub struct SharedModem<S, C, P> {
    inner: Mutex<Modem<S, C, P>>,
}

impl<S, C, P> SharedModem<S, C, P>
where
    S: Read + Write,
    C: Clock,
    P: PowerControl,
{
    /// Wrap a modem.
    pub const fn new(modem: Modem<S, C, P>) -> Self {
        Self {
            inner: Mutex::new(modem),
        }
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut Modem<S, C, P>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Like [`with`](Self::with), but gives up instead of spinning when the
    /// modem is busy.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut Modem<S, C, P>) -> R) -> Result<R, Error> {
        let mut guard = self.inner.try_lock().ok_or(Error::WouldBlock)?;
        Ok(f(&mut guard))
    }

    /// Lock for a sequence of operations.
    pub fn lock(&self) -> spin::MutexGuard<'_, Modem<S, C, P>> {
        self.inner.lock()
    }

    /// One scheduler period, see [`Modem::tick`].
    pub fn tick(&self) -> Option<u32> {
        self.with(Modem::tick)
    }

    /// Unwrap the modem.
    pub fn into_inner(self) -> Modem<S, C, P> {
        self.inner.into_inner()
    }
}
