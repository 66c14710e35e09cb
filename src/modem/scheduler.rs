//! Non-blocking socket I/O.
//!
//! `socket_send` and `socket_recv` never talk to the modem themselves. The
//! first call queues a transfer and returns [`Error::WouldBlock`]; every
//! [`Modem::tick`] then moves one chunk per direction per socket:
//!
//! ```text
//!  recv(buf)          tick            tick            tick        recv(buf)
//!  Idle ─▶ Starting ─▶ Active ──────▶ Active ──────▶ Complete ─▶ Idle
//!          WouldBlock  SOCKREAD ≤C    SOCKREAD ≤C    callback     data
//! ```
//!
//! A receive completes when all `ceil(L / C)` chunks are in, the requested
//! length is satisfied, or [`Config::read_timeout_ticks`] ticks in a row
//! brought nothing. A send completes when every chunk is written. A transport
//! timeout ends the transfer at once with [`Error::NoResponse`].
//!
//! [`Config::read_timeout_ticks`]: super::Config::read_timeout_ticks

use super::config::{MAX_READ_BYTES, MAX_SOCKETS, MAX_WRITE_BYTES, SOCKET_BUFFER_SIZE};
use super::socket::{IoState, Remote, SocketHandle, Transfer};
use super::{DebugLevel, Error, Modem};
use crate::network::{Clock, PowerControl, Read, Write};

/// Which half of a socket a step works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Rx,
    Tx,
}

impl<S, C, P> Modem<S, C, P>
where
    S: Read + Write,
    C: Clock,
    P: PowerControl,
{
    /// Queue or collect a send.
    ///
    /// While idle, up to [`SOCKET_BUFFER_SIZE`] bytes of `data` are copied and
    /// `WouldBlock` is returned. Once the scheduler is done the next call
    /// returns the number of bytes sent (and ignores its `data`).
    pub fn socket_send(&mut self, handle: SocketHandle, data: &[u8]) -> Result<usize, Error> {
        let state = self.sockets.select(handle)?.tx.state;
        if self.debug.contains(DebugLevel::DRIVER) {
            debug!("socket_send slot {} len {}", handle.index(), data.len());
        }
        match state {
            IoState::Idle => {
                if data.is_empty() {
                    return Ok(0);
                }
                self.ensure_connected(handle)?;
                let chunk = self.config.write_chunk();
                let session = self.sockets.get_mut(handle)?;
                let len = data.len().min(SOCKET_BUFFER_SIZE);
                session.tx.buffer.clear();
                session
                    .tx
                    .buffer
                    .extend_from_slice(&data[..len])
                    .map_err(|_| Error::BufferOverflow)?;
                session.tx.transfer = Transfer::new(len, chunk, 0, session.notify);
                session.tx.state = IoState::Starting;
                Err(Error::WouldBlock)
            }
            IoState::Starting | IoState::Active => Err(Error::WouldBlock),
            IoState::Complete(result) => {
                self.sockets.get_mut(handle)?.tx.abort();
                result
            }
        }
    }

    /// Queue or collect a receive.
    ///
    /// While idle, a transfer of up to `buf.len()` bytes (capped at
    /// [`SOCKET_BUFFER_SIZE`]) is queued and `WouldBlock` is returned. Once the
    /// scheduler is done the next call copies what arrived into `buf`, which
    /// may be nothing if the modem stayed silent. Whatever does not fit in
    /// `buf` is returned by the following calls before a new receive is
    /// queued.
    pub fn socket_recv(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize, Error> {
        let state = self.sockets.select(handle)?.rx.state;
        if self.debug.contains(DebugLevel::DRIVER) {
            debug!("socket_recv slot {} len {}", handle.index(), buf.len());
        }
        match state {
            IoState::Idle => {
                if buf.is_empty() {
                    return Ok(0);
                }
                self.ensure_connected(handle)?;
                let chunk = self.config.read_chunk();
                let timeout_ticks = self.config.read_timeout_ticks();
                let session = self.sockets.get_mut(handle)?;
                let len = buf.len().min(SOCKET_BUFFER_SIZE);
                session.rx.buffer.clear();
                session.rx.transfer = Transfer::new(len, chunk, timeout_ticks, session.notify);
                session.rx.state = IoState::Starting;
                Err(Error::WouldBlock)
            }
            IoState::Starting | IoState::Active => Err(Error::WouldBlock),
            IoState::Complete(result) => {
                let session = self.sockets.get_mut(handle)?;
                let received = session.rx.buffer.len();
                let n = received.min(buf.len());
                buf[..n].copy_from_slice(&session.rx.buffer[..n]);
                if result.is_ok() && n < received {
                    // keep the rest for the next call
                    session.rx.buffer.copy_within(n.., 0);
                    session.rx.buffer.truncate(received - n);
                    debug!("{} received bytes left for the next recv", received - n);
                } else {
                    session.rx.abort();
                }
                result.map(|_| n)
            }
        }
    }

    /// [`socket_send`](Self::socket_send) to `host:port`, connecting first if
    /// the socket is not already connected there.
    pub fn socket_sendto(&mut self, handle: SocketHandle, host: &str, port: u16, data: &[u8]) -> Result<usize, Error> {
        let session = self.sockets.select(handle)?;
        let connected_there = session.is_connected
            && session.remote.as_ref().is_some_and(|r| r.port == port)
            && (session.remote.as_ref().is_some_and(|r| r.ip.as_str() == host)
                || session.url.as_deref() == Some(host));
        if !connected_there && !session.tx.state.is_pending() {
            self.socket_connect(handle, host, port)?;
        }
        self.socket_send(handle, data)
    }

    /// [`socket_recv`](Self::socket_recv) that also reports the peer. A socket
    /// with a stored remote but no modem-side connection is connected first.
    pub fn socket_recvfrom(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<(usize, Remote), Error> {
        let session = self.sockets.select(handle)?;
        let remote = session.remote.clone().ok_or(Error::SocketNotConnected)?;
        if !session.is_connected && !session.needs_reopen && session.rx.state == IoState::Idle {
            self.open_modem_socket(handle)?;
        }
        let n = self.socket_recv(handle, buf)?;
        Ok((n, remote))
    }

    /// Run one scheduler period.
    ///
    /// Moves one chunk per pending direction per socket and polls for SMS when
    /// due. Returns the delay after which `tick` wants to run again, or `None`
    /// when there is nothing left to do.
    pub fn tick(&mut self) -> Option<u32> {
        for index in 0..MAX_SOCKETS {
            if let Some(handle) = self.sockets.handle_at(index) {
                self.step(handle, Direction::Tx);
                self.step(handle, Direction::Rx);
            }
        }
        let sms_delay = self.sms_tick();

        if self.sockets.has_pending() {
            Some(self.config.tick_ms)
        } else {
            sms_delay
        }
    }

    fn step(&mut self, handle: SocketHandle, direction: Direction) {
        let Ok(session) = self.sockets.get_mut(handle) else {
            return;
        };
        let needs_reopen = session.needs_reopen;
        let channel = match direction {
            Direction::Rx => &mut session.rx,
            Direction::Tx => &mut session.tx,
        };
        match channel.state {
            IoState::Starting => channel.state = IoState::Active,
            IoState::Active => {}
            _ => return,
        }

        if needs_reopen {
            let done = channel.transfer.done;
            let result = match direction {
                Direction::Rx if done > 0 => Ok(done),
                _ => Err(Error::SocketReset),
            };
            self.complete(handle, direction, result);
            return;
        }

        let outcome = match direction {
            Direction::Rx => self.step_rx(handle),
            Direction::Tx => self.step_tx(handle),
        };
        if let Some(result) = outcome {
            self.complete(handle, direction, result);
        }
    }

    /// One `SOCKREAD`; `Some` when the receive is finished.
    fn step_rx(&mut self, handle: SocketHandle) -> Option<Result<usize, Error>> {
        let want = {
            let session = self.sockets.get(handle).ok()?;
            session.rx.transfer.remaining().min(self.config.read_chunk())
        };
        let mut chunk = [0u8; MAX_READ_BYTES];
        let outcome = self.read_chunk(handle, &mut chunk[..want]);

        let session = self.sockets.get_mut(handle).ok()?;
        if session.rx.state != IoState::Active {
            return None;
        }
        let transfer = &mut session.rx.transfer;
        match outcome {
            Ok(0) => {
                transfer.idle_ticks += 1;
                (transfer.idle_ticks >= transfer.timeout_ticks).then_some(Ok(transfer.done))
            }
            Ok(n) => {
                if session.rx.buffer.extend_from_slice(&chunk[..n]).is_err() {
                    return Some(Err(Error::BufferOverflow));
                }
                transfer.done += n;
                transfer.chunks_left = transfer.chunks_left.saturating_sub(1);
                transfer.idle_ticks = 0;
                (transfer.chunks_left == 0 || transfer.done >= transfer.requested).then_some(Ok(transfer.done))
            }
            Err(Error::SocketReset) if transfer.done > 0 => Some(Ok(transfer.done)),
            Err(err) => Some(Err(err)),
        }
    }

    /// One `SOCKWRITE`; `Some` when the send is finished.
    fn step_tx(&mut self, handle: SocketHandle) -> Option<Result<usize, Error>> {
        let mut chunk = [0u8; MAX_WRITE_BYTES];
        let len = {
            let session = self.sockets.get(handle).ok()?;
            let transfer = &session.tx.transfer;
            let len = transfer.remaining().min(self.config.write_chunk());
            chunk[..len].copy_from_slice(&session.tx.buffer[transfer.done..transfer.done + len]);
            len
        };
        let outcome = self.write_chunk(handle, &chunk[..len]);

        let session = self.sockets.get_mut(handle).ok()?;
        if session.tx.state != IoState::Active {
            return None;
        }
        let transfer = &mut session.tx.transfer;
        match outcome {
            Ok(n) => {
                transfer.done += n;
                transfer.chunks_left = transfer.chunks_left.saturating_sub(1);
                (transfer.chunks_left == 0 || transfer.done >= transfer.requested).then_some(Ok(transfer.done))
            }
            Err(err) => Some(Err(err)),
        }
    }

    /// Park the result and fire the callback captured at start, once.
    fn complete(&mut self, handle: SocketHandle, direction: Direction, result: Result<usize, Error>) {
        let Ok(session) = self.sockets.get_mut(handle) else {
            return;
        };
        let channel = match direction {
            Direction::Rx => &mut session.rx,
            Direction::Tx => &mut session.tx,
        };
        channel.state = IoState::Complete(result);
        let notify = channel.transfer.notify.take();
        if let Err(err) = result {
            debug!("{} on slot {} ended: {}", direction.label(), handle.index(), err);
        }
        if let Some(notify) = notify {
            (notify.callback)(handle, notify.token);
        }
    }
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Rx => "receive",
            Direction::Tx => "send",
        }
    }
}
