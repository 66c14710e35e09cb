//! Socket session table.
//!
//! The modem numbers its own sockets 1..=5 and hands out a number per
//! `AT@SOCKCREAT`. The driver keeps a fixed table of application-level slots,
//! each of which may or may not currently own a modem socket:
//!
//! ```text
//!  slot  open  connected  modem id  remote              generation
//!  0     yes   yes        3         93.184.216.34:80    4
//!  1     yes   no         0         -                   1
//!  2     no    no         0         -                   7
//! ```
//!
//! A [`SocketHandle`] names a slot *and* the generation it was allocated in;
//! releasing a slot bumps the generation so stale handles are rejected.

use heapless::{String, Vec};

use super::Error;
use super::config::{MAX_HOSTNAME_LEN, MAX_SOCKETS, SOCKET_BUFFER_SIZE};
use super::status::IpString;

/// Transport protocol of a socket.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum Protocol {
    /// Stream socket.
    #[default]
    Tcp,
    /// Datagram socket.
    Udp,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Protocol {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Protocol::Tcp => defmt::write!(f, "Tcp"),
            Protocol::Udp => defmt::write!(f, "Udp"),
        }
    }
}

/// Application-level socket handle.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct SocketHandle {
    index: u8,
    generation: u16,
}

impl SocketHandle {
    /// Slot index in the table.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SocketHandle {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "#{}/{}", self.index, self.generation)
    }
}

/// Completion notification: the handle and the token given to
/// [`Modem::socket_attach`](super::Modem::socket_attach).
pub type SocketCallback = fn(SocketHandle, usize);

/// A callback together with its opaque user token.
#[derive(Debug, Clone, Copy)]
pub struct Notify {
    /// Function to call.
    pub callback: SocketCallback,
    /// Passed through untouched.
    pub token: usize,
}

/// Remote endpoint of a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    /// Dotted-quad address.
    pub ip: IpString,
    /// Port.
    pub port: u16,
}

/// State of one direction of a non-blocking transfer.
///
/// `Idle → Starting → Active → Complete → Idle`, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoState {
    /// No transfer.
    #[default]
    Idle,
    /// Accepted, waiting for the first tick.
    Starting,
    /// Chunks in progress.
    Active,
    /// Done; the next call collects the result.
    Complete(Result<usize, Error>),
}

impl IoState {
    /// True while the scheduler still has work for this direction.
    pub fn is_pending(&self) -> bool {
        matches!(self, IoState::Starting | IoState::Active)
    }
}

/// Bookkeeping of one in-flight transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transfer {
    /// Bytes requested (receive) or accepted (send).
    pub requested: usize,
    /// Bytes moved so far.
    pub done: usize,
    /// Chunk operations still outstanding.
    pub chunks_left: usize,
    /// Consecutive ticks without data (receive only).
    pub idle_ticks: u32,
    /// Idle ticks after which a receive completes.
    pub timeout_ticks: u32,
    /// Captured at start, fired once on completion.
    pub notify: Option<Notify>,
}

impl Transfer {
    /// Set up a transfer of `len` bytes in chunks of `chunk`.
    pub fn new(len: usize, chunk: usize, timeout_ticks: u32, notify: Option<Notify>) -> Self {
        Self {
            requested: len,
            done: 0,
            chunks_left: len.div_ceil(chunk.max(1)),
            idle_ticks: 0,
            timeout_ticks,
            notify,
        }
    }

    /// Bytes still to move.
    pub fn remaining(&self) -> usize {
        self.requested - self.done
    }
}

/// One direction of a socket: state plus staging buffer.
#[derive(Debug, Default)]
pub struct Channel {
    /// Where the transfer is.
    pub state: IoState,
    /// Counters of the current transfer.
    pub transfer: Transfer,
    /// Data staged for sending, or received so far.
    pub buffer: Vec<u8, SOCKET_BUFFER_SIZE>,
}

impl Channel {
    /// Abort whatever is in flight and return to `Idle`.
    pub fn abort(&mut self) {
        self.state = IoState::Idle;
        self.transfer = Transfer::default();
        self.buffer.clear();
    }
}

/// Default `AT@SOCKREAD` retries of [`Modem::socket_read_blocking`](super::Modem::socket_read_blocking).
pub const DEFAULT_READ_RETRIES: u16 = 25;
/// Default pause between those retries.
pub const DEFAULT_READ_RETRY_WAIT_MS: u16 = 30;

/// One slot of the table.
#[derive(Debug)]
pub struct Session {
    /// Socket number assigned by the modem, 0 when none.
    pub modem_id: u8,
    /// Slot allocated by `socket_open`.
    pub is_open: bool,
    /// Modem-side socket created and connected.
    pub is_connected: bool,
    /// TCP or UDP.
    pub protocol: Protocol,
    /// Where the socket connects.
    pub remote: Option<Remote>,
    /// Hostname to resolve again on reconnect.
    pub url: Option<String<MAX_HOSTNAME_LEN>>,
    /// Retries of a blocking read.
    pub read_retries: u16,
    /// Pause between blocking read retries.
    pub read_retry_wait_ms: u16,
    /// Notification attached by the application.
    pub notify: Option<Notify>,
    /// The modem dropped the socket; reconnect before the next transfer.
    pub needs_reopen: bool,
    /// Receive direction.
    pub rx: Channel,
    /// Send direction.
    pub tx: Channel,
    generation: u16,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            modem_id: 0,
            is_open: false,
            is_connected: false,
            protocol: Protocol::Tcp,
            remote: None,
            url: None,
            read_retries: DEFAULT_READ_RETRIES,
            read_retry_wait_ms: DEFAULT_READ_RETRY_WAIT_MS,
            notify: None,
            needs_reopen: false,
            rx: Channel::default(),
            tx: Channel::default(),
            generation: 0,
        }
    }
}

impl Session {
    /// Restore every field to its default, keeping the generation.
    pub fn reset(&mut self) {
        let generation = self.generation;
        *self = Session {
            generation,
            ..Session::default()
        };
    }

    /// True when every field holds its unopened default.
    pub fn is_pristine(&self) -> bool {
        self.modem_id == 0
            && !self.is_open
            && !self.is_connected
            && self.protocol == Protocol::Tcp
            && self.remote.is_none()
            && self.url.is_none()
            && self.read_retries == DEFAULT_READ_RETRIES
            && self.read_retry_wait_ms == DEFAULT_READ_RETRY_WAIT_MS
            && self.notify.is_none()
            && !self.needs_reopen
            && self.rx.state == IoState::Idle
            && self.tx.state == IoState::Idle
            && self.rx.buffer.is_empty()
            && self.tx.buffer.is_empty()
    }
}

/// Fixed table of [`MAX_SOCKETS`] sessions.
#[derive(Debug, Default)]
pub struct SocketTable {
    slots: [Session; MAX_SOCKETS],
    current: Option<u8>,
}

impl SocketTable {
    /// All slots free.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the first free slot for `protocol` and make it current.
    pub fn allocate(&mut self, protocol: Protocol) -> Result<SocketHandle, Error> {
        let index = self
            .slots
            .iter()
            .position(|s| !s.is_open)
            .ok_or(Error::NoFreeSocketSlot)?;
        let session = &mut self.slots[index];
        session.reset();
        session.is_open = true;
        session.protocol = protocol;
        self.current = Some(index as u8);
        Ok(SocketHandle {
            index: index as u8,
            generation: session.generation,
        })
    }

    /// Free the slot behind `handle` and invalidate the handle.
    pub fn release(&mut self, handle: SocketHandle) -> Result<(), Error> {
        self.get_mut(handle)?;
        let session = &mut self.slots[handle.index()];
        session.reset();
        session.generation = session.generation.wrapping_add(1);
        if self.current == Some(handle.index) {
            self.current = None;
        }
        Ok(())
    }

    /// Record where the socket should connect.
    pub fn bind_remote(&mut self, handle: SocketHandle, ip: &str, port: u16) -> Result<(), Error> {
        let ip = IpString::try_from(ip).map_err(|_| Error::InvalidParameter)?;
        self.get_mut(handle)?.remote = Some(Remote { ip, port });
        Ok(())
    }

    /// Change the protocol of an allocated slot.
    pub fn set_protocol(&mut self, handle: SocketHandle, protocol: Protocol) -> Result<(), Error> {
        self.get_mut(handle)?.protocol = protocol;
        Ok(())
    }

    /// Session behind a live handle.
    pub fn get(&self, handle: SocketHandle) -> Result<&Session, Error> {
        let session = self.slots.get(handle.index()).ok_or(Error::BadSocketHandle)?;
        if session.generation != handle.generation {
            return Err(Error::BadSocketHandle);
        }
        if !session.is_open {
            return Err(Error::SocketNotOpen);
        }
        Ok(session)
    }

    /// Mutable session behind a live handle.
    pub fn get_mut(&mut self, handle: SocketHandle) -> Result<&mut Session, Error> {
        let session = self
            .slots
            .get_mut(handle.index())
            .ok_or(Error::BadSocketHandle)?;
        if session.generation != handle.generation {
            return Err(Error::BadSocketHandle);
        }
        if !session.is_open {
            return Err(Error::SocketNotOpen);
        }
        Ok(session)
    }

    /// Look up `handle` and make it the current socket.
    pub fn select(&mut self, handle: SocketHandle) -> Result<&mut Session, Error> {
        self.get_mut(handle)?;
        self.current = Some(handle.index);
        Ok(&mut self.slots[handle.index()])
    }

    /// Handle of the socket most recently used, if still open.
    pub fn current(&self) -> Option<SocketHandle> {
        let index = self.current?;
        let session = &self.slots[index as usize];
        session.is_open.then_some(SocketHandle {
            index,
            generation: session.generation,
        })
    }

    /// Raw slot access, for inspection.
    pub fn slot(&self, index: usize) -> Option<&Session> {
        self.slots.get(index)
    }

    /// Handle of an open slot.
    pub fn handle_at(&self, index: usize) -> Option<SocketHandle> {
        let session = self.slots.get(index)?;
        session.is_open.then_some(SocketHandle {
            index: index as u8,
            generation: session.generation,
        })
    }

    /// Allocated slots.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_open).count()
    }

    /// Slots with a modem-side connection.
    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_connected).count()
    }

    /// True if any direction of any socket has work for the scheduler.
    pub fn has_pending(&self) -> bool {
        self.slots
            .iter()
            .any(|s| s.rx.state.is_pending() || s.tx.state.is_pending())
    }
}
