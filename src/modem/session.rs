//! Socket operations of the controller: DNS, modem-side open/close and the
//! single-chunk read/write primitives the scheduler builds on.

use heapless::String;

use super::command;
use super::config::{MAX_HOSTNAME_LEN, MAX_SOCKETS};
use super::socket::{Notify, Protocol, Remote, SocketCallback, SocketHandle};
use super::status::{IpString, LinkState};
use super::transport::CommandStatus;
use super::{DebugLevel, Error, Modem, hex};
use crate::network::{Clock, PowerControl, Read, Write};

impl<S, C, P> Modem<S, C, P>
where
    S: Read + Write,
    C: Clock,
    P: PowerControl,
{
    /// Resolve `host` with `AT@DNSRESVDON`.
    ///
    /// The hostname and result are also recorded on the current socket, so a
    /// later reconnect can resolve it again. On failure the current socket's
    /// address is cleared.
    pub fn resolve(&mut self, host: &str) -> Result<IpString, Error> {
        let result = self.lookup(host);
        if matches!(result, Err(Error::InvalidParameter)) {
            return result;
        }

        if let Some(handle) = self.sockets.current() {
            if let Ok(session) = self.sockets.get_mut(handle) {
                session.url = String::try_from(host).ok();
                let port = session.remote.as_ref().map_or(0, |r| r.port);
                let ip = result.clone().unwrap_or_default();
                session.remote = Some(Remote { ip, port });
            }
        }
        result
    }

    /// `AT@DNSRESVDON` without touching any socket.
    pub(super) fn lookup(&mut self, host: &str) -> Result<IpString, Error> {
        if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
            return Err(Error::InvalidParameter);
        }
        let cmd = command::dns_resolve(host)?;
        let result = self
            .gated(&cmd, self.config.dns_timeout_ms)
            .and_then(CommandStatus::into_result)
            .and_then(|()| {
                command::parse_dns(self.transport.response())
                    .and_then(|ip| IpString::try_from(ip).ok())
                    .ok_or(Error::InvalidResponse)
            });

        match &result {
            Ok(ip) => debug!("{} resolved to {}", host, ip.as_str()),
            Err(err) => warn!("DNS lookup of {} failed: {}", host, err),
        }
        result
    }

    /// Claim a socket slot. Nothing is sent to the modem until
    /// [`socket_connect`](Self::socket_connect).
    pub fn socket_open(&mut self, protocol: Protocol) -> Result<SocketHandle, Error> {
        let handle = self.sockets.allocate(protocol)?;
        self.trace_driver("socket_open", handle);
        Ok(handle)
    }

    /// Connect the socket to `host`, which is either a dotted quad or a name
    /// to resolve. A socket that is already connected is closed first.
    pub fn socket_connect(&mut self, handle: SocketHandle, host: &str, port: u16) -> Result<(), Error> {
        self.sockets.select(handle)?;
        self.trace_driver("socket_connect", handle);

        let ip = if command::is_ipv4_literal(host) {
            self.sockets.get_mut(handle)?.url = None;
            IpString::try_from(host).map_err(|_| Error::InvalidParameter)?
        } else {
            self.resolve(host)?
        };
        self.sockets.bind_remote(handle, &ip, port)?;

        if self.sockets.get(handle)?.is_connected {
            self.close_modem_socket(handle)?;
        }
        self.open_modem_socket(handle)
    }

    /// Abort pending transfers, close the modem socket and free the slot.
    ///
    /// The slot is released even if the modem does not acknowledge the close.
    pub fn socket_close(&mut self, handle: SocketHandle) -> Result<(), Error> {
        let session = self.sockets.get_mut(handle)?;
        session.rx.abort();
        session.tx.abort();
        self.trace_driver("socket_close", handle);
        if let Err(err) = self.close_modem_socket(handle) {
            warn!("socket close not acknowledged: {}", err);
        }
        self.sockets.release(handle)
    }

    /// Attach a completion callback. `token` is handed back untouched.
    pub fn socket_attach(&mut self, handle: SocketHandle, callback: SocketCallback, token: usize) -> Result<(), Error> {
        self.sockets.get_mut(handle)?.notify = Some(Notify { callback, token });
        Ok(())
    }

    /// Retries of [`socket_read_blocking`](Self::socket_read_blocking).
    pub fn set_read_retries(&mut self, handle: SocketHandle, retries: u16) -> Result<(), Error> {
        self.sockets.get_mut(handle)?.read_retries = retries;
        Ok(())
    }

    /// Pause between retries of [`socket_read_blocking`](Self::socket_read_blocking).
    pub fn set_read_retry_wait(&mut self, handle: SocketHandle, wait_ms: u16) -> Result<(), Error> {
        self.sockets.get_mut(handle)?.read_retry_wait_ms = wait_ms;
        Ok(())
    }

    /// Change TCP/UDP before the socket connects.
    pub fn socket_set_protocol(&mut self, handle: SocketHandle, protocol: Protocol) -> Result<(), Error> {
        self.sockets.set_protocol(handle, protocol)
    }

    /// Listening sockets are not supported by the module.
    pub fn socket_bind(&mut self, handle: SocketHandle, _port: u16) -> Result<(), Error> {
        self.sockets.get(handle)?;
        Err(Error::Unsupported)
    }

    /// Listening sockets are not supported by the module.
    pub fn socket_listen(&mut self, handle: SocketHandle, _backlog: u8) -> Result<(), Error> {
        self.sockets.get(handle)?;
        Err(Error::Unsupported)
    }

    /// Listening sockets are not supported by the module.
    pub fn socket_accept(&mut self, handle: SocketHandle) -> Result<SocketHandle, Error> {
        self.sockets.get(handle)?;
        Err(Error::Unsupported)
    }

    /// Read with the retry loop of the socket (see
    /// [`set_read_retries`](Self::set_read_retries)), blocking until data
    /// arrives or the retries run out. Once data is found, reads continue
    /// without pausing until the modem has nothing more.
    pub fn socket_read_blocking(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            self.sockets.get(handle)?;
            return Ok(0);
        }
        self.sockets.select(handle)?;
        self.ensure_connected(handle)?;
        let (retries, wait_ms) = {
            let session = self.sockets.get(handle)?;
            (session.read_retries.max(1), session.read_retry_wait_ms)
        };

        let chunk = self.config.read_chunk();
        let mut total = 0;
        let mut tries = retries;
        while tries > 0 && total < buf.len() {
            tries -= 1;
            let want = (buf.len() - total).min(chunk);
            match self.read_chunk(handle, &mut buf[total..total + want]) {
                Ok(0) if total == 0 && tries > 0 => self.transport.delay_ms(u32::from(wait_ms)),
                Ok(0) => {}
                Ok(n) => {
                    total += n;
                    tries = 1;
                }
                Err(Error::SocketReset) if total > 0 => break,
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    /// Make sure the modem side of `handle` is usable, reopening it if the
    /// modem dropped it.
    pub(super) fn ensure_connected(&mut self, handle: SocketHandle) -> Result<(), Error> {
        let session = self.sockets.get(handle)?;
        let (needs_reopen, connected) = (session.needs_reopen, session.is_connected);
        if needs_reopen {
            self.reopen(handle)
        } else if connected {
            Ok(())
        } else {
            Err(Error::SocketNotConnected)
        }
    }

    /// `AT@SOCKCREAT` followed by `AT@SOCKCONN` to the stored remote.
    pub(super) fn open_modem_socket(&mut self, handle: SocketHandle) -> Result<(), Error> {
        let (protocol, remote) = {
            let session = self.sockets.get(handle)?;
            (session.protocol, session.remote.clone())
        };
        let remote = remote.ok_or(Error::InvalidParameter)?;
        if !command::is_ipv4_literal(&remote.ip) {
            return Err(Error::InvalidParameter);
        }

        let cmd = command::socket_create(protocol)?;
        self.gated(&cmd, self.config.command_timeout_ms)?.into_result()?;
        let id = command::parse_socket_id(self.transport.response())
            .filter(|id| (1..=MAX_SOCKETS as u8).contains(id))
            .ok_or(Error::InvalidResponse)?;

        let secs = command::clamp_socket_timeout(self.config.socket_timeout_secs);
        let cmd = command::socket_connect(id, &remote.ip, remote.port, secs)?;
        let outcome = self
            .gated(&cmd, u32::from(secs) * 1000 + 1000)
            .and_then(CommandStatus::into_result);

        if let Err(err) = outcome {
            warn!("connect to {}:{} failed: {}", remote.ip.as_str(), remote.port, err);
            if self.state != LinkState::NoResponse {
                let _ = self.close_id(id);
            }
            return Err(err);
        }

        let session = self.sockets.get_mut(handle)?;
        session.modem_id = id;
        session.is_connected = true;
        session.needs_reopen = false;
        debug!("socket {} connected to {}:{}", id, remote.ip.as_str(), remote.port);
        Ok(())
    }

    /// Close the modem side of `handle`, if there is one. The session is
    /// marked disconnected whatever the modem says.
    pub(super) fn close_modem_socket(&mut self, handle: SocketHandle) -> Result<(), Error> {
        let session = self.sockets.get_mut(handle)?;
        let id = session.modem_id;
        session.modem_id = 0;
        session.is_connected = false;
        if id == 0 {
            return Ok(());
        }
        self.close_id(id)
    }

    /// `AT@SOCKCLOSE`, retried on error answers.
    fn close_id(&mut self, id: u8) -> Result<(), Error> {
        let cmd = command::socket_close(id)?;
        let mut last = CommandStatus::GenericError;
        for _ in 0..=self.config.close_retries {
            last = self.at(&cmd, self.config.command_timeout_ms)?;
            match last {
                CommandStatus::Ok | CommandStatus::Timeout => break,
                _ => debug!("close of socket {} refused, retrying", id),
            }
        }
        last.into_result()
    }

    /// Close and reconnect after the modem dropped the socket, resolving the
    /// hostname again if it was connected by name.
    fn reopen(&mut self, handle: SocketHandle) -> Result<(), Error> {
        for attempt in 0..self.config.reopen_attempts {
            info!("reopening socket, attempt {}", attempt + 1);
            let _ = self.close_modem_socket(handle);

            let url = self.sockets.select(handle)?.url.clone();
            if let Some(url) = url {
                if let Err(err) = self.resolve(&url) {
                    if matches!(err, Error::NoResponse | Error::NotPoweredOn) {
                        return Err(err);
                    }
                    continue;
                }
            }

            match self.open_modem_socket(handle) {
                Ok(()) => return Ok(()),
                Err(err @ (Error::NoResponse | Error::NotPoweredOn)) => return Err(err),
                Err(_) => {}
            }
        }
        Err(Error::SocketReset)
    }

    /// Flag a socket the modem reported a fatal error on.
    fn mark_reset(&mut self, handle: SocketHandle) {
        if let Ok(session) = self.sockets.get_mut(handle) {
            warn!("modem dropped socket {}", session.modem_id);
            session.is_connected = false;
            session.needs_reopen = true;
        }
    }

    /// One `AT@SOCKWRITE` of `data`, which must fit a single chunk.
    pub(super) fn write_chunk(&mut self, handle: SocketHandle, data: &[u8]) -> Result<usize, Error> {
        let id = self.sockets.get(handle)?.modem_id;
        self.dump("TX", data);
        let cmd = command::socket_write(id, data)?;
        match self.gated(&cmd, self.config.command_timeout_ms)? {
            CommandStatus::Ok => Ok(data.len()),
            CommandStatus::Timeout => Err(Error::NoResponse),
            CommandStatus::GenericError => Err(Error::CommandFailed),
            CommandStatus::ExtendedError | CommandStatus::CmeError => {
                self.mark_reset(handle);
                Err(Error::SocketReset)
            }
        }
    }

    /// One `AT@SOCKREAD` of up to `out.len()` bytes. `Ok(0)` when the modem has
    /// nothing buffered.
    pub(super) fn read_chunk(&mut self, handle: SocketHandle, out: &mut [u8]) -> Result<usize, Error> {
        let id = self.sockets.get(handle)?.modem_id;
        let cmd = command::socket_read(id, out.len())?;
        match self.at(&cmd, self.config.command_timeout_ms)? {
            CommandStatus::Ok => {}
            CommandStatus::Timeout => return Err(Error::NoResponse),
            CommandStatus::GenericError => return Ok(0),
            CommandStatus::ExtendedError | CommandStatus::CmeError => {
                self.mark_reset(handle);
                return Err(Error::SocketReset);
            }
        }

        let payload = command::parse_read_payload(self.transport.response());
        if payload.len() % 2 == 1 {
            warn!("odd hex digit count {} from SOCKREAD", payload.len());
        }
        let n = hex::decode(payload, out);
        if n < payload.len() / 2 && n < out.len() {
            warn!("SOCKREAD payload not hex after {} bytes", n);
        }
        self.dump("RX", &out[..n]);
        Ok(n)
    }

    pub(super) fn trace_driver(&self, op: &str, handle: SocketHandle) {
        if self.debug.contains(DebugLevel::DRIVER) {
            debug!("{} slot {}", op, handle.index());
        }
    }
}
