//! Power-up, init handshake and registration checks.

use super::command;
use super::config::{DEFAULT_APN, MAX_APN_LEN};
use super::status::{IpStats, LinkState};
use super::transport::{CommandStatus, Terminator};
use super::{Error, Modem};
use crate::network::{Clock, PowerControl, Read, Write};

/// Timeout of each `AT` poll while the module boots.
const BOOT_POLL_TIMEOUT_MS: u32 = 500;
/// Sleep between boot polls.
const BOOT_POLL_PAUSE_MS: u32 = 500;
/// Quiet time after `AT@DMREBOOT` before polling.
const REBOOT_SETTLE_MS: u32 = 5_000;
/// Pause between init handshake attempts.
const INIT_RETRY_PAUSE_MS: u32 = 1_000;

impl<S, C, P> Modem<S, C, P>
where
    S: Read + Write,
    C: Clock,
    P: PowerControl,
{
    /// Check SIM and registration (`AT+CSQ`, `AT+CPIN?`, `AT+CREG?`).
    ///
    /// Updates `sms_ready` and, on success, moves the link to
    /// [`LinkState::On`]. Returns [`Error::NoCellLink`] if the SIM is not
    /// ready or the modem is not registered for data, [`Error::NoResponse`]
    /// if a query timed out.
    pub fn check_cell_link(&mut self) -> Result<(), Error> {
        if self.state == LinkState::Off {
            return Err(Error::NotPoweredOn);
        }
        self.state = LinkState::OnNoCellLink;
        self.sms_ready = false;
        let timeout = self.config.quick_command_timeout_ms;

        match self.at(command::SIGNAL_QUALITY, timeout)? {
            CommandStatus::Timeout => return Err(Error::NoResponse),
            CommandStatus::Ok => {
                self.signal = command::parse_signal(self.transport.response());
            }
            _ => {}
        }

        if self.at(command::SIM_STATUS, timeout)? == CommandStatus::Timeout {
            return Err(Error::NoResponse);
        }
        if !self.transport.response().contains("CPIN: READY") {
            warn!("SIM not ready");
            return Err(Error::NoCellLink);
        }

        if self.at(command::REGISTRATION, timeout)? == CommandStatus::Timeout {
            return Err(Error::NoResponse);
        }
        let stat = command::parse_registration(self.transport.response()).unwrap_or(0);
        self.sms_ready = matches!(stat, 1 | 5 | 6 | 7);
        if !matches!(stat, 1 | 5) {
            debug!("not registered for data, CREG stat {}", stat);
            return Err(Error::NoCellLink);
        }

        self.state = LinkState::On;
        Ok(())
    }

    /// Power the module, run the init handshake and apply `apn`.
    ///
    /// `timeout_secs` bounds the wait for the first `OK` after the power
    /// sequence. Any failure leaves the link [`LinkState::Off`].
    pub fn power_on(&mut self, apn: &str, timeout_secs: u8) -> Result<(), Error> {
        info!("powering on modem");
        self.state = LinkState::OnNoCellLink;
        self.power.power_sequence();

        if !self.wait_for_response(timeout_secs)? {
            error!("modem did not answer within {} s", timeout_secs);
            self.state = LinkState::Off;
            return Err(Error::PowerOnFailed);
        }

        if let Err(err) = self.software_init() {
            error!("modem init failed: {}", err);
            self.state = LinkState::Off;
            return Err(Error::InitFailed);
        }

        if let Err(err) = self.set_apn(apn) {
            self.state = LinkState::Off;
            return Err(err);
        }
        info!("modem ready");
        Ok(())
    }

    /// Poll `AT` once a second until it answers `OK`.
    fn wait_for_response(&mut self, timeout_secs: u8) -> Result<bool, Error> {
        for _ in 0..timeout_secs {
            if self.raw(command::AT, Terminator::CrLf, BOOT_POLL_TIMEOUT_MS)? == CommandStatus::Ok {
                return Ok(true);
            }
            self.transport.delay_ms(BOOT_POLL_PAUSE_MS);
        }
        Ok(false)
    }

    /// Registration check, then the init handshake with retries and one more
    /// try after a reboot. A module without a cell link is not rebooted.
    fn software_init(&mut self) -> Result<(), Error> {
        self.check_cell_link()?;

        for attempt in 0..self.config.init_retries {
            match self.init_handshake() {
                Ok(()) => return Ok(()),
                Err(err) => debug!("init attempt {} failed: {}", attempt + 1, err),
            }
            self.transport.delay_ms(INIT_RETRY_PAUSE_MS);
        }

        warn!("init retries exhausted, rebooting modem");
        if !self.reinitialize()? {
            return Err(Error::InitFailed);
        }
        self.init_handshake()
    }

    fn init_handshake(&mut self) -> Result<(), Error> {
        let timeout = self.config.quick_command_timeout_ms;
        for cmd in [
            command::AT,
            command::AT,
            command::FIRMWARE_VERSION,
            command::ECHO_OFF,
            command::VERBOSE_ERRORS,
            command::SMS_TEXT_MODE,
            command::SMS_STORAGE_SIM,
        ] {
            self.at(cmd, timeout)?;
        }

        self.heartbeat()?;

        let timeout = self.config.command_timeout_ms;
        for cmd in [command::NOTIFY_OFF, command::INTERNET_ON, command::SOCKET_DIAL_ON] {
            self.at(cmd, timeout)?.into_result()?;
        }
        Ok(())
    }

    /// Reboot the module and wait for it to come back.
    fn reinitialize(&mut self) -> Result<bool, Error> {
        self.at(command::REBOOT, self.config.quick_command_timeout_ms)?;
        self.transport.delay_ms(REBOOT_SETTLE_MS);
        for _ in 0..self.config.reinit_attempts {
            if self.raw(command::AT, Terminator::CrLf, BOOT_POLL_TIMEOUT_MS)? == CommandStatus::Ok {
                return Ok(true);
            }
            self.transport.delay_ms(BOOT_POLL_PAUSE_MS);
        }
        Ok(false)
    }

    /// Plain `AT`, which must answer `OK`.
    pub fn heartbeat(&mut self) -> Result<(), Error> {
        self.at(command::AT, self.config.quick_command_timeout_ms)?
            .into_result()
    }

    /// Apply an access point name. Stored only if the modem accepts it.
    pub fn set_apn(&mut self, apn: &str) -> Result<(), Error> {
        if apn.is_empty() || apn.len() > MAX_APN_LEN {
            return Err(Error::InvalidParameter);
        }
        let cmd = command::set_apn(apn)?;
        self.at(&cmd, self.config.apn_timeout_ms)?.into_result()?;
        self.apn.clear();
        self.apn.push_str(apn).map_err(|_| Error::InvalidParameter)?;
        Ok(())
    }

    /// [`connect_with`](Self::connect_with) the carrier's default APN.
    pub fn connect(&mut self) -> Result<IpStats, Error> {
        self.connect_with(DEFAULT_APN, "", "")
    }

    /// Bring the data session up and return its addresses.
    ///
    /// Powers the module on if it is off, otherwise only re-applies the APN.
    /// The module takes no credentials; `user` and `password` are accepted
    /// for interface compatibility and ignored.
    pub fn connect_with(&mut self, apn: &str, user: &str, password: &str) -> Result<IpStats, Error> {
        if !user.is_empty() || !password.is_empty() {
            debug!("APN credentials are not used by this module");
        }
        if self.state == LinkState::Off {
            self.power_on(apn, self.config.power_up_timeout_secs)?;
        } else {
            self.set_apn(apn)?;
        }
        self.ip_stats().map_err(|err| {
            warn!("connected but no IP configuration: {}", err);
            Error::NoCellLink
        })
    }
}
