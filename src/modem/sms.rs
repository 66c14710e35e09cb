//! SMS in text mode.
//!
//! Sending and saving are two-phase exchanges: the address line is terminated
//! with a bare CR and the modem answers with a `> ` prompt (no line ending, so
//! the transport reports a timeout with the prompt as partial response); the
//! body follows and is terminated with Ctrl-Z.
//!
//! ```text
//!  TX  AT+CMGS="+15551234567"\r
//!  RX  \r\n>
//!  TX  hello\x1a\r\n
//!  RX  \r\n+CMGS: 12\r\n\r\nOK\r\n
//! ```
//!
//! Incoming messages are read with `AT+CMGL`. With
//! [`Modem::sms_listen`] the scheduler tick polls for unread messages and
//! hands each one to the attached [`SmsCallback`].

use heapless::{String, Vec};
use serde::Serialize;

use super::command::{self, leading_int};
use super::config::{MAX_SMS_LENGTH, MAX_SMS_SLOTS};
use super::status::LinkState;
use super::transport::{CommandStatus, Terminator};
use super::{Error, Modem};
use crate::network::{Clock, PowerControl, Read, Write};

/// Wait for the `> ` prompt after the address line.
const PROMPT_TIMEOUT_MS: u32 = 300;
/// Wait for the result after the body.
const BODY_TIMEOUT_MS: u32 = 10_000;
/// Poll period used when `sms_listen` is given 0.
const DEFAULT_POLL_MS: u32 = 30_000;
/// Longest phone number accepted.
const MAX_NUMBER_LEN: usize = 20;

/// One stored message.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize)]
pub struct SmsMessage {
    /// Storage slot.
    pub index: u8,
    /// Sender, or recipient of a stored outgoing message.
    pub number: String<24>,
    /// `yy/MM/dd`.
    pub date: String<8>,
    /// `hh:mm:ss±zz`.
    pub time: String<12>,
    /// Message text.
    pub body: String<MAX_SMS_LENGTH>,
    /// Not read before this listing.
    pub unread: bool,
    /// A delivery receipt rather than a message.
    pub receipt: bool,
    /// Listed in PDU form; only `index` is meaningful.
    pub pdu: bool,
}

/// Messages from one listing.
pub type SmsList = Vec<SmsMessage, MAX_SMS_SLOTS>;

/// Called for each unread message found by the listener.
pub type SmsCallback = fn(&SmsMessage);

/// Storage slot argument of delete / send-from-memory.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SmsSlot {
    /// One slot, `1..=MAX_SMS_SLOTS`.
    Index(u8),
    /// Every slot. Errors on individual slots are ignored.
    All,
}

#[derive(Debug, Default)]
pub(crate) struct SmsListener {
    callback: Option<SmsCallback>,
    listening: bool,
    period_ms: u32,
    next_poll_ms: u64,
}

/// Parse an `AT+CMGL` response.
///
/// Records look like `+CMGL: <idx>,"<stat>","<number>",[<alpha>],"<date>,<time>"`
/// immediately followed by the body, which runs to the next record or the
/// final `OK`. Records without quoted fields are PDU listings.
pub fn parse_sms_list(response: &str) -> SmsList {
    const MARKER: &str = "+CMGL: ";
    let mut list = SmsList::new();
    let mut rest = response;
    while let Some(pos) = rest.find(MARKER) {
        rest = &rest[pos + MARKER.len()..];
        let end = rest
            .find(MARKER)
            .or_else(|| rest.rfind("OK"))
            .unwrap_or(rest.len());
        if let Some(message) = parse_entry(&rest[..end]) {
            if list.push(message).is_err() {
                break;
            }
        }
        rest = &rest[end..];
    }
    list
}

/// Split `"inner"rest` into `inner` and `rest`.
fn quoted(s: &str) -> Option<(&str, &str)> {
    let s = s.strip_prefix('"')?;
    let close = s.find('"')?;
    Some((&s[..close], &s[close + 1..]))
}

fn truncated<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

fn parse_entry(entry: &str) -> Option<SmsMessage> {
    let index = u8::try_from(leading_int(entry)?).ok()?;
    if !entry.contains(",\"") {
        return Some(SmsMessage {
            index,
            unread: true,
            pdu: true,
            ..SmsMessage::default()
        });
    }

    let rest = &entry[entry.find(',')? + 1..];
    let (stat, rest) = quoted(rest)?;
    let (number, rest) = quoted(rest.strip_prefix(',')?)?;
    let rest = rest.strip_prefix(',')?;
    let rest = match quoted(rest) {
        Some((_alpha, after)) => after,
        None => rest,
    };
    let (stamp, body) = match rest.strip_prefix(',').and_then(quoted) {
        Some((stamp, body)) => (stamp, body),
        None => ("", rest.strip_prefix(',').unwrap_or(rest)),
    };
    let (date, time) = stamp.split_once(',').unwrap_or((stamp, ""));
    let header = &entry[..entry.len() - body.len()];

    Some(SmsMessage {
        index,
        number: truncated(number),
        date: truncated(date),
        time: truncated(time),
        body: truncated(body),
        unread: stat.contains("UNREAD"),
        receipt: !header.contains(",,"),
        pdu: false,
    })
}

/// MSISDN the carrier's IoT SMS service assigns to a SIM: `882350` followed by
/// ICCID digits 10..19. The check digit of a 20-digit ICCID is dropped.
pub fn iccid_to_msisdn(iccid: &str) -> Option<String<16>> {
    if !(19..=20).contains(&iccid.len()) || !iccid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut msisdn = String::new();
    msisdn.push_str("882350").ok()?;
    msisdn.push_str(&iccid[10..19]).ok()?;
    Some(msisdn)
}

impl<S, C, P> Modem<S, C, P>
where
    S: Read + Write,
    C: Clock,
    P: PowerControl,
{
    /// Send a text message.
    pub fn sms_send(&mut self, number: &str, text: &str) -> Result<(), Error> {
        check_message(number, text)?;
        self.require_sms()?;
        self.at(command::SMS_TEXT_MODE, self.config.command_timeout_ms)?
            .into_result()?;
        let cmd = command::sms_send(number)?;
        self.sms_exchange(&cmd, text)
    }

    /// Store a text message on the SIM and return its slot.
    pub fn sms_save(&mut self, number: &str, text: &str) -> Result<u8, Error> {
        check_message(number, text)?;
        self.require_sms()?;
        self.at(command::SMS_TEXT_MODE, self.config.command_timeout_ms)?
            .into_result()?;
        let cmd = command::sms_write(number)?;
        self.sms_exchange(&cmd, text)?;
        command::parse_saved_slot(self.transport.response()).ok_or(Error::InvalidResponse)
    }

    /// Delete one stored message, or all of them.
    pub fn sms_delete(&mut self, slot: SmsSlot) -> Result<(), Error> {
        self.for_slots(slot, command::sms_delete)
    }

    /// Send a stored message, or every stored message.
    pub fn sms_send_from_memory(&mut self, slot: SmsSlot) -> Result<(), Error> {
        self.require_sms()?;
        self.for_slots(slot, command::sms_send_stored)
    }

    /// List stored messages.
    pub fn sms_list(&mut self) -> Result<SmsList, Error> {
        self.require_sms()?;
        self.at(command::SMS_LIST, self.config.command_timeout_ms)?
            .into_result()?;
        Ok(parse_sms_list(self.transport.response()))
    }

    /// Unread messages. With `delete_read`, messages that had already been
    /// read are deleted from the SIM.
    pub fn sms_read_unread(&mut self, delete_read: bool) -> Result<SmsList, Error> {
        let mut list = self.sms_list()?;
        if delete_read {
            for message in list.iter().filter(|m| !m.unread) {
                if let Err(err) = self.sms_delete(SmsSlot::Index(message.index)) {
                    debug!("could not delete SMS {}: {}", message.index, err);
                }
            }
        }
        list.retain(|m| m.unread);
        Ok(list)
    }

    /// Callback for messages found by the listener.
    pub fn sms_attach_callback(&mut self, callback: SmsCallback) {
        self.sms.callback = Some(callback);
    }

    /// Start from an empty SIM: delete every stored message.
    pub fn sms_start(&mut self) -> Result<(), Error> {
        self.sms_delete(SmsSlot::All)
    }

    /// Poll for unread messages from [`tick`](Self::tick) every `period_ms`
    /// (30 s when 0).
    pub fn sms_listen(&mut self, period_ms: u32) {
        let period_ms = if period_ms == 0 { DEFAULT_POLL_MS } else { period_ms };
        self.sms.period_ms = period_ms;
        self.sms.listening = true;
        self.sms.next_poll_ms = self.transport.now_ms() + u64::from(period_ms);
    }

    /// Stop polling.
    pub fn sms_stop(&mut self) {
        self.sms.listening = false;
    }

    /// Check for unread messages now and deliver them to the callback.
    /// Returns how many were delivered.
    pub fn sms_poll(&mut self) -> Result<usize, Error> {
        let unread = self.sms_read_unread(true)?;
        if let Some(callback) = self.sms.callback {
            for message in &unread {
                callback(message);
            }
        }
        Ok(unread.len())
    }

    /// Listener part of the scheduler tick. Returns the time until the next
    /// poll while listening.
    pub(super) fn sms_tick(&mut self) -> Option<u32> {
        if !self.sms.listening {
            return None;
        }
        let now = self.transport.now_ms();
        if now >= self.sms.next_poll_ms {
            if let Err(err) = self.sms_poll() {
                debug!("SMS poll failed: {}", err);
            }
            self.sms.next_poll_ms = self.transport.now_ms() + u64::from(self.sms.period_ms);
        }
        let wait = self.sms.next_poll_ms.saturating_sub(self.transport.now_ms());
        Some(u32::try_from(wait).unwrap_or(u32::MAX))
    }

    /// Registration check that only needs SMS service.
    fn require_sms(&mut self) -> Result<(), Error> {
        match self.check_cell_link() {
            Ok(()) | Err(Error::NoCellLink) => {}
            Err(err) => return Err(err),
        }
        if self.sms_ready {
            Ok(())
        } else {
            Err(Error::SmsUnavailable)
        }
    }

    /// Address line, prompt, then body and Ctrl-Z.
    fn sms_exchange(&mut self, cmd: &str, text: &str) -> Result<(), Error> {
        self.trace_line("TX:", cmd);
        self.raw(cmd, Terminator::Cr, PROMPT_TIMEOUT_MS)?;
        let prompt = self.transport.response();
        if prompt.is_empty() || prompt.contains("ERROR") {
            warn!("no SMS prompt: {}", prompt);
            return Err(Error::CommandFailed);
        }

        self.transport.send_line(text.as_bytes(), Terminator::CtrlZ)?;
        let status = self.transport.send_command("", Terminator::CtrlZ, BODY_TIMEOUT_MS)?;
        if self.transport.response().is_empty() {
            self.track_answer(text, CommandStatus::Timeout);
            return Err(Error::Timeout);
        }
        self.track_answer(text, status);
        status.into_result()
    }

    fn for_slots(&mut self, slot: SmsSlot, build: fn(u8) -> Result<command::CommandBuf, Error>) -> Result<(), Error> {
        if self.state == LinkState::Off {
            return Err(Error::NotPoweredOn);
        }
        match slot {
            SmsSlot::Index(index) => {
                if !(1..=MAX_SMS_SLOTS as u8).contains(&index) {
                    return Err(Error::InvalidParameter);
                }
                let cmd = build(index)?;
                self.at(&cmd, self.config.command_timeout_ms)?.into_result()
            }
            SmsSlot::All => {
                for index in 1..=MAX_SMS_SLOTS as u8 {
                    let cmd = build(index)?;
                    let _ = self.at(&cmd, self.config.command_timeout_ms);
                }
                Ok(())
            }
        }
    }
}

fn check_message(number: &str, text: &str) -> Result<(), Error> {
    if number.is_empty() || number.len() > MAX_NUMBER_LEN || text.len() > MAX_SMS_LENGTH {
        return Err(Error::InvalidParameter);
    }
    Ok(())
}
