//! AT command set of the module: builders for command lines and parsers for
//! their responses.
//!
//! Builders return a [`CommandBuf`]; parsers take the accumulated response text
//! produced by the [transport](super::transport) (lines concatenated without
//! their CR/LF) and return `None` when the expected fields are missing.

use core::fmt::Write as _;

use heapless::String;

use super::Error;
use super::config::MAX_COMMAND_LEN;
use super::hex;
use super::socket::Protocol;
use super::status::{IpStats, IpString, NetworkTime, Signal};

/// A command line without its terminator.
pub type CommandBuf = String<MAX_COMMAND_LEN>;

pub(crate) const AT: &str = "AT";
pub(crate) const FIRMWARE_VERSION: &str = "AT+GMR";
pub(crate) const ECHO_OFF: &str = "ATE0";
pub(crate) const VERBOSE_ERRORS: &str = "AT+CMEE=2";
pub(crate) const SMS_TEXT_MODE: &str = "AT+CMGF=1";
pub(crate) const SMS_STORAGE_SIM: &str = "AT+CPMS=\"SM\",\"SM\",\"SM\"";
pub(crate) const NOTIFY_OFF: &str = "AT%NOTIFYEV=\"ALL\",0";
pub(crate) const INTERNET_ON: &str = "AT@INTERNET=1";
pub(crate) const SOCKET_DIAL_ON: &str = "AT@SOCKDIAL=1";
pub(crate) const SOCKET_DIAL_QUERY: &str = "AT@SOCKDIAL?";
pub(crate) const SIGNAL_QUALITY: &str = "AT+CSQ";
pub(crate) const SIM_STATUS: &str = "AT+CPIN?";
pub(crate) const REGISTRATION: &str = "AT+CREG?";
pub(crate) const REBOOT: &str = "AT@DMREBOOT";
pub(crate) const ICCID: &str = "AT%CCID";
pub(crate) const CLOCK: &str = "AT+CCLK?";
pub(crate) const CONTEXT_INFO: &str = "AT+CGCONTRDP=1";
pub(crate) const SMS_LIST: &str = "AT+CMGL";

/// Reports requested by [`Modem::signal_quality_log`](super::Modem::signal_quality_log).
pub(crate) const MEASUREMENT_REPORTS: [u8; 8] = [0, 1, 2, 3, 4, 5, 8, 98];

/// Shortest and longest connect timeout `AT@SOCKCONN` accepts, in seconds.
pub const SOCKET_TIMEOUT_RANGE: (u16, u16) = (30, 360);

fn build(args: core::fmt::Arguments<'_>) -> Result<CommandBuf, Error> {
    let mut cmd = CommandBuf::new();
    cmd.write_fmt(args).map_err(|_| Error::BufferOverflow)?;
    Ok(cmd)
}

/// `AT@SOCKCREAT=<1|2>,0`
pub fn socket_create(protocol: Protocol) -> Result<CommandBuf, Error> {
    let kind = match protocol {
        Protocol::Tcp => 1,
        Protocol::Udp => 2,
    };
    build(format_args!("AT@SOCKCREAT={},0", kind))
}

/// Clamp a connect timeout to what the firmware accepts.
pub fn clamp_socket_timeout(secs: u16) -> u16 {
    secs.clamp(SOCKET_TIMEOUT_RANGE.0, SOCKET_TIMEOUT_RANGE.1)
}

/// `AT@SOCKCONN=<id>,"<ip>",<port>,<timeout>`
pub fn socket_connect(id: u8, ip: &str, port: u16, timeout_secs: u16) -> Result<CommandBuf, Error> {
    build(format_args!(
        "AT@SOCKCONN={},\"{}\",{},{}",
        id,
        ip,
        port,
        clamp_socket_timeout(timeout_secs)
    ))
}

/// `AT@SOCKWRITE=<id>,<n>,"<hex>"`
pub fn socket_write(id: u8, data: &[u8]) -> Result<CommandBuf, Error> {
    let mut cmd = build(format_args!("AT@SOCKWRITE={},{},\"", id, data.len()))?;
    hex::encode_into(data, &mut cmd)?;
    cmd.push('"').map_err(|_| Error::BufferOverflow)?;
    Ok(cmd)
}

/// `AT@SOCKREAD=<id>,<n>`
pub fn socket_read(id: u8, len: usize) -> Result<CommandBuf, Error> {
    build(format_args!("AT@SOCKREAD={},{}", id, len))
}

/// `AT@SOCKCLOSE=<id>`
pub fn socket_close(id: u8) -> Result<CommandBuf, Error> {
    build(format_args!("AT@SOCKCLOSE={}", id))
}

/// `AT@DNSRESVDON="<host>"`
pub fn dns_resolve(host: &str) -> Result<CommandBuf, Error> {
    build(format_args!("AT@DNSRESVDON=\"{}\"", host))
}

/// `AT%PDNSET=1,<apn>,IP`
pub fn set_apn(apn: &str) -> Result<CommandBuf, Error> {
    build(format_args!("AT%PDNSET=1,{},IP", apn))
}

/// `AT@PINGREQ="<ip>"`
pub fn ping(ip: &str) -> Result<CommandBuf, Error> {
    build(format_args!("AT@PINGREQ=\"{}\"", ip))
}

/// `AT%MEAS="<n>"`
pub fn measurement(report: u8) -> Result<CommandBuf, Error> {
    build(format_args!("AT%MEAS=\"{}\"", report))
}

/// `AT+CMGS="<number>"`, sent with a bare CR.
pub fn sms_send(number: &str) -> Result<CommandBuf, Error> {
    build(format_args!("AT+CMGS=\"{}\"", number))
}

/// `AT+CMGW="<number>"`, sent with a bare CR.
pub fn sms_write(number: &str) -> Result<CommandBuf, Error> {
    build(format_args!("AT+CMGW=\"{}\"", number))
}

/// `AT+CMGD=<slot>`
pub fn sms_delete(slot: u8) -> Result<CommandBuf, Error> {
    build(format_args!("AT+CMGD={}", slot))
}

/// `AT+CMSS=<slot>`
pub fn sms_send_stored(slot: u8) -> Result<CommandBuf, Error> {
    build(format_args!("AT+CMSS={}", slot))
}

/// Leading (optionally signed) decimal integer of `s` after whitespace.
pub(crate) fn leading_int(s: &str) -> Option<i32> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

/// Leading run of digits and dots.
fn leading_ipv4(s: &str) -> &str {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    &s[..end]
}

/// True for a dotted quad such as `93.184.216.34`.
pub fn is_ipv4_literal(s: &str) -> bool {
    if !(7..=15).contains(&s.len()) {
        return false;
    }
    let mut parts = 0;
    for part in s.split('.') {
        parts += 1;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if part.parse::<u16>().map_or(true, |v| v > 255) {
            return false;
        }
    }
    parts == 4
}

fn ip_string(s: &str) -> Option<IpString> {
    if s.split('.').count() != 4 {
        return None;
    }
    IpString::try_from(s).ok()
}

/// Modem socket id from `@SOCKCREAT:<id>OK`.
pub fn parse_socket_id(response: &str) -> Option<u8> {
    let start = response.find("T:")? + 2;
    let end = response.rfind("OK")?;
    response.get(start..end)?.trim().parse().ok()
}

/// Address from `@DNSRESVDON:"<ip>"OK`.
pub fn parse_dns(response: &str) -> Option<&str> {
    let start = response.find("ON:\"")? + 4;
    let len = response[start..].find('"')?;
    let ip = &response[start..start + len];
    (!ip.is_empty()).then_some(ip)
}

/// Hex payload of `@SOCKREAD:<n>,"<hex>"OK`, empty when there is none.
///
/// A response cut short by the buffer limit has no closing quote; the
/// digits up to its end are returned then.
pub fn parse_read_payload(response: &str) -> &str {
    match (response.find('"'), response.rfind('"')) {
        (Some(first), Some(last)) if last > first => &response[first + 1..last],
        (Some(first), Some(_)) => &response[first + 1..],
        _ => "",
    }
}

/// Registration status, the second field of `+CREG: <n>,<stat>`.
pub fn parse_registration(response: &str) -> Option<u8> {
    let start = response.find("CREG: ")? + 6;
    let stat = response[start..].split(',').nth(1)?;
    u8::try_from(leading_int(stat)?).ok()
}

/// `+CSQ: <rssi>,<ber>`
pub fn parse_signal(response: &str) -> Option<Signal> {
    let start = response.find("SQ:")? + 3;
    let comma = response.rfind(',')?;
    if comma <= start {
        return None;
    }
    let rssi_dbm = Signal::rssi_from_raw(leading_int(&response[start..comma])?)?;
    let ber = leading_int(&response[comma + 1..])? as i16;
    Some(Signal { rssi_dbm, ber })
}

/// ICCID from `%CCID: <digits>OK`, or `AT%CCID<digits>OK` on old firmware.
pub fn parse_iccid(response: &str) -> Option<&str> {
    let marker = if response.contains(':') { "%CCID" } else { "AT%CCID" };
    let start = response.find(marker)? + 7;
    let end = response.rfind("OK")?;
    let iccid = response.get(start..end)?.trim();
    (!iccid.is_empty()).then_some(iccid)
}

/// `+CCLK: "yy/MM/dd,hh:mm:ss±zz"`
pub fn parse_time(response: &str) -> Option<NetworkTime> {
    let start = response.find("+CCLK:")? + 6;
    let mut fields = response[start..]
        .split(|c: char| !c.is_ascii_digit())
        .filter(|f| !f.is_empty())
        .map(|f| f.parse::<u8>().ok());
    let mut next = || fields.next().flatten();
    Some(NetworkTime {
        year: next()?,
        month: next()?,
        day: next()?,
        hour: next()?,
        minute: next()?,
        second: next()?,
    })
}

/// `+CGCONTRDP: <cid>,<bearer>,"<apn>",<ip.mask>,<gw>,<dns1>,<dns2>...`
///
/// The address and mask arrive as one eight-octet dotted field.
pub fn parse_ip_stats(response: &str) -> Option<IpStats> {
    let start = response.rfind('"')? + 2;
    let mut fields = response.get(start..)?.split(',');

    let addr_mask = leading_ipv4(fields.next()?);
    let split = addr_mask.match_indices('.').nth(3)?.0;
    let ip = ip_string(&addr_mask[..split])?;
    let mask = ip_string(&addr_mask[split + 1..])?;

    let mut next_ip = || ip_string(leading_ipv4(fields.next()?));
    Some(IpStats {
        ip,
        mask,
        gateway: next_ip()?,
        dns_primary: next_ip()?,
        dns_secondary: next_ip()?,
    })
}

/// Slot from `+CMGW: <n>OK`.
pub fn parse_saved_slot(response: &str) -> Option<u8> {
    response.rfind("OK")?;
    let start = response.find("+CMGW: ")? + 7;
    let c = *response.as_bytes().get(start)?;
    c.is_ascii_digit().then(|| c - b'0')
}
