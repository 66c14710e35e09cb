//! Link state and the read-only records the modem reports.

use heapless::String;
use serde::Serialize;

use super::config::MAX_IP_LEN;

/// Link/registration state of the modem.
///
/// ```text
///   Off ──power_on──▶ OnNoCellLink ──cell check ok──▶ On
///    ▲                    ▲   │                       │
///    │  power/init fail   │   └────────── timeout ────┼──▶ NoResponse
///    └────────────────────┘                           │        │
///                         ◀── next non-timeout reply ─┴────────┘
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum LinkState {
    /// Not powered or power-up failed. Nothing is sent.
    Off,
    /// Powered, registration not confirmed.
    OnNoCellLink,
    /// SIM ready and registered for data.
    On,
    /// A command timed out. Gated commands are refused until the modem
    /// answers again.
    NoResponse,
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            LinkState::Off => defmt::write!(f, "Off"),
            LinkState::OnNoCellLink => defmt::write!(f, "OnNoCellLink"),
            LinkState::On => defmt::write!(f, "On"),
            LinkState::NoResponse => defmt::write!(f, "NoResponse"),
        }
    }
}

/// Dotted-quad IPv4 address as text.
pub type IpString = String<MAX_IP_LEN>;

/// Addresses of the data session (`AT+CGCONTRDP=1`).
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize)]
pub struct IpStats {
    /// Address assigned to the modem.
    pub ip: IpString,
    /// Subnet mask.
    pub mask: IpString,
    /// Default gateway.
    pub gateway: IpString,
    /// Primary DNS server.
    pub dns_primary: IpString,
    /// Secondary DNS server.
    pub dns_secondary: IpString,
}

/// RSSI value reported when the modem cannot measure one.
pub const RSSI_UNKNOWN_DBM: i16 = -199;

/// Signal quality from `AT+CSQ`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct Signal {
    /// Received signal strength in dBm, [`RSSI_UNKNOWN_DBM`] if unknown.
    pub rssi_dbm: i16,
    /// Bit error rate class 0..=7, 99 if unknown.
    pub ber: i16,
}

impl Signal {
    /// Convert the raw `+CSQ` RSSI index to dBm.
    ///
    /// 0 is -113 dBm, 1 is -111, 2..=30 step by 2 dBm, 31 is -51 or better and
    /// 99 means unknown. Anything else is rejected.
    pub fn rssi_from_raw(raw: i32) -> Option<i16> {
        match raw {
            99 => Some(RSSI_UNKNOWN_DBM),
            0 => Some(-113),
            1 => Some(-111),
            31 => Some(-51),
            2..=30 => Some(-113 + 2 * raw as i16),
            _ => None,
        }
    }
}

/// Network time from `AT+CCLK?`. The year is two digits.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct NetworkTime {
    /// Year within the century.
    pub year: u8,
    /// Month 1..=12.
    pub month: u8,
    /// Day 1..=31.
    pub day: u8,
    /// Hour 0..=23.
    pub hour: u8,
    /// Minute.
    pub minute: u8,
    /// Second.
    pub second: u8,
}

/// Diagnostic snapshot, see [`Modem::status`](super::Modem::status).
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct Status<'a> {
    /// Link state.
    pub state: LinkState,
    /// Registration allows SMS.
    pub sms_ready: bool,
    /// APN in use.
    pub apn: &'a str,
    /// Last signal reading taken by a registration check.
    pub signal: Option<Signal>,
    /// Allocated socket slots.
    pub sockets_open: u8,
    /// Sockets with a modem-side connection.
    pub sockets_connected: u8,
}

impl Status<'_> {
    /// Render as JSON into `buf`, returning the length written.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, super::Error> {
        serde_json_core::to_slice(self, buf).map_err(|_| super::Error::BufferOverflow)
    }
}

/// Build the pseudo MAC address the module is known by: ICCID digits from the
/// fourth onwards, with every third character replaced by `:`.
pub fn mac_from_iccid(iccid: &str) -> Option<String<17>> {
    let digits = iccid.get(3..)?;
    if digits.len() < 17 || !digits.is_ascii() {
        return None;
    }
    let mut mac = String::new();
    for (i, c) in digits.chars().take(17).enumerate() {
        let c = if i % 3 == 2 { ':' } else { c };
        mac.push(c).ok()?;
    }
    Some(mac)
}
