//! Runtime configuration and compile-time capacities.

/// Number of sockets the modem firmware supports.
pub const MAX_SOCKETS: usize = 5;
/// Largest payload of a single `AT@SOCKREAD`.
pub const MAX_READ_BYTES: usize = 1500;
/// Largest payload of a single `AT@SOCKWRITE`.
pub const MAX_WRITE_BYTES: usize = 1500;
/// Hard cap on an accumulated command response.
pub const MAX_RESPONSE_LEN: usize = 2 * MAX_READ_BYTES + 100;
/// Longest command line the driver builds (a full hex-encoded write).
pub const MAX_COMMAND_LEN: usize = 2 * MAX_WRITE_BYTES + 64;
/// Per-socket staging buffer for non-blocking send and receive.
pub const SOCKET_BUFFER_SIZE: usize = 2048;
/// SMS storage slots on the SIM.
pub const MAX_SMS_SLOTS: usize = 3;
/// Longest text-mode SMS body.
pub const MAX_SMS_LENGTH: usize = 160;
/// Longest APN name.
pub const MAX_APN_LEN: usize = 64;
/// Longest hostname accepted for DNS.
pub const MAX_HOSTNAME_LEN: usize = 128;
/// Longest dotted-quad IPv4 string.
pub const MAX_IP_LEN: usize = 15;
/// Commands echoed to the log are shortened to this many characters.
pub const TRUNCATE_LOG_LEN: usize = 80;

/// APN used by [`Modem::connect`](super::Modem::connect).
pub const DEFAULT_APN: &str = "m2m.com.attz";

/// Driver tunables.
///
/// `Config::default()` matches the timings the module is qualified with; most
/// applications only change the APN or the socket tick.
///
/// # Examples
///
/// ```rust
/// use wnclink::modem::Config;
///
/// let config = Config {
///     tick_ms: 100,
///     ..Config::default()
/// };
/// assert_eq!(config.read_timeout_ticks(), 90);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Timeout of ordinary commands.
    pub command_timeout_ms: u32,
    /// Timeout of `AT`, `ATE0` and other local commands.
    pub quick_command_timeout_ms: u32,
    /// Timeout of `AT@DNSRESVDON`.
    pub dns_timeout_ms: u32,
    /// Timeout of `AT%PDNSET`.
    pub apn_timeout_ms: u32,
    /// Timeout of `AT@PINGREQ`.
    pub ping_timeout_ms: u32,
    /// Pause before every command.
    pub command_gap_ms: u32,
    /// Chunk size of socket reads, at most [`MAX_READ_BYTES`].
    pub max_read_bytes: usize,
    /// Chunk size of socket writes, at most [`MAX_WRITE_BYTES`].
    pub max_write_bytes: usize,
    /// Period of the I/O scheduler tick.
    pub tick_ms: u32,
    /// A receive completes after this long without data.
    pub read_timeout_ms: u32,
    /// Connect timeout handed to `AT@SOCKCONN`, clamped to 30..=360.
    pub socket_timeout_secs: u16,
    /// Seconds to wait for `OK` after the power sequence.
    pub power_up_timeout_secs: u8,
    /// Attempts of the init handshake before a reboot.
    pub init_retries: u8,
    /// `AT` polls after `AT@DMREBOOT`.
    pub reinit_attempts: u8,
    /// Extra `AT@SOCKCLOSE` attempts after an error.
    pub close_retries: u8,
    /// Reopen attempts of a socket dropped after a fatal error.
    pub reopen_attempts: u8,
    /// Issue `AT@SOCKDIAL?` before every gated command.
    pub check_network_status: bool,
    /// Polling period of [`Modem::sms_listen`](super::Modem::sms_listen) when
    /// called with zero.
    pub sms_poll_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_timeout_ms: 40_000,
            quick_command_timeout_ms: 2_000,
            dns_timeout_ms: 60_000,
            apn_timeout_ms: 60_000,
            ping_timeout_ms: 60_000,
            command_gap_ms: 0,
            max_read_bytes: MAX_READ_BYTES,
            max_write_bytes: MAX_WRITE_BYTES,
            tick_ms: 250,
            read_timeout_ms: 9_000,
            socket_timeout_secs: 30,
            power_up_timeout_secs: 60,
            init_retries: 10,
            reinit_attempts: 60,
            close_retries: 3,
            reopen_attempts: 3,
            check_network_status: false,
            sms_poll_ms: 30_000,
        }
    }
}

impl Config {
    /// Number of empty ticks after which a receive gives up.
    pub fn read_timeout_ticks(&self) -> u32 {
        self.read_timeout_ms / self.tick_ms.max(1)
    }

    /// Read chunk size clamped to what the buffers can hold.
    pub fn read_chunk(&self) -> usize {
        self.max_read_bytes.clamp(1, MAX_READ_BYTES)
    }

    /// Write chunk size clamped to what the buffers can hold.
    pub fn write_chunk(&self) -> usize {
        self.max_write_bytes.clamp(1, MAX_WRITE_BYTES)
    }
}

/// Runtime verbosity of the driver log.
///
/// | bit  | meaning                                        |
/// |------|------------------------------------------------|
/// | 0x01 | commands and responses, shortened              |
/// | 0x02 | commands and responses in full                 |
/// | 0x04 | socket-layer calls                             |
/// | 0x08 | hex dump of socket payloads                    |
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct DebugLevel(u8);

impl DebugLevel {
    /// Logging off.
    pub const OFF: Self = Self(0);
    /// Commands and responses, shortened to 80 characters.
    pub const BASIC: Self = Self(0x01);
    /// Commands and responses without shortening.
    pub const VERBOSE: Self = Self(0x02);
    /// Socket-layer calls.
    pub const DRIVER: Self = Self(0x04);
    /// Hex dump of socket payloads.
    pub const DUMP: Self = Self(0x08);

    /// Build from the raw bitmask, ignoring unknown bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0F)
    }

    /// The raw bitmask.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl core::ops::BitOr for DebugLevel {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
