//! Scripted modem shared by the integration tests.
//!
//! Every complete command line written to the UART is logged and answered
//! according to the rules installed by the test. A rule matches on command
//! prefix; the longest matching prefix with a reply available wins. One-shot
//! replies are used before the rule's sticky reply. Commands matching no rule
//! get `OK`.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wnclink::modem::{Config, LinkState, Modem};
use wnclink::network::{Clock, PowerControl, Read, Write};

pub const OK: &str = "\r\nOK\r\n";
pub const ERROR: &str = "\r\nERROR\r\n";
pub const EXTERR: &str = "\r\n@EXTERR:0\r\n";
pub const CME: &str = "\r\n+CME ERROR: 3\r\n";
pub const SMS_PROMPT: &str = "\r\n> ";

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Silent,
}

#[derive(Debug)]
struct Rule {
    prefix: String,
    once: VecDeque<Reply>,
    sticky: Option<Reply>,
}

#[derive(Debug, Default)]
struct State {
    now_ms: u64,
    rx: VecDeque<u8>,
    line: Vec<u8>,
    written: Vec<u8>,
    commands: Vec<String>,
    rules: Vec<Rule>,
    power_sequences: usize,
}

impl State {
    fn complete_line(&mut self) {
        if self.line.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();

        let reply = self
            .rules
            .iter_mut()
            .filter(|r| line.starts_with(&r.prefix) && (!r.once.is_empty() || r.sticky.is_some()))
            .max_by_key(|r| r.prefix.len())
            .and_then(|r| r.once.pop_front().or_else(|| r.sticky.clone()))
            .unwrap_or_else(|| Reply::Text(OK.into()));

        if let Reply::Text(text) = reply {
            self.rx.extend(text.bytes());
        }
        self.commands.push(line);
    }

    fn rule(&mut self, prefix: &str) -> &mut Rule {
        if let Some(i) = self.rules.iter().position(|r| r.prefix == prefix) {
            return &mut self.rules[i];
        }
        self.rules.push(Rule {
            prefix: prefix.into(),
            once: VecDeque::new(),
            sticky: None,
        });
        self.rules.last_mut().unwrap()
    }
}

/// Test-side handle on the scripted modem.
#[derive(Debug, Clone, Default)]
pub struct Mock(Rc<RefCell<State>>);

impl Mock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers of a registered, healthy module.
    pub fn healthy() -> Self {
        let mock = Self::new();
        mock.always("AT+CSQ", "\r\n+CSQ: 20,0\r\n\r\nOK\r\n");
        mock.always("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n");
        mock.always("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n");
        mock.always(
            "AT+CGCONTRDP=1",
            "\r\n+CGCONTRDP: 1,5,\"m2m.com.attz\",10.64.1.5.255.255.255.0,10.64.1.1,8.8.8.8,8.8.4.4\r\n\r\nOK\r\n",
        );
        mock.always("AT%CCID", "\r\n%CCID: 89011703278100123456\r\n\r\nOK\r\n");
        mock.always("AT@SOCKREAD", "\r\n@SOCKREAD:0,\"\"\r\n\r\nOK\r\n");
        mock
    }

    /// Answer the next command starting with `prefix` with `reply`.
    pub fn reply(&self, prefix: &str, reply: &str) {
        self.0.borrow_mut().rule(prefix).once.push_back(Reply::Text(reply.into()));
    }

    /// Let the next command starting with `prefix` go unanswered.
    pub fn drop_next(&self, prefix: &str) {
        self.0.borrow_mut().rule(prefix).once.push_back(Reply::Silent);
    }

    /// Answer every command starting with `prefix` with `reply`.
    pub fn always(&self, prefix: &str, reply: &str) {
        self.0.borrow_mut().rule(prefix).sticky = Some(Reply::Text(reply.into()));
    }

    /// Never answer commands starting with `prefix`.
    pub fn silence(&self, prefix: &str) {
        self.0.borrow_mut().rule(prefix).sticky = Some(Reply::Silent);
    }

    /// Inject unsolicited bytes.
    pub fn push_rx(&self, bytes: &[u8]) {
        self.0.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Every command line written so far.
    pub fn commands(&self) -> Vec<String> {
        self.0.borrow().commands.clone()
    }

    /// Commands starting with `prefix`.
    pub fn sent(&self, prefix: &str) -> Vec<String> {
        self.0
            .borrow()
            .commands
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Commands other than the registration check (`AT+CSQ`, `AT+CPIN?`,
    /// `AT+CREG?`) that precedes every gated command.
    pub fn traffic(&self) -> Vec<String> {
        self.0
            .borrow()
            .commands
            .iter()
            .filter(|c| !matches!(c.as_str(), "AT+CSQ" | "AT+CPIN?" | "AT+CREG?"))
            .cloned()
            .collect()
    }

    /// Raw bytes written to the UART.
    pub fn written(&self) -> Vec<u8> {
        self.0.borrow().written.clone()
    }

    pub fn advance(&self, ms: u64) {
        self.0.borrow_mut().now_ms += ms;
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.sent(prefix).len()
    }

    pub fn clear_log(&self) {
        let mut state = self.0.borrow_mut();
        state.commands.clear();
        state.written.clear();
    }

    pub fn now_ms(&self) -> u64 {
        self.0.borrow().now_ms
    }

    pub fn power_sequences(&self) -> usize {
        self.0.borrow().power_sequences
    }

    pub fn serial(&self) -> MockSerial {
        MockSerial(self.clone())
    }

    pub fn clock(&self) -> MockClock {
        MockClock(self.clone())
    }

    pub fn pins(&self) -> MockPins {
        MockPins(self.clone())
    }
}

#[derive(Debug)]
pub struct MockSerial(Mock);

impl Read for MockSerial {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.0.0.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match state.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockSerial {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.0.0.borrow_mut();
        state.written.extend_from_slice(buf);
        for &b in buf {
            match b {
                b'\r' | 0x1a => state.complete_line(),
                b'\n' => {}
                _ => state.line.push(b),
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockClock(Mock);

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.0.0.borrow().now_ms
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.0.borrow_mut().now_ms += u64::from(ms);
    }
}

#[derive(Debug)]
pub struct MockPins(Mock);

impl PowerControl for MockPins {
    fn power_sequence(&mut self) {
        self.0.0.borrow_mut().power_sequences += 1;
    }
}

pub type TestModem = Modem<MockSerial, MockClock, MockPins>;

/// Configuration with short timeouts so silent commands fail quickly.
pub fn test_config() -> Config {
    Config {
        command_timeout_ms: 2_000,
        dns_timeout_ms: 2_000,
        apn_timeout_ms: 2_000,
        ping_timeout_ms: 2_000,
        power_up_timeout_secs: 5,
        ..Config::default()
    }
}

pub fn modem(mock: &Mock, config: Config) -> TestModem {
    Modem::new(mock.serial(), mock.clock(), mock.pins(), config)
}

/// A modem that went through power-up against a healthy mock. The command
/// log is cleared afterwards.
pub fn powered(config: Config) -> (TestModem, Mock) {
    let mock = Mock::healthy();
    let mut modem = modem(&mock, config);
    modem.power_on("m2m.com.attz", 5).unwrap();
    assert_eq!(modem.state(), LinkState::On);
    mock.clear_log();
    (modem, mock)
}
