mod mock;

use mock::{CME, ERROR, Mock, modem, powered, test_config};
use wnclink::modem::config::MAX_RESPONSE_LEN;
use wnclink::modem::{DebugLevel, Error, LinkState, Protocol};

#[test]
fn power_on_runs_handshake_in_order() {
    let mock = Mock::healthy();
    let mut modem = modem(&mock, test_config());
    assert_eq!(modem.state(), LinkState::Off);

    modem.power_on("m2m.com.attz", 5).unwrap();

    assert_eq!(mock.power_sequences(), 1);
    assert_eq!(
        mock.commands(),
        [
            "AT",
            "AT+CSQ",
            "AT+CPIN?",
            "AT+CREG?",
            "AT",
            "AT",
            "AT+GMR",
            "ATE0",
            "AT+CMEE=2",
            "AT+CMGF=1",
            "AT+CPMS=\"SM\",\"SM\",\"SM\"",
            "AT",
            "AT%NOTIFYEV=\"ALL\",0",
            "AT@INTERNET=1",
            "AT@SOCKDIAL=1",
            "AT%PDNSET=1,m2m.com.attz,IP",
        ]
    );
    assert_eq!(modem.state(), LinkState::On);
    assert!(modem.registered());
    assert!(modem.sms_ready());
    assert_eq!(modem.apn(), "m2m.com.attz");
}

#[test]
fn power_on_gives_up_when_module_is_silent() {
    let mock = Mock::new();
    mock.silence("AT");
    let mut modem = modem(&mock, test_config());

    assert_eq!(modem.power_on("m2m.com.attz", 3), Err(Error::PowerOnFailed));
    assert_eq!(modem.state(), LinkState::Off);
    assert_eq!(mock.count("AT"), 3);
    // three polls of 500 ms plus 500 ms pauses
    assert!(mock.now_ms() >= 3_000);
    assert!(mock.now_ms() < 4_000);
}

#[test]
fn init_failure_reboots_once_then_reports() {
    let mock = Mock::healthy();
    mock.always("AT@INTERNET=1", ERROR);
    let mut modem = modem(&mock, test_config());

    assert_eq!(modem.power_on("m2m.com.attz", 5), Err(Error::InitFailed));
    assert_eq!(modem.state(), LinkState::Off);
    assert_eq!(mock.count("AT@DMREBOOT"), 1);
    assert_eq!(mock.count("AT@INTERNET=1"), 11);
    assert_eq!(mock.count("AT%PDNSET"), 0);
}

#[test]
fn power_on_without_registration_fails_without_reboot() {
    let mock = Mock::healthy();
    mock.always("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n");
    let mut modem = modem(&mock, test_config());

    assert_eq!(modem.power_on("m2m.com.attz", 5), Err(Error::InitFailed));
    assert_eq!(modem.state(), LinkState::Off);
    assert_eq!(mock.count("AT+CREG?"), 1);
    assert_eq!(mock.count("AT@DMREBOOT"), 0);
    assert_eq!(mock.count("AT@INTERNET"), 0);
}

#[test]
fn init_succeeds_after_reboot() {
    let mock = Mock::healthy();
    for _ in 0..10 {
        mock.reply("AT@INTERNET=1", ERROR);
    }
    let mut modem = modem(&mock, test_config());

    modem.power_on("m2m.com.attz", 5).unwrap();
    assert_eq!(mock.count("AT@DMREBOOT"), 1);
    assert!(modem.registered());
}

#[test]
fn cell_link_requires_ready_sim() {
    let (mut modem, mock) = powered(test_config());
    mock.always("AT+CPIN?", "\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n");

    assert_eq!(modem.check_cell_link(), Err(Error::NoCellLink));
    assert_eq!(modem.state(), LinkState::OnNoCellLink);
    assert!(!modem.registered());
    assert_eq!(mock.count("AT+CREG?"), 0);
}

#[test]
fn roaming_sms_only_registration() {
    let (mut modem, mock) = powered(test_config());

    mock.always("AT+CREG?", "\r\n+CREG: 0,6\r\n\r\nOK\r\n");
    assert_eq!(modem.check_cell_link(), Err(Error::NoCellLink));
    assert!(modem.sms_ready());

    mock.always("AT+CREG?", "\r\n+CREG: 0,5\r\n\r\nOK\r\n");
    assert_eq!(modem.check_cell_link(), Ok(()));
    assert!(modem.sms_ready());
    assert!(modem.registered());
}

#[test]
fn missing_registration_field_means_unregistered() {
    let (mut modem, mock) = powered(test_config());
    mock.always("AT+CREG?", "\r\n+CREG: 0\r\n\r\nOK\r\n");

    assert_eq!(modem.check_cell_link(), Err(Error::NoCellLink));
    assert!(!modem.sms_ready());
}

#[test]
fn timeout_blocks_gated_commands_until_modem_answers() {
    let (mut modem, mock) = powered(test_config());
    let sock = modem.socket_open(Protocol::Tcp).unwrap();

    mock.drop_next("AT");
    assert_eq!(modem.heartbeat(), Err(Error::Timeout));
    assert_eq!(modem.state(), LinkState::NoResponse);
    assert!(!modem.registered());

    mock.clear_log();
    assert_eq!(
        modem.socket_connect(sock, "93.184.216.34", 80),
        Err(Error::NoResponse)
    );
    assert!(mock.commands().is_empty());

    modem.heartbeat().unwrap();
    assert_eq!(modem.state(), LinkState::On);
    assert!(modem.registered());
}

#[test]
fn error_answer_after_timeout_also_recovers_link() {
    let (mut modem, mock) = powered(test_config());

    mock.drop_next("AT+CCLK?");
    assert_eq!(modem.network_time(), Err(Error::Timeout));
    assert_eq!(modem.state(), LinkState::NoResponse);

    mock.reply("AT+CCLK?", CME);
    assert_eq!(modem.network_time(), Err(Error::CmeError));
    assert_eq!(modem.state(), LinkState::On);
}

#[test]
fn nothing_is_sent_while_off() {
    let mock = Mock::healthy();
    let mut modem = modem(&mock, test_config());

    assert_eq!(modem.heartbeat(), Err(Error::NotPoweredOn));
    assert_eq!(modem.check_cell_link(), Err(Error::NotPoweredOn));
    assert_eq!(modem.resolve("example.com"), Err(Error::NotPoweredOn));
    assert!(mock.commands().is_empty());
}

#[test]
fn apn_is_stored_only_when_accepted() {
    let (mut modem, mock) = powered(test_config());

    mock.reply("AT%PDNSET", ERROR);
    assert_eq!(modem.set_apn("broken.apn"), Err(Error::CommandFailed));
    assert_eq!(modem.apn(), "m2m.com.attz");

    modem.set_apn("iot.example").unwrap();
    assert_eq!(modem.apn(), "iot.example");
    assert_eq!(mock.sent("AT%PDNSET"), ["AT%PDNSET=1,broken.apn,IP", "AT%PDNSET=1,iot.example,IP"]);

    assert_eq!(modem.set_apn(""), Err(Error::InvalidParameter));
}

#[test]
fn connect_powers_on_and_reports_addresses() {
    let mock = Mock::healthy();
    let mut modem = modem(&mock, test_config());

    let stats = modem.connect().unwrap();
    assert_eq!(stats.ip, "10.64.1.5");
    assert_eq!(stats.mask, "255.255.255.0");
    assert_eq!(stats.gateway, "10.64.1.1");
    assert_eq!(stats.dns_primary, "8.8.8.8");
    assert_eq!(stats.dns_secondary, "8.8.4.4");
    assert_eq!(mock.power_sequences(), 1);
}

#[test]
fn connect_when_powered_only_reapplies_apn() {
    let (mut modem, mock) = powered(test_config());

    modem.connect_with("iot.example", "user", "secret").unwrap();
    assert_eq!(mock.commands(), ["AT%PDNSET=1,iot.example,IP", "AT+CGCONTRDP=1"]);
    assert_eq!(mock.power_sequences(), 1);
}

#[test]
fn identity_queries() {
    let (mut modem, _mock) = powered(test_config());

    assert_eq!(modem.iccid().unwrap(), "89011703278100123456");
    assert_eq!(modem.mac_address().unwrap(), "11:03:78:00:23:56");
    assert_eq!(modem.msisdn().unwrap(), "882350810012345");
}

#[test]
fn iccid_on_old_firmware() {
    let (mut modem, mock) = powered(test_config());
    mock.always("AT%CCID", "AT%CCID89011703278100123456\r\n\r\nOK\r\n");

    assert_eq!(modem.iccid().unwrap(), "89011703278100123456");
}

#[test]
fn signal_and_time() {
    let (mut modem, mock) = powered(test_config());

    let signal = modem.signal().unwrap();
    assert_eq!(signal.rssi_dbm, -73);
    assert_eq!(signal.ber, 0);

    mock.reply("AT+CCLK?", "\r\n+CCLK: \"18/03/07,12:34:56-32\"\r\n\r\nOK\r\n");
    let time = modem.network_time().unwrap();
    assert_eq!(
        (time.year, time.month, time.day, time.hour, time.minute, time.second),
        (18, 3, 7, 12, 34, 56)
    );
}

#[test]
fn custom_command_truncates_into_small_buffer() {
    let (mut modem, mock) = powered(test_config());
    mock.reply("AT+CGMR", "\r\n+CGMR: ABCDEFGHIJ\r\n\r\nOK\r\n");

    let mut buf = [0u8; 8];
    assert_eq!(modem.send_custom("AT+CGMR", &mut buf, 1_000), Ok(19));
    assert_eq!(&buf, b"+CGMR: A");
    assert_eq!(modem.send_custom("AT", &mut [], 1_000), Err(Error::InvalidParameter));
}

#[test]
fn oversized_custom_response_keeps_link_up() {
    let (mut modem, mock) = powered(test_config());
    let long = format!("\r\n{}\r\n\r\nOK\r\n", "7".repeat(MAX_RESPONSE_LEN + 10));
    mock.reply("AT%DUMP", &long);

    let mut buf = [0u8; 4];
    assert_eq!(modem.send_custom("AT%DUMP", &mut buf, 1_000), Ok(MAX_RESPONSE_LEN));
    assert_eq!(&buf, b"7777");
    assert_eq!(modem.state(), LinkState::On);
    assert!(modem.registered());
}

#[test]
fn ping_validates_address() {
    let (mut modem, mock) = powered(test_config());

    assert_eq!(modem.ping_ip("1.2.3"), Err(Error::InvalidParameter));
    modem.ping_ip("8.8.8.8").unwrap();
    assert_eq!(mock.commands(), ["AT@PINGREQ=\"8.8.8.8\""]);
}

#[test]
fn signal_quality_log_skips_failed_reports() {
    let (mut modem, mock) = powered(test_config());
    mock.reply("AT%MEAS=\"8\"", ERROR);

    let mut seen = Vec::new();
    let delivered = modem.signal_quality_log(|report, _text| seen.push(report)).unwrap();
    assert_eq!(delivered, 7);
    assert_eq!(seen, [0, 1, 2, 3, 4, 5, 98]);
    assert_eq!(mock.count("AT%MEAS"), 8);
}

#[test]
fn status_snapshot_as_json() {
    let (modem, _mock) = powered(test_config());

    let mut buf = [0u8; 256];
    let n = modem.status().to_json(&mut buf).unwrap();
    let json = core::str::from_utf8(&buf[..n]).unwrap();
    assert!(json.contains("\"state\":\"On\""));
    assert!(json.contains("\"apn\":\"m2m.com.attz\""));
    assert!(json.contains("\"rssi_dbm\":-73"));
    assert!(json.contains("\"sockets_open\":0"));
}

#[test]
fn runtime_knobs() {
    let (mut modem, mock) = powered(test_config());
    modem.set_debug_level(DebugLevel::BASIC | DebugLevel::DUMP);
    assert!(modem.debug_level().contains(DebugLevel::DUMP));

    modem.set_command_timeout(300);
    mock.drop_next("AT+CCLK?");
    let start = mock.now_ms();
    assert_eq!(modem.network_time(), Err(Error::Timeout));
    assert!((300..=310).contains(&(mock.now_ms() - start)));
    assert_eq!(modem.state(), LinkState::NoResponse);

    mock.reply("AT+CCLK?", "\r\n+CCLK: \"18/03/07,12:34:56-32\"\r\n\r\nOK\r\n");
    assert_eq!(modem.network_time().unwrap().second, 56);
    assert_eq!(modem.last_response(), "+CCLK: \"18/03/07,12:34:56-32\"OK");
    assert_eq!(modem.state(), LinkState::On);
}
