//! End-to-end session tests against the mock port.
//!
//! Each test scripts the meter side of the exchange up front, runs the
//! operation under a paused tokio clock so settle delays cost nothing, then
//! inspects the result and the bytes the session wrote.

use iec62056_rs::constants::{ACK, NAK};
use iec62056_rs::protocol::serial_mock::MockMeterPort;
use iec62056_rs::records::{BatteryState, EventCategory};
use iec62056_rs::{
    ConnectionKind, ConnectionParams, EventSink, MeterError, MeterSession, Password,
    ProfileRange,
};

const IDENT: &str = "/MKS5<2>ADM(M550.2251)";

const SHORT_READ_PAYLOAD: &[u8] = b"0.0.0(12345678)\r\n\
0.9.1(21:30:15)\r\n\
0.9.2(25-03-01)\r\n\
1.8.0(123456.789*kWh)\r\n\
32.7.0(231.4*V)\r\n\
96.6.1(1)\r\n\
!\r\n";

fn params() -> ConnectionParams {
    let mut p = ConnectionParams::new(ConnectionKind::Optical, "mock");
    p.timeout_ms = 2000;
    p
}

fn session(mock: &MockMeterPort) -> MeterSession<MockMeterPort> {
    MeterSession::with_port(mock.clone(), params(), EventSink::disabled())
}

/// Count occurrences of a byte sequence in the written stream.
fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[tokio::test(start_paused = true)]
async fn connect_probes_identity_and_breaks() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);

    let mut session = session(&mock);
    let identity = session.connect().await.unwrap();

    assert_eq!(identity.manufacturer, "MKS");
    assert_eq!(identity.model, "M550.2251");
    assert_eq!(identity.max_baud_rate, 9600);

    let tx = mock.get_tx_data();
    assert_eq!(count_occurrences(&tx, b"/?!\r\n"), 1);
    // Probe at 300 baud, then the switch to the advertised maximum.
    assert_eq!(mock.baud_changes(), vec![300, 9600]);
    // The probe ends with a break so no packet stays bound.
    assert_eq!(count_occurrences(&tx, &[0x01, b'B', b'0']), 1);
}

#[tokio::test(start_paused = true)]
async fn short_read_decodes_snapshot() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_block(SHORT_READ_PAYLOAD, true);

    let mut session = session(&mock);
    let data = session.read_short().await.unwrap();

    assert_eq!(data.serial_number, "12345678");
    assert_eq!(data.active_energy_import_total, 123456.789);
    assert_eq!(data.voltage_l1, 231.4);
    assert_eq!(data.meter_time, "21:30:15");
    assert_eq!(data.battery, BatteryState::Full);
    assert!(data.read_at_ms.is_some());

    // Mode select asked for packet 6 at the meter's maximum rate.
    let tx = mock.get_tx_data();
    assert_eq!(count_occurrences(&tx, &[ACK, b'0', b'5', b'6', 0x0D, 0x0A]), 1);
    assert_eq!(session.identity().unwrap().serial_number.as_deref(), Some("12345678"));
}

#[tokio::test(start_paused = true)]
async fn corrupt_block_is_retried_exactly_once() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_corrupt_block(SHORT_READ_PAYLOAD, 0xFF);
    mock.queue_block(SHORT_READ_PAYLOAD, true);

    let mut session = session(&mock);
    let data = session.read_short().await.unwrap();
    assert_eq!(data.serial_number, "12345678");

    // Exactly one NAK went out to request retransmission.
    assert_eq!(count_occurrences(&mock.get_tx_data(), &[NAK]), 1);
}

#[tokio::test(start_paused = true)]
async fn persistent_corruption_is_terminal() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_corrupt_block(SHORT_READ_PAYLOAD, 0x55);
    mock.queue_corrupt_block(SHORT_READ_PAYLOAD, 0x55);

    let mut session = session(&mock);
    match session.read_short().await {
        Err(MeterError::Checksum { .. }) => {}
        other => panic!("expected checksum error, got {other:?}"),
    }
    assert_eq!(count_occurrences(&mock.get_tx_data(), &[NAK]), 1);
}

#[tokio::test(start_paused = true)]
async fn full_read_paginates_and_keeps_empty_categories() {
    let mock = MockMeterPort::new();
    // Snapshot over two blocks: EOT continuation, then the final ETX block.
    mock.queue_ident(IDENT);
    mock.queue_block(b"0.0.0(12345678)\r\n1.8.0(100.0*kWh)\r\n", false);
    mock.queue_block(b"32.7.0(230.0*V)\r\n!\r\n", true);
    // Monthly history.
    mock.queue_ident(IDENT);
    mock.queue_block(
        b"1.8.0*01(90.0*kWh)\r\n1.6.0*01(3.1*kW)(25-02-10,09:15)\r\n",
        true,
    );
    // Events: one magnetic event, other categories silent.
    mock.queue_ident(IDENT);
    mock.queue_block(
        b"99.98.3(25-02-10,14:00)(25-02-10,14:05)(00:05)(magnetic field)\r\n",
        true,
    );
    // Outages: nothing at all.
    mock.queue_ident(IDENT);
    mock.queue_block(b"\r\n", true);

    let mut session = session(&mock);
    let data = session.read_full().await.unwrap();

    assert_eq!(data.snapshot.serial_number, "12345678");
    assert_eq!(data.snapshot.voltage_l1, 230.0);
    assert_eq!(data.months.len(), 1);
    assert_eq!(data.months[0].max_demand, 3.1);

    assert_eq!(data.events[&EventCategory::Magnetic].len(), 1);
    assert!(data.events[&EventCategory::Voltage].is_empty());
    assert!(data.events[&EventCategory::Cover].is_empty());
    // All eight outage categories exist and are empty.
    assert_eq!(data.outages.len(), 8);
    assert!(data.outages.values().all(Vec::is_empty));

    // The EOT block was acknowledged to fetch the next one.
    assert!(count_occurrences(&mock.get_tx_data(), &[ACK]) >= 1);
}

#[tokio::test(start_paused = true)]
async fn authenticate_answers_seed_with_encrypted_p2() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    // Seed decodes to "ABCDEFGH".
    mock.queue_seed_frame(b"QUJDREVGR0g=");
    mock.queue_byte(ACK);

    let mut session = session(&mock);
    let password = Password::new("00000000").unwrap();
    session.authenticate(&password).await.unwrap();
    assert!(session.is_authenticated());

    let tx = mock.get_tx_data();
    let expected: Vec<u8> = b"ABCDEFGH".iter().map(|b| b ^ b'0').collect();
    let expected_hex = expected.iter().map(|b| format!("{b:02X}")).collect::<String>();
    assert_eq!(count_occurrences(&tx, &[0x01, b'P', b'2']), 1);
    assert_eq!(count_occurrences(&tx, expected_hex.as_bytes()), 1);
    // The plaintext password never went on the wire.
    assert_eq!(count_occurrences(&tx, b"(00000000)"), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_password_is_not_authenticated() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_seed_frame(b"QUJDREVGR0g=");
    mock.queue_byte(NAK);

    let mut session = session(&mock);
    let password = Password::new("11111111").unwrap();
    match session.authenticate(&password).await {
        Err(MeterError::NotAuthenticated) => {}
        other => panic!("expected NotAuthenticated, got {other:?}"),
    }
    assert!(!session.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn write_requires_authentication() {
    let mock = MockMeterPort::new();
    let mut session = session(&mock);
    match session.write_obis("0.9.1", "12:00:00").await {
        Err(MeterError::NotAuthenticated) => {}
        other => panic!("expected NotAuthenticated, got {other:?}"),
    }
    // Nothing was sent.
    assert!(mock.get_tx_data().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sync_time_writes_clock_registers_in_order() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_seed_frame(b"QUJDREVGR0g=");
    mock.queue_byte(ACK); // auth
    mock.queue_byte(ACK); // time
    mock.queue_byte(ACK); // date
    mock.queue_byte(ACK); // day of week

    let mut session = session(&mock);
    let password = Password::new("00000000").unwrap();
    session.authenticate(&password).await.unwrap();
    session.sync_time().await.unwrap();

    let tx = mock.get_tx_data();
    let time_pos = find_pos(&tx, b"\x020.9.1(").expect("no time write in tx");
    let date_pos = find_pos(&tx, b"\x020.9.2(").expect("no date write in tx");
    let dow_pos = find_pos(&tx, b"\x020.9.5(").expect("no day-of-week write in tx");
    assert!(time_pos < date_pos && date_pos < dow_pos);
}

fn find_pos(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[tokio::test(start_paused = true)]
async fn load_profile_reads_period_and_rows() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_seed_frame(b"QUJDREVGR0g=");
    mock.queue_byte(ACK);
    // Capture period register, then the profile rows.
    mock.queue_block(b"0.8.4(15)\r\n", true);
    mock.queue_block(
        b"P.01(25-03-01,10:00)(000.512*kWh)(000.120*kvarh)\r\n\
P.01(25-03-01,10:15)(000.498*kWh)(000.115*kvarh)\r\n",
        true,
    );

    let mut session = session(&mock);
    let password = Password::new("00000000").unwrap();
    session.authenticate(&password).await.unwrap();
    let data = session
        .read_load_profile(1, ProfileRange::default())
        .await
        .unwrap();

    assert_eq!(data.period_minutes, Some(15));
    assert_eq!(data.entries.len(), 2);
    assert_eq!(data.entries[0].values, vec![0.512, 0.120]);
    assert_eq!(data.start.as_deref(), Some("25-03-01,10:00"));
    assert_eq!(data.end.as_deref(), Some("25-03-01,10:15"));

    // The profile request carried the open range selector.
    assert_eq!(count_occurrences(&mock.get_tx_data(), b"P.01(;)"), 1);
}

#[tokio::test(start_paused = true)]
async fn load_profile_spanning_several_blocks_is_read_completely() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_seed_frame(b"QUJDREVGR0g=");
    mock.queue_byte(ACK);
    mock.queue_block(b"0.8.4(15)\r\n", true);
    // The meter splits the profile: EOT continuation, then the final block.
    mock.queue_block(
        b"P.01(25-03-01,10:00)(000.512*kWh)\r\n\
P.01(25-03-01,10:15)(000.498*kWh)\r\n",
        false,
    );
    mock.queue_block(
        b"P.01(25-03-01,10:30)(000.520*kWh)\r\n\
P.01(25-03-01,10:45)(000.505*kWh)\r\n",
        true,
    );

    let mut session = session(&mock);
    let password = Password::new("00000000").unwrap();
    session.authenticate(&password).await.unwrap();
    let data = session
        .read_load_profile(1, ProfileRange::default())
        .await
        .unwrap();

    // Rows from both blocks, in order, with nothing left unread.
    assert_eq!(data.entries.len(), 4);
    assert_eq!(data.start.as_deref(), Some("25-03-01,10:00"));
    assert_eq!(data.end.as_deref(), Some("25-03-01,10:45"));
    assert_eq!(mock.rx_remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_empty_continuation_blocks_stall_out() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_block(b"\r\n", false);
    mock.queue_block(b"\r\n", false);
    mock.queue_block(b"\r\n", false);

    let mut session = session(&mock);
    match session.read_short().await {
        Err(MeterError::Stalled(3)) => {}
        other => panic!("expected stall, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn read_obis_outside_programming_session_fails() {
    let mock = MockMeterPort::new();
    let mut session = session(&mock);
    match session.read_obis("1.8.0").await {
        Err(MeterError::NotConnected) => {}
        other => panic!("expected NotConnected, got {other:?}"),
    }
    assert!(mock.get_tx_data().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelled_load_profile_leaves_session_usable() {
    let mock = MockMeterPort::new();
    mock.queue_ident(IDENT);
    mock.queue_seed_frame(b"QUJDREVGR0g=");
    mock.queue_byte(ACK);
    // Capture period, then the meter goes quiet mid-profile; the operation
    // hangs in the block read until the cancel fires.
    mock.queue_block(b"0.8.4(15)\r\n", true);

    let mut session = session(&mock);
    let password = Password::new("00000000").unwrap();
    session.authenticate(&password).await.unwrap();

    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(5000)).await;
        cancel.cancel();
    });

    match session.read_load_profile(1, ProfileRange::default()).await {
        Err(MeterError::Cancelled) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }

    // The abandoned row straggles in after the cancel. The next operation
    // must sweep it off the line instead of parsing it as an identification.
    mock.queue_rx_data(b"P.01(25-03-01,10:15)(000.498*kWh)\r\n");
    let late = mock.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        late.queue_ident(IDENT);
        late.queue_block(SHORT_READ_PAYLOAD, true);
    });

    let data = session.read_short().await.unwrap();
    assert_eq!(data.serial_number, "12345678");
}

#[tokio::test(start_paused = true)]
async fn break_failure_is_nonfatal() {
    let mock = MockMeterPort::new();
    let mut session = session(&mock);

    // The break write fails; end_session swallows it.
    mock.set_next_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
    session.end_session().await;

    // The session is still usable afterwards.
    mock.queue_ident(IDENT);
    mock.queue_block(SHORT_READ_PAYLOAD, true);
    let data = session.read_short().await.unwrap();
    assert_eq!(data.serial_number, "12345678");
}

#[tokio::test(start_paused = true)]
async fn mode_rejection_when_meter_goes_silent_after_select() {
    let mock = MockMeterPort::new();
    // Identification succeeds, but nothing follows the mode select.
    mock.queue_ident(IDENT);

    let mut session = session(&mock);
    match session.read_short().await {
        Err(MeterError::ModeRejected { mode: '6' }) => {}
        other => panic!("expected ModeRejected, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn silent_meter_times_out() {
    let mock = MockMeterPort::new();
    let mut session = session(&mock);
    match session.read_short().await {
        Err(MeterError::HandshakeTimeout) => {}
        other => panic!("expected HandshakeTimeout, got {other:?}"),
    }
}
