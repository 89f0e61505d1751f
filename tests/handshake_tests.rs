//! Negotiation tests driving the handshake directly over the mock port.

use iec62056_rs::constants::ACK;
use iec62056_rs::protocol::handshake::negotiate;
use iec62056_rs::protocol::serial_mock::MockMeterPort;
use iec62056_rs::protocol::transport::{CancelHandle, Transport};
use iec62056_rs::{ConnectionKind, ConnectionParams, EventSink, MeterError, ProtocolMode};

fn transport(mock: &MockMeterPort) -> Transport<MockMeterPort> {
    Transport::new(mock.clone(), EventSink::disabled(), CancelHandle::new())
}

fn params(kind: ConnectionKind, baud: u32) -> ConnectionParams {
    let mut p = ConnectionParams::new(kind, "mock");
    p.baud_rate = baud;
    p.timeout_ms = 1000;
    p
}

#[tokio::test(start_paused = true)]
async fn optical_negotiation_switches_to_meter_maximum() {
    let mock = MockMeterPort::new();
    mock.queue_ident("/MKS5M550.2251");

    let mut t = transport(&mock);
    let outcome = negotiate(&mut t, &params(ConnectionKind::Optical, 0), ProtocolMode::Readout)
        .await
        .unwrap();

    assert_eq!(outcome.baud_rate, 9600);
    assert_eq!(outcome.identity.model, "M550.2251");
    assert_eq!(mock.baud_changes(), vec![300, 9600]);
    // Mode select proposed the maximum with packet 0.
    let tx = mock.get_tx_data();
    let select = [ACK, b'0', b'5', b'0', 0x0D, 0x0A];
    assert!(tx.windows(select.len()).any(|w| w == select));
}

#[tokio::test(start_paused = true)]
async fn explicit_baud_is_kept_even_below_meter_maximum() {
    let mock = MockMeterPort::new();
    mock.queue_ident("/MKS6<2>ADM(M550.2251)");

    let mut t = transport(&mock);
    let outcome = negotiate(
        &mut t,
        &params(ConnectionKind::Rs485, 2400),
        ProtocolMode::ShortRead,
    )
    .await
    .unwrap();

    assert_eq!(outcome.identity.max_baud_rate, 19200);
    assert_eq!(outcome.baud_rate, 2400);
    assert_eq!(mock.baud_changes(), vec![2400, 2400]);
}

#[tokio::test(start_paused = true)]
async fn garbled_identification_aborts() {
    let mock = MockMeterPort::new();
    mock.queue_ident("/MKS9BADBAUD");

    let mut t = transport(&mock);
    match negotiate(&mut t, &params(ConnectionKind::Optical, 0), ProtocolMode::Readout).await {
        Err(MeterError::IdentificationParse(_)) => {}
        other => panic!("expected identification parse error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn transport_error_during_probe_is_fatal() {
    let mock = MockMeterPort::new();
    mock.set_next_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));

    let mut t = transport(&mock);
    match negotiate(&mut t, &params(ConnectionKind::Optical, 0), ProtocolMode::Readout).await {
        Err(MeterError::Transport(_)) => {}
        other => panic!("expected transport error, got {other:?}"),
    }
}