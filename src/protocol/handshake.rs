//! Handshake and baud negotiation.
//!
//! Mode C opens every session the same way: identification request at the
//! probe baud, identification response naming the meter's maximum speed,
//! mode-select ACK proposing that speed and the wanted packet, then the UART
//! switch after a settle delay. The packet selector is bound at ACK time, so
//! a session wanting a different packet renegotiates from the top.

use std::time::Duration;
use tokio::time::sleep;

use crate::constants::*;
use crate::error::MeterError;
use crate::records::{ConnectionKind, ConnectionParams, MeterIdentity};

use super::frame::{self, ProtocolMode};
use super::transport::{MeterPort, Transport};

/// Where the negotiation currently stands. Phases only ever advance; any
/// error aborts the attempt instead of rewinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    IdentSent,
    IdentReceived,
    ModeSelected,
    Active,
}

/// Result of a completed negotiation.
#[derive(Debug, Clone)]
pub struct HandshakeOutcome {
    pub identity: MeterIdentity,
    /// Line speed both sides run at after the switch.
    pub baud_rate: u32,
}

/// Maps the identification baud character to its rate.
pub fn baud_rate_from_char(c: char) -> Option<u32> {
    match c {
        '0' => Some(300),
        '1' => Some(600),
        '2' => Some(1200),
        '3' => Some(2400),
        '4' => Some(4800),
        '5' => Some(9600),
        '6' => Some(19200),
        _ => None,
    }
}

/// Inverse of [`baud_rate_from_char`].
pub fn char_from_baud_rate(baud: u32) -> Option<char> {
    match baud {
        300 => Some('0'),
        600 => Some('1'),
        1200 => Some('2'),
        2400 => Some('3'),
        4800 => Some('4'),
        9600 => Some('5'),
        19200 => Some('6'),
        _ => None,
    }
}

/// Baud rates to probe the identification request at, in order.
pub fn resolve_initial_bauds(kind: ConnectionKind, requested: u32) -> Vec<u32> {
    if requested != 0 {
        return vec![requested];
    }
    match kind {
        ConnectionKind::Optical => vec![OPTICAL_PROBE_BAUD],
        ConnectionKind::Rs485 => vec![9600, 300, 19200],
        ConnectionKind::Tcp => vec![9600, 300],
    }
}

/// Speed to propose in the mode-select ACK: an explicit request wins,
/// otherwise the maximum the meter advertised.
pub fn resolve_target_baud(requested: u32, meter_max: u32) -> u32 {
    if requested != 0 {
        requested
    } else {
        meter_max
    }
}

/// Parses an identification response line.
///
/// Two forms exist: the standard `/XXXZ<model>` and the extended
/// `/XXXZ<gen>UTIL(<model>)` carrying a protocol generation marker and the
/// distribution-company id.
pub fn parse_identification(line: &str) -> Result<MeterIdentity, MeterError> {
    let line = line.trim();
    let content = line
        .strip_prefix('/')
        .ok_or_else(|| MeterError::IdentificationParse(format!("missing '/' prefix: {line}")))?;

    if content.len() < 4 {
        return Err(MeterError::IdentificationParse(format!(
            "identification too short: {line}"
        )));
    }

    let manufacturer = content[..3].to_string();
    if !manufacturer.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(MeterError::IdentificationParse(format!(
            "bad manufacturer flag: {manufacturer}"
        )));
    }

    let baud_rate_char = content
        .chars()
        .nth(3)
        .ok_or_else(|| MeterError::IdentificationParse(line.to_string()))?;
    let max_baud_rate = baud_rate_from_char(baud_rate_char).ok_or_else(|| {
        MeterError::IdentificationParse(format!("unknown baud character: {baud_rate_char}"))
    })?;

    let rest = &content[4..];
    let (generation, utility_id, model) = if rest.starts_with('<') {
        let gen_end = rest.find('>').ok_or_else(|| {
            MeterError::IdentificationParse(format!("unterminated generation marker: {line}"))
        })?;
        let generation = rest[1..gen_end].to_string();
        let after_gen = &rest[gen_end + 1..];
        let open = after_gen.find('(').ok_or_else(|| {
            MeterError::IdentificationParse(format!("missing model field: {line}"))
        })?;
        let close = after_gen.rfind(')').filter(|&c| c > open).ok_or_else(|| {
            MeterError::IdentificationParse(format!("unterminated model field: {line}"))
        })?;
        (
            generation,
            after_gen[..open].to_string(),
            after_gen[open + 1..close].to_string(),
        )
    } else {
        (String::new(), String::new(), rest.to_string())
    };

    Ok(MeterIdentity {
        manufacturer,
        utility_id,
        model,
        baud_rate_char,
        generation,
        max_baud_rate,
        serial_number: None,
    })
}

/// Drives one full negotiation on an open port, leaving the line switched to
/// the negotiated speed with the requested packet selected.
///
/// Probes each candidate baud in turn; only a silent meter moves to the next
/// candidate, any other failure aborts.
pub async fn negotiate<P: MeterPort>(
    transport: &mut Transport<P>,
    params: &ConnectionParams,
    mode: ProtocolMode,
) -> Result<HandshakeOutcome, MeterError> {
    let enter = |phase: HandshakePhase| {
        crate::logging::log_debug(&format!("handshake phase: {phase:?}"));
    };
    enter(HandshakePhase::Idle);
    let bauds = resolve_initial_bauds(params.kind, params.baud_rate);
    let request = frame::build_ident_request(params.address.as_deref());

    let mut line = None;
    for (attempt, &baud) in bauds.iter().enumerate() {
        if params.kind != ConnectionKind::Tcp {
            transport.set_baud(baud).await?;
        }
        transport.send("Identification request", &request).await?;
        enter(HandshakePhase::IdentSent);
        sleep(Duration::from_millis(IDENT_RESPONSE_DELAY_MS)).await;

        match transport.read_line(params.timeout()).await {
            Ok(bytes) => {
                line = Some(String::from_utf8_lossy(&bytes).to_string());
                break;
            }
            Err(MeterError::HandshakeTimeout) if attempt + 1 < bauds.len() => {
                transport
                    .sink()
                    .warn(&format!("No response at {baud} baud, trying next rate"));
            }
            Err(e) => return Err(e),
        }
    }
    let line = line.ok_or(MeterError::HandshakeTimeout)?;

    let identity = parse_identification(&line)?;
    enter(HandshakePhase::IdentReceived);
    transport.sink().info(&format!(
        "Meter identified: {} {} (max {} baud)",
        identity.manufacturer, identity.model, identity.max_baud_rate
    ));

    let target = resolve_target_baud(params.baud_rate, identity.max_baud_rate);
    let baud_char = char_from_baud_rate(target).ok_or_else(|| {
        MeterError::Other(format!("no baud character for {target} baud"))
    })?;

    let select = frame::build_mode_select(mode, baud_char);
    transport.send("Mode select", &select).await?;
    enter(HandshakePhase::ModeSelected);

    // The meter switches its own UART after the ACK; match it after the
    // settle window.
    sleep(Duration::from_millis(BAUD_SWITCH_SETTLE_MS)).await;
    if params.kind != ConnectionKind::Tcp {
        transport.set_baud(target).await?;
    }
    enter(HandshakePhase::Active);

    Ok(HandshakeOutcome {
        identity,
        baud_rate: target,
    })
}
