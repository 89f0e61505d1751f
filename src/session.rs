//! Session orchestration.
//!
//! [`MeterSession`] owns the port for the lifetime of a connection and runs
//! every operation as its own negotiate-exchange-break cycle, because Mode C
//! binds the packet selector at mode-select time. Results are committed
//! atomically: an operation either returns a complete typed value or an
//! error, never a partial one.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;

use crate::constants::*;
use crate::error::MeterError;
use crate::events::EventSink;
use crate::obis::code::ObisCode;
use crate::obis::decoder::{decode_block, DecodedBlock};
use crate::obis::readout;
use crate::protocol::frame::{self, ProtocolMode, ReceivedBlock};
use crate::protocol::handshake::{self, HandshakeOutcome};
use crate::protocol::serial::SerialMeterPort;
use crate::protocol::tcp::TcpMeterPort;
use crate::protocol::transport::{CancelHandle, MeterPort, ReadConfig, Transport};
use crate::records::{
    ConnectionParams, EventCategory, FullReadData, LoadProfileData, MeterIdentity,
    OutageCategory, Password, ShortReadData,
};

/// What the meter currently expects from us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionMode {
    /// No mode bound; the next operation negotiates its own.
    Idle,
    /// A programming session is open on the line.
    Programming { authenticated: bool },
}

/// Date range of a load-profile read. `None` bounds mean "everything the
/// meter holds on that side".
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl ProfileRange {
    /// Wire form: `yy-mm-dd,hh:mm;yy-mm-dd,hh:mm`, or `;` for everything.
    fn to_wire(self) -> String {
        let fmt = |t: Option<NaiveDateTime>| {
            t.map(|t| t.format("%y-%m-%d,%H:%M").to_string())
                .unwrap_or_default()
        };
        format!("{};{}", fmt(self.start), fmt(self.end))
    }
}

/// A meter reply after a command: bare acknowledgment or a data block.
enum Reply {
    Ack,
    Nak,
    Block(ReceivedBlock),
}

/// An owned connection to one meter.
pub struct MeterSession<P: MeterPort> {
    transport: Transport<P>,
    params: ConnectionParams,
    identity: Option<MeterIdentity>,
    mode: SessionMode,
}

impl MeterSession<SerialMeterPort> {
    /// Opens the serial device and wraps it in a session. No bytes are
    /// exchanged until [`MeterSession::connect`].
    pub fn open_serial(
        params: ConnectionParams,
        sink: EventSink,
    ) -> Result<MeterSession<SerialMeterPort>, MeterError> {
        let initial_baud = if params.baud_rate != 0 {
            params.baud_rate
        } else {
            OPTICAL_PROBE_BAUD
        };
        let port = SerialMeterPort::open(&params.port, initial_baud, params.timeout())?;
        Ok(MeterSession::with_port(port, params, sink))
    }
}

impl MeterSession<TcpMeterPort> {
    /// Connects to a serial-over-IP gateway and wraps it in a session.
    pub async fn open_tcp(
        params: ConnectionParams,
        sink: EventSink,
    ) -> Result<MeterSession<TcpMeterPort>, MeterError> {
        let port = TcpMeterPort::connect(&params.port, params.timeout()).await?;
        Ok(MeterSession::with_port(port, params, sink))
    }
}

impl<P: MeterPort> MeterSession<P> {
    pub fn with_port(port: P, params: ConnectionParams, sink: EventSink) -> MeterSession<P> {
        let cancel = CancelHandle::new();
        MeterSession {
            transport: Transport::new(port, sink, cancel),
            params,
            identity: None,
            mode: SessionMode::Idle,
        }
    }

    /// Handle the caller keeps to abort a long-running operation. Safe at
    /// any point; the session survives cancellation.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.transport.cancel_handle().clone()
    }

    pub fn identity(&self) -> Option<&MeterIdentity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.mode == SessionMode::Programming { authenticated: true }
    }

    /// Probes the meter: one identification handshake followed by an
    /// immediate break, establishing who we talk to without committing to a
    /// packet.
    pub async fn connect(&mut self) -> Result<MeterIdentity, MeterError> {
        self.transport.cancel_handle().reset();
        let sink = self.transport.sink().clone();
        sink.progress(1, 3, "Requesting identification");

        let outcome = self.negotiate(ProtocolMode::Readout).await?;
        sink.progress(2, 3, "Ending probe session");
        self.send_break().await;
        sink.progress(3, 3, "Connected");
        sink.success(&format!(
            "Connected to {} {}",
            outcome.identity.manufacturer, outcome.identity.model
        ));

        self.identity = Some(outcome.identity.clone());
        Ok(outcome.identity)
    }

    /// Ends any open session and consumes the handle, closing the port.
    pub async fn disconnect(mut self) {
        self.send_break().await;
        drop(self.transport.into_port());
    }

    // ------------------------------------------------------------------
    // Read operations
    // ------------------------------------------------------------------

    /// Abbreviated billing readout, packet 6.
    pub async fn read_short(&mut self) -> Result<ShortReadData, MeterError> {
        self.begin_operation().await?;
        let sink = self.transport.sink().clone();
        let total = 5;

        sink.progress(1, total, "Negotiating short read");
        self.negotiate(ProtocolMode::ShortRead).await?;

        sink.progress(2, total, "Receiving data block");
        let payload = self
            .read_paginated(Some(ProtocolMode::ShortRead), ReadConfig::short_read())
            .await?;
        let read_at_ms = Some(Local::now().timestamp_millis() as u64);

        sink.progress(3, total, "Decoding registers");
        let block = self.decode_payload(&payload);
        if block.records.is_empty() {
            return Err(MeterError::Other("empty readout block".into()));
        }
        let data = readout::build_short_read(&block, read_at_ms);

        sink.progress(4, total, "Ending session");
        self.send_break().await;

        if let Some(identity) = &mut self.identity {
            if !data.serial_number.is_empty() {
                identity.serial_number = Some(data.serial_number.clone());
            }
        }

        sink.progress(5, total, "Done");
        sink.success(&format!(
            "Short read complete: {} registers",
            block.records.len()
        ));
        Ok(data)
    }

    /// Full readout: snapshot, monthly history, warning events and outage
    /// lists. Fails as a whole if any category fails; nothing partial is
    /// returned.
    pub async fn read_full(&mut self) -> Result<FullReadData, MeterError> {
        self.begin_operation().await?;
        let sink = self.transport.sink().clone();
        let total = 9;

        sink.progress(1, total, "Reading register snapshot");
        self.negotiate(ProtocolMode::ShortRead).await?;
        let payload = self
            .read_paginated(Some(ProtocolMode::ShortRead), ReadConfig::short_read())
            .await?;
        let read_at_ms = Some(Local::now().timestamp_millis() as u64);
        let block = self.decode_payload(&payload);
        if block.records.is_empty() {
            return Err(MeterError::Other("empty readout block".into()));
        }
        let snapshot = readout::build_short_read(&block, read_at_ms);
        sink.progress(2, total, "Ending snapshot session");
        self.send_break().await;

        sink.progress(3, total, "Reading monthly history");
        self.negotiate(ProtocolMode::Monthly).await?;
        let payload = self
            .read_paginated(Some(ProtocolMode::Monthly), ReadConfig::full_read())
            .await?;
        let months = readout::build_months(&self.decode_payload(&payload));
        sink.progress(4, total, "Ending history session");
        self.send_break().await;

        sink.progress(5, total, "Reading warning events");
        self.negotiate(ProtocolMode::Events).await?;
        let payload = self
            .read_paginated(Some(ProtocolMode::Events), ReadConfig::full_read())
            .await?;
        let event_block = self.decode_payload(&payload);
        sink.progress(6, total, "Ending event session");
        self.send_break().await;

        sink.progress(7, total, "Reading outage lists");
        self.negotiate(ProtocolMode::Outages).await?;
        let payload = self
            .read_paginated(Some(ProtocolMode::Outages), ReadConfig::full_read())
            .await?;
        let outage_block = self.decode_payload(&payload);
        sink.progress(8, total, "Ending outage session");
        self.send_break().await;

        // Every category is present in the result; one the meter never
        // mentioned is simply empty.
        let mut events: HashMap<_, Vec<_>> = EventCategory::ALL
            .into_iter()
            .map(|c| (c, Vec::new()))
            .collect();
        for record in &event_block.records {
            let category = record
                .code
                .groups()
                .get(2)
                .and_then(|g| g.parse().ok())
                .and_then(EventCategory::from_register_index);
            if let Some(category) = category {
                if let Some(bucket) = events.get_mut(&category) {
                    bucket.extend(readout::build_events(&DecodedBlock {
                        records: vec![record.clone()],
                        warnings: Vec::new(),
                    }));
                }
            }
        }

        let mut outages: HashMap<_, Vec<_>> = OutageCategory::ALL
            .into_iter()
            .map(|c| (c, Vec::new()))
            .collect();
        for record in &outage_block.records {
            let category = record
                .code
                .groups()
                .get(2)
                .and_then(|g| g.parse().ok())
                .and_then(OutageCategory::from_register_index);
            if let Some(category) = category {
                if let Some(bucket) = outages.get_mut(&category) {
                    bucket.extend(readout::build_outages(&DecodedBlock {
                        records: vec![record.clone()],
                        warnings: Vec::new(),
                    }));
                }
            }
        }

        if let Some(identity) = &mut self.identity {
            if !snapshot.serial_number.is_empty() {
                identity.serial_number = Some(snapshot.serial_number.clone());
            }
        }

        sink.progress(9, total, "Done");
        sink.success("Full read complete");
        Ok(FullReadData {
            snapshot,
            months,
            events,
            outages,
        })
    }

    /// Reads one register over `R2` inside an open programming session.
    pub async fn read_obis(&mut self, code: &str) -> Result<DecodedBlock, MeterError> {
        let code = ObisCode::parse(code)?;
        self.require_programming(false)?;
        self.transport.cancel_handle().reset();

        let cmd = frame::build_read_command(&code.to_string());
        let reply = self
            .command("Read register", &cmd, ReadConfig::command_response(self.params.timeout()))
            .await?;
        match reply {
            Reply::Block(block) => {
                let text = String::from_utf8_lossy(&block.payload).to_string();
                let decoded = decode_block(&text);
                if decoded.records.is_empty() {
                    Err(MeterError::ObisNotFound(code.to_string()))
                } else {
                    Ok(decoded)
                }
            }
            Reply::Nak => Err(MeterError::DeviceRejected),
            Reply::Ack => Err(MeterError::ObisNotFound(code.to_string())),
        }
    }

    /// Reads several registers with one full readout and a lookup per code.
    /// Absent registers map to `None`.
    pub async fn read_obis_batch(
        &mut self,
        codes: &[&str],
    ) -> Result<Vec<(String, Option<String>)>, MeterError> {
        let parsed: Vec<ObisCode> = codes
            .iter()
            .map(|c| ObisCode::parse(c))
            .collect::<Result<_, _>>()?;

        self.begin_operation().await?;
        self.negotiate(ProtocolMode::Readout).await?;
        let payload = self
            .read_paginated(Some(ProtocolMode::Readout), ReadConfig::full_read())
            .await?;
        let block = self.decode_payload(&payload);
        self.send_break().await;

        let map = crate::obis::decoder::RegisterMap::new(&block);
        Ok(parsed
            .into_iter()
            .map(|code| {
                let value = map.str_value(&code.base()).map(str::to_string);
                (code.to_string(), value)
            })
            .collect())
    }

    /// Reads a load profile, optionally bounded by a date range. Requires an
    /// open programming session.
    pub async fn read_load_profile(
        &mut self,
        profile_number: u8,
        range: ProfileRange,
    ) -> Result<LoadProfileData, MeterError> {
        if !(1..=3).contains(&profile_number) {
            return Err(MeterError::Other(format!(
                "profile number {profile_number} out of range 1..=3"
            )));
        }
        self.require_programming(false)?;
        self.transport.cancel_handle().reset();
        let sink = self.transport.sink().clone();
        let total = 4;

        // The capture period register is informative only; a meter that
        // refuses it still delivers the profile.
        sink.progress(1, total, "Reading capture period");
        let period_minutes = match self.read_obis(OBIS_PROFILE_PERIOD).await {
            Ok(block) => block
                .records
                .first()
                .and_then(|r| r.value().trim().parse().ok()),
            Err(MeterError::Cancelled) => return Err(MeterError::Cancelled),
            Err(_) => None,
        };

        sink.progress(2, total, "Requesting load profile");
        let cmd = frame::build_profile_command(profile_number, &range.to_wire());
        self.transport.send("Load profile", &cmd).await?;
        // Large profiles span several EOT-continued blocks.
        let payload = self.read_paginated(None, ReadConfig::load_profile()).await?;

        sink.progress(3, total, "Decoding profile rows");
        let text = String::from_utf8_lossy(&payload).to_string();
        let (columns, entries) = readout::parse_load_profile(&text);

        sink.progress(4, total, "Done");
        sink.success(&format!("Load profile read: {} rows", entries.len()));
        Ok(LoadProfileData {
            profile_number,
            period_minutes,
            start: entries.first().map(|e| e.timestamp.clone()),
            end: entries.last().map(|e| e.timestamp.clone()),
            columns,
            entries,
        })
    }

    // ------------------------------------------------------------------
    // Programming operations
    // ------------------------------------------------------------------

    /// Opens a programming session and authenticates.
    ///
    /// After mode select the meter either sends a `P0` seed challenge,
    /// answered with an encrypted `P2`, or nothing, in which case the
    /// password goes out as plaintext `P1`. The session stays open on
    /// success so writes can follow.
    pub async fn authenticate(&mut self, password: &Password) -> Result<(), MeterError> {
        self.begin_operation().await?;
        let sink = self.transport.sink().clone();
        let total = 4;

        sink.progress(1, total, "Negotiating programming session");
        self.negotiate(ProtocolMode::Programming).await?;
        self.mode = SessionMode::Programming {
            authenticated: false,
        };

        sink.progress(2, total, "Waiting for challenge");
        let cmd = match self
            .transport
            .read_block(ReadConfig::command_response(self.params.timeout()))
            .await
        {
            Ok(raw) => match frame::parse_seed_frame(&raw) {
                Some(seed) => {
                    sink.info(&format!("Seed challenge received ({} bytes)", seed.len()));
                    let encrypted = frame::encrypt_password(password.as_bytes(), &seed);
                    frame::build_password_command('2', encrypted.as_bytes())
                }
                None => frame::build_password_command('1', password.as_bytes()),
            },
            Err(MeterError::HandshakeTimeout) => {
                sink.info("No challenge, sending plaintext password");
                frame::build_password_command('1', password.as_bytes())
            }
            Err(e) => return Err(e),
        };

        sink.progress(3, total, "Authenticating");
        self.transport.send("Password", &cmd).await?;
        let raw = self
            .transport
            .read_block(ReadConfig::command_response(self.params.timeout()))
            .await?;

        match classify(&raw)? {
            Reply::Ack => {
                self.mode = SessionMode::Programming {
                    authenticated: true,
                };
                sink.progress(4, total, "Authenticated");
                sink.success("Programming session authenticated");
                Ok(())
            }
            Reply::Nak => {
                self.mode = SessionMode::Idle;
                sink.error("Password rejected");
                sink.warn("Three failed attempts trigger the meter's 6-hour lockout");
                Err(MeterError::NotAuthenticated)
            }
            Reply::Block(block) => {
                self.mode = SessionMode::Idle;
                if block.payload.windows(2).any(|w| w == b"B0") {
                    // Break echo: too many failed attempts arm a lockout.
                    sink.error("Meter broke the session; it may be locked out after repeated failures");
                } else {
                    sink.error("Unexpected authentication response");
                }
                Err(MeterError::NotAuthenticated)
            }
        }
    }

    /// Writes one register over `W2`. Requires authentication.
    pub async fn write_obis(&mut self, code: &str, value: &str) -> Result<(), MeterError> {
        let code = ObisCode::parse(code)?;
        self.require_programming(true)?;
        self.transport.cancel_handle().reset();

        let cmd = frame::build_write_command(&code.to_string(), value);
        let reply = self
            .command("Write register", &cmd, ReadConfig::command_response(self.params.timeout()))
            .await?;
        match reply {
            Reply::Ack => {
                self.transport
                    .sink()
                    .success(&format!("Register {code} written"));
                Ok(())
            }
            Reply::Nak => Err(MeterError::DeviceRejected),
            Reply::Block(_) => Err(MeterError::Other(
                "unexpected data block after write".into(),
            )),
        }
    }

    /// Sets the meter clock to the host clock: time, date and day of week,
    /// in that order. Requires authentication.
    pub async fn sync_time(&mut self) -> Result<(), MeterError> {
        self.require_programming(true)?;
        let now = Local::now();
        let sink = self.transport.sink().clone();

        let time = format!(
            "{:02}:{:02}:{:02}",
            now.hour(),
            now.minute(),
            now.second()
        );
        let date = format!(
            "{:02}-{:02}-{:02}",
            now.year() % 100,
            now.month(),
            now.day()
        );
        let weekday = now.weekday().number_from_monday().to_string();

        self.write_obis(OBIS_TIME, &time).await?;
        self.write_obis(OBIS_DATE, &date).await?;
        self.write_obis(OBIS_DAY_OF_WEEK, &weekday).await?;

        sink.success(&format!("Meter clock set to {date} {time}"));
        Ok(())
    }

    /// Ends the current session with a break. Failures are logged, never
    /// surfaced; a meter that already timed out back to idle is fine.
    pub async fn end_session(&mut self) {
        self.send_break().await;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn negotiate(&mut self, mode: ProtocolMode) -> Result<HandshakeOutcome, MeterError> {
        let outcome = handshake::negotiate(&mut self.transport, &self.params, mode).await?;
        if self.identity.is_none() {
            self.identity = Some(outcome.identity.clone());
        }
        Ok(outcome)
    }

    /// Resets cancellation and closes any open programming session so the
    /// next negotiation starts from idle. A cancelled predecessor may have
    /// abandoned a block mid-flight; its late bytes are drained off the line
    /// before anything new is sent.
    async fn begin_operation(&mut self) -> Result<(), MeterError> {
        let was_cancelled = self.transport.cancel_handle().is_cancelled();
        self.transport.cancel_handle().reset();
        if self.mode != SessionMode::Idle {
            self.send_break().await;
            self.transport.drain().await;
        } else if was_cancelled {
            self.transport.drain().await;
        }
        Ok(())
    }

    fn require_programming(&self, need_auth: bool) -> Result<(), MeterError> {
        match self.mode {
            SessionMode::Programming { authenticated } => {
                if need_auth && !authenticated {
                    Err(MeterError::NotAuthenticated)
                } else {
                    Ok(())
                }
            }
            SessionMode::Idle => Err(if need_auth {
                MeterError::NotAuthenticated
            } else {
                MeterError::NotConnected
            }),
        }
    }

    fn decode_payload(&self, payload: &[u8]) -> DecodedBlock {
        let text = String::from_utf8_lossy(payload).to_string();
        let block = decode_block(&text);
        for warning in &block.warnings {
            self.transport.sink().warn(warning);
        }
        block
    }

    /// Sends a command and classifies the reply, retrying once on a
    /// checksum failure by asking for retransmission with NAK. A device NAK
    /// is terminal, not retried.
    async fn command(
        &mut self,
        description: &str,
        cmd: &[u8],
        cfg: ReadConfig,
    ) -> Result<Reply, MeterError> {
        self.transport.send(description, cmd).await?;
        self.read_reply(cfg).await
    }

    async fn read_reply(&mut self, cfg: ReadConfig) -> Result<Reply, MeterError> {
        let mut retries = 0;
        loop {
            let outcome = match self.transport.read_block(cfg).await {
                Ok(raw) => classify(&raw),
                Err(e) => Err(e),
            };
            match outcome {
                Err(MeterError::Checksum {
                    expected,
                    calculated,
                }) if retries < STEP_RETRY_LIMIT => {
                    retries += 1;
                    self.transport.sink().warn(&format!(
                        "Checksum mismatch (expected 0x{expected:02X}, got 0x{calculated:02X}), requesting retransmission"
                    ));
                    self.transport.send("Retransmit request", &[NAK]).await?;
                }
                Err(MeterError::HandshakeTimeout) if retries < STEP_RETRY_LIMIT => {
                    retries += 1;
                    self.transport
                        .sink()
                        .warn("No response, requesting retransmission");
                    self.transport.send("Retransmit request", &[NAK]).await?;
                }
                other => return other,
            }
        }
    }

    /// Reads a paginated sequence of blocks, ACKing each EOT-terminated
    /// block for the next one. An empty payload means end of data; repeated
    /// empty non-final blocks trip the stall detector.
    ///
    /// When `selected_mode` is given, silence before the first block means
    /// the meter rejected that packet selection.
    async fn read_paginated(
        &mut self,
        selected_mode: Option<ProtocolMode>,
        cfg: ReadConfig,
    ) -> Result<Vec<u8>, MeterError> {
        let mut payload = Vec::new();
        let mut empty_streak: u32 = 0;
        let mut first_block = true;

        loop {
            let reply = match self.read_reply(cfg).await {
                Err(MeterError::HandshakeTimeout) if first_block => {
                    return Err(match selected_mode {
                        Some(mode) => MeterError::ModeRejected {
                            mode: mode.as_char(),
                        },
                        None => MeterError::HandshakeTimeout,
                    })
                }
                other => other?,
            };
            first_block = false;
            let block = match reply {
                Reply::Block(block) => block,
                Reply::Nak => return Err(MeterError::DeviceRejected),
                Reply::Ack => continue,
            };

            let empty = block
                .payload
                .iter()
                .all(|&b| b == CR || b == LF || b == b' ');
            if empty {
                empty_streak += 1;
                if !block.more_follows {
                    break;
                }
                if empty_streak >= STALL_EMPTY_BLOCK_LIMIT {
                    return Err(MeterError::Stalled(empty_streak));
                }
            } else {
                empty_streak = 0;
                payload.extend_from_slice(&block.payload);
                if !block.more_follows {
                    break;
                }
            }

            self.transport.send("Next block", &[ACK]).await?;
        }

        Ok(payload)
    }

    /// Sends the `B0` break and settles back to idle. Never fails.
    async fn send_break(&mut self) {
        let cmd = frame::build_break_command();
        if let Err(e) = self.transport.send("Break", &cmd).await {
            self.transport
                .sink()
                .warn(&format!("Break command failed: {e}"));
        }
        self.mode = SessionMode::Idle;
        sleep(Duration::from_millis(BREAK_SETTLE_MS)).await;
    }
}

/// Splits a raw reply into acknowledgment or verified data block.
fn classify(raw: &[u8]) -> Result<Reply, MeterError> {
    match raw {
        [ACK] => Ok(Reply::Ack),
        [NAK] => Ok(Reply::Nak),
        _ => frame::decode_block(raw).map(Reply::Block),
    }
}

/// Convenience: one-shot short read over a serial port.
pub async fn short_read_serial(
    params: ConnectionParams,
    sink: EventSink,
) -> Result<ShortReadData, MeterError> {
    let mut session = MeterSession::open_serial(params, sink)?;
    let result = session.read_short().await;
    session.disconnect().await;
    result
}

/// Convenience: one-shot full read over a serial port.
pub async fn full_read_serial(
    params: ConnectionParams,
    sink: EventSink,
) -> Result<FullReadData, MeterError> {
    let mut session = MeterSession::open_serial(params, sink)?;
    let result = session.read_full().await;
    session.disconnect().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_range_wire_format() {
        let range = ProfileRange::default();
        assert_eq!(range.to_wire(), ";");

        let start = NaiveDateTime::parse_from_str("2025-03-01 10:00", "%Y-%m-%d %H:%M").unwrap();
        let end = NaiveDateTime::parse_from_str("2025-03-02 10:00", "%Y-%m-%d %H:%M").unwrap();
        let range = ProfileRange {
            start: Some(start),
            end: Some(end),
        };
        assert_eq!(range.to_wire(), "25-03-01,10:00;25-03-02,10:00");
    }

    #[test]
    fn classify_single_bytes() {
        assert!(matches!(classify(&[ACK]), Ok(Reply::Ack)));
        assert!(matches!(classify(&[NAK]), Ok(Reply::Nak)));
        assert!(classify(&[0x00]).is_err());
    }
}
