//! Byte-pipe abstraction under the protocol engine.
//!
//! [`MeterPort`] is the seam between protocol logic and the physical link;
//! serial, TCP and the in-memory mock all implement it. [`Transport`] layers
//! framing-aware reads, idle timeouts, cancellation checks and event
//! emission on top of a port.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

use crate::constants::*;
use crate::error::MeterError;
use crate::events::EventSink;

use super::frame;

/// Raw byte pipe to a meter.
#[async_trait]
pub trait MeterPort: Send {
    /// Reads available bytes. `Ok(0)` means no data right now, not EOF;
    /// callers poll with their own idle timeout.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Reconfigures the line speed. A no-op on links without a UART.
    async fn set_baud(&mut self, baud: u32) -> io::Result<()>;
}

/// Cooperative cancellation flag shared between an operation and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> CancelHandle {
        CancelHandle::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears the flag so the handle can be reused for the next operation.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Tuning for one block read.
#[derive(Debug, Clone, Copy)]
pub struct ReadConfig {
    /// Grace period before the first byte must arrive.
    pub initial_timeout: Duration,
    /// Sliding window: reset on every received byte.
    pub idle_timeout: Duration,
    /// Hard cap on the buffered block.
    pub max_len: usize,
}

impl ReadConfig {
    pub fn short_read() -> ReadConfig {
        ReadConfig {
            initial_timeout: Duration::from_millis(SHORT_READ_IDLE_TIMEOUT_MS),
            idle_timeout: Duration::from_millis(SHORT_READ_IDLE_TIMEOUT_MS),
            max_len: SHORT_READ_BUFFER,
        }
    }

    pub fn full_read() -> ReadConfig {
        ReadConfig {
            initial_timeout: Duration::from_millis(FULL_READ_IDLE_TIMEOUT_MS),
            idle_timeout: Duration::from_millis(FULL_READ_IDLE_TIMEOUT_MS),
            max_len: FULL_READ_BUFFER,
        }
    }

    pub fn load_profile() -> ReadConfig {
        ReadConfig {
            initial_timeout: Duration::from_millis(LOAD_PROFILE_IDLE_TIMEOUT_MS),
            idle_timeout: Duration::from_millis(LOAD_PROFILE_IDLE_TIMEOUT_MS),
            max_len: LOAD_PROFILE_BUFFER,
        }
    }

    pub fn command_response(timeout: Duration) -> ReadConfig {
        ReadConfig {
            initial_timeout: timeout,
            idle_timeout: timeout,
            max_len: SHORT_READ_BUFFER,
        }
    }
}

/// A [`MeterPort`] plus the cross-cutting concerns every exchange needs.
pub struct Transport<P: MeterPort> {
    port: P,
    sink: EventSink,
    cancel: CancelHandle,
}

impl<P: MeterPort> Transport<P> {
    pub fn new(port: P, sink: EventSink, cancel: CancelHandle) -> Transport<P> {
        Transport { port, sink, cancel }
    }

    pub fn sink(&self) -> &EventSink {
        &self.sink
    }

    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    pub fn into_port(self) -> P {
        self.port
    }

    fn check_cancelled(&self) -> Result<(), MeterError> {
        if self.cancel.is_cancelled() {
            Err(MeterError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub async fn set_baud(&mut self, baud: u32) -> Result<(), MeterError> {
        self.sink.info(&format!("Switching line to {baud} baud"));
        self.port.set_baud(baud).await?;
        Ok(())
    }

    /// Writes a complete message and logs it.
    pub async fn send(&mut self, description: &str, data: &[u8]) -> Result<(), MeterError> {
        self.check_cancelled()?;
        self.sink
            .log_tx(&format!("{description}: {}", frame::format_bytes(data)), data);
        self.port.write_all(data).await?;
        Ok(())
    }

    /// Polls the port once, mapping "nothing yet" to `Ok(0)` after a short
    /// sleep so the caller's idle accounting stays simple.
    async fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, MeterError> {
        let poll = Duration::from_millis(READ_POLL_INTERVAL_MS);
        match timeout(poll, self.port.read(buf)).await {
            Ok(Ok(0)) => {
                sleep(poll).await;
                Ok(0)
            }
            Ok(Ok(n)) => {
                self.sink.activity(crate::events::Activity::Rx);
                Ok(n)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(0),
        }
    }

    /// Discards whatever sits in the receive buffer, typically the tail of a
    /// block abandoned by a cancelled or failed operation. Ignores the
    /// cancellation flag so cleanup after a cancel still runs.
    pub async fn drain(&mut self) {
        let mut buf = [0u8; 64];
        let mut total = 0usize;
        loop {
            let poll = Duration::from_millis(READ_POLL_INTERVAL_MS);
            match timeout(poll, self.port.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => total += n,
                _ => break,
            }
        }
        if total > 0 {
            self.sink
                .info(&format!("Discarded {total} stale bytes from the line"));
        }
    }

    /// Reads up to and including an LF, the identification-line terminator.
    pub async fn read_line(&mut self, wait: Duration) -> Result<Vec<u8>, MeterError> {
        let deadline = Instant::now() + wait;
        let mut line = Vec::with_capacity(64);
        let mut buf = [0u8; 1];
        loop {
            self.check_cancelled()?;
            if self.poll_read(&mut buf).await? == 1 {
                line.push(buf[0]);
                if buf[0] == LF {
                    self.sink.log_rx(
                        &format!("Identification: {}", frame::format_bytes(&line)),
                        &line,
                    );
                    return Ok(line);
                }
                if line.len() > 128 {
                    return Err(MeterError::IdentificationParse(
                        "identification line exceeds 128 bytes".into(),
                    ));
                }
                continue;
            }
            if Instant::now() >= deadline {
                return if line.is_empty() {
                    Err(MeterError::HandshakeTimeout)
                } else {
                    Err(MeterError::IdentificationParse(
                        "identification line truncated".into(),
                    ))
                };
            }
        }
    }

    /// Reads one data block through its terminator (ETX or EOT) and the BCC
    /// byte that follows, consuming nothing past the BCC. The sliding idle
    /// window resets on every byte.
    ///
    /// A leading ACK or NAK byte short-circuits: some exchanges answer a
    /// command with a bare acknowledgment instead of a block.
    pub async fn read_block(&mut self, cfg: ReadConfig) -> Result<Vec<u8>, MeterError> {
        let mut data = BytesMut::with_capacity(1024);
        let mut window = cfg.initial_timeout;
        let mut last_byte = Instant::now();
        let mut terminator_seen = false;
        let mut buf = [0u8; 1];

        loop {
            self.check_cancelled()?;
            if self.poll_read(&mut buf).await? == 1 {
                let byte = buf[0];
                last_byte = Instant::now();
                window = cfg.idle_timeout;

                if data.is_empty() && (byte == ACK || byte == NAK) {
                    self.sink.log_rx(
                        &format!("Response: {}", frame::format_bytes(&[byte])),
                        &[byte],
                    );
                    return Ok(vec![byte]);
                }

                data.put_u8(byte);
                if terminator_seen {
                    // That byte was the BCC; the block is complete.
                    self.sink.log_rx(
                        &format!("Block ({} bytes)", data.len()),
                        &data[..data.len().min(2000)],
                    );
                    return Ok(data.to_vec());
                }
                if byte == ETX || byte == EOT {
                    terminator_seen = true;
                }
                if data.len() >= cfg.max_len {
                    return Err(MeterError::Other(format!(
                        "data block exceeds {} bytes",
                        cfg.max_len
                    )));
                }
                continue;
            }

            if last_byte.elapsed() >= window {
                return if data.is_empty() {
                    Err(MeterError::HandshakeTimeout)
                } else {
                    Err(MeterError::Other(format!(
                        "data block truncated after {} bytes",
                        data.len()
                    )))
                };
            }
        }
    }
}
