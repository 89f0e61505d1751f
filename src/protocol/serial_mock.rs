//! Mock meter port for testing.
//!
//! Simulates the device side of a Mode C exchange without hardware. Tests
//! queue the meter's responses up front, run the code under test, then
//! inspect what was written. Clones share buffers, so a test keeps one clone
//! for inspection while the transport owns another.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::constants::{ETX, EOT, STX};
use crate::protocol::frame::bcc;

use super::transport::MeterPort;

#[derive(Clone, Default)]
pub struct MockMeterPort {
    /// Bytes written by the code under test.
    tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Bytes the mock meter will answer with.
    rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Error injected into the next read or write.
    next_error: Arc<Mutex<Option<io::Error>>>,
    /// Baud rates the code under test switched to, in order.
    baud_changes: Arc<Mutex<Vec<u32>>>,
}

impl MockMeterPort {
    pub fn new() -> MockMeterPort {
        MockMeterPort::default()
    }

    /// Queue raw bytes for the code under test to read.
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.rx_buffer.lock().unwrap().extend(data.iter().copied());
    }

    pub fn queue_byte(&self, byte: u8) {
        self.queue_rx_data(&[byte]);
    }

    /// Queue an identification line, CRLF-terminated.
    pub fn queue_ident(&self, ident: &str) {
        self.queue_rx_data(ident.as_bytes());
        self.queue_rx_data(b"\r\n");
    }

    /// Queue a framed data block with a valid BCC. A non-final block ends in
    /// EOT instead of ETX.
    pub fn queue_block(&self, payload: &[u8], is_final: bool) {
        self.queue_rx_data(&frame_block(payload, is_final, None));
    }

    /// Queue a framed data block whose BCC is off by the given XOR mask.
    pub fn queue_corrupt_block(&self, payload: &[u8], mask: u8) {
        self.queue_rx_data(&frame_block(payload, true, Some(mask)));
    }

    /// Queue a `P0` seed challenge frame.
    pub fn queue_seed_frame(&self, seed: &[u8]) {
        let mut msg = vec![crate::constants::SOH, b'P', b'0', STX, b'('];
        msg.extend_from_slice(seed);
        msg.push(b')');
        msg.push(ETX);
        let check = bcc(&msg[3..]);
        msg.push(check);
        self.queue_rx_data(&msg);
    }

    /// Everything written so far.
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.tx_buffer.lock().unwrap().clone()
    }

    /// Drains the write buffer, returning its contents.
    pub fn take_tx_data(&self) -> Vec<u8> {
        std::mem::take(&mut self.tx_buffer.lock().unwrap())
    }

    pub fn baud_changes(&self) -> Vec<u32> {
        self.baud_changes.lock().unwrap().clone()
    }

    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    pub fn clear(&self) {
        self.tx_buffer.lock().unwrap().clear();
        self.rx_buffer.lock().unwrap().clear();
    }

    pub fn rx_remaining(&self) -> usize {
        self.rx_buffer.lock().unwrap().len()
    }
}

/// Builds a `STX payload TERM BCC` block, optionally corrupting the BCC.
pub fn frame_block(payload: &[u8], is_final: bool, corrupt_mask: Option<u8>) -> Vec<u8> {
    let mut block = vec![STX];
    block.extend_from_slice(payload);
    block.push(if is_final { ETX } else { EOT });
    let check = bcc(&block[1..]);
    block.push(check ^ corrupt_mask.unwrap_or(0));
    block
}

#[async_trait]
impl MeterPort for MockMeterPort {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.next_error.lock().unwrap().take() {
            return Err(err);
        }
        let mut rx = self.rx_buffer.lock().unwrap();
        let mut n = 0;
        while n < buf.len() {
            match rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Some(err) = self.next_error.lock().unwrap().take() {
            return Err(err);
        }
        self.tx_buffer.lock().unwrap().extend_from_slice(buf);
        Ok(())
    }

    async fn set_baud(&mut self, baud: u32) -> io::Result<()> {
        self.baud_changes.lock().unwrap().push(baud);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_round_trip() {
        let mock = MockMeterPort::new();
        mock.queue_rx_data(b"hello");

        let mut port = mock.clone();
        let mut buf = [0u8; 8];
        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(port.read(&mut buf).await.unwrap(), 0);

        port.write_all(b"world").await.unwrap();
        assert_eq!(mock.get_tx_data(), b"world");
    }

    #[tokio::test]
    async fn injected_error_fires_once() {
        let mock = MockMeterPort::new();
        mock.set_next_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));

        let mut port = mock.clone();
        let mut buf = [0u8; 4];
        assert!(port.read(&mut buf).await.is_err());
        assert_eq!(port.read(&mut buf).await.unwrap(), 0);
    }

    #[test]
    fn framed_block_has_valid_bcc() {
        let block = frame_block(b"1.8.0(1.0)\r\n", true, None);
        assert_eq!(block[0], STX);
        assert_eq!(block[block.len() - 2], ETX);
        assert_eq!(block[block.len() - 1], bcc(&block[1..block.len() - 1]));
    }
}
