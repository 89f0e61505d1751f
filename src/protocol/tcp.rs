//! TCP backend for serial-over-IP gateways.
//!
//! The gateway owns the physical UART, so baud switching is a no-op here;
//! the gateway must be configured for the meter's negotiated rate.

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::MeterError;

use super::transport::MeterPort;

pub struct TcpMeterPort {
    stream: TcpStream,
}

impl TcpMeterPort {
    /// Connects to `host:port` within the given timeout.
    pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpMeterPort, MeterError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| MeterError::Transport(format!("{addr}: connect timed out")))?
            .map_err(|e| MeterError::Transport(format!("{addr}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| MeterError::Transport(e.to_string()))?;
        Ok(TcpMeterPort { stream })
    }
}

#[async_trait]
impl MeterPort for TcpMeterPort {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf).await?;
        self.stream.flush().await
    }

    async fn set_baud(&mut self, _baud: u32) -> io::Result<()> {
        Ok(())
    }
}
