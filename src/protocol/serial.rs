//! Serial port backend.
//!
//! IEC 62056-21 runs the line at 7 data bits, even parity, one stop bit.
//! Baud switching happens in place on the open stream during negotiation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort as _, SerialPortBuilderExt, SerialStream};

use crate::error::MeterError;

use super::transport::MeterPort;

/// An open 7E1 serial line.
pub struct SerialMeterPort {
    stream: SerialStream,
    path: String,
}

impl SerialMeterPort {
    /// Opens the device at the given initial baud rate.
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<SerialMeterPort, MeterError> {
        let stream = tokio_serial::new(path, baud)
            .data_bits(tokio_serial::DataBits::Seven)
            .parity(tokio_serial::Parity::Even)
            .stop_bits(tokio_serial::StopBits::One)
            .timeout(timeout)
            .open_native_async()
            .map_err(|e| MeterError::Transport(format!("{path}: {e}")))?;
        Ok(SerialMeterPort {
            stream,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl MeterPort for SerialMeterPort {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf).await?;
        self.stream.flush().await
    }

    async fn set_baud(&mut self, baud: u32) -> io::Result<()> {
        self.stream
            .set_baud_rate(baud)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// A serial device visible on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// Enumerates serial devices, USB adapters first since optical probes are
/// nearly always USB.
pub fn list_ports() -> Result<Vec<PortInfo>, MeterError> {
    let mut ports: Vec<(bool, PortInfo)> = tokio_serial::available_ports()
        .map_err(|e| MeterError::Transport(e.to_string()))?
        .into_iter()
        .map(|p| {
            let description = match &p.port_type {
                tokio_serial::SerialPortType::UsbPort(usb) => usb
                    .product
                    .clone()
                    .unwrap_or_else(|| "USB serial device".to_string()),
                tokio_serial::SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
                tokio_serial::SerialPortType::PciPort => "PCI serial".to_string(),
                tokio_serial::SerialPortType::Unknown => "Serial device".to_string(),
            };
            let is_usb = matches!(p.port_type, tokio_serial::SerialPortType::UsbPort(_));
            (
                is_usb,
                PortInfo {
                    name: p.port_name,
                    description,
                },
            )
        })
        .collect();
    ports.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
    Ok(ports.into_iter().map(|(_, info)| info).collect())
}
