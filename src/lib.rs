//! # iec62056-rs
//!
//! An IEC 62056-21 Mode C client for reading and programming electricity
//! meters over optical probes, RS-485 links and serial-over-IP gateways.
//!
//! The crate handles the whole session: identification handshake with baud
//! negotiation, BCC-checked frame exchange, OBIS data-block decoding, and
//! the programming-mode command set (password authentication, register
//! writes, clock sync, load-profile download).
//!
//! ## Quick start
//!
//! ```no_run
//! use iec62056_rs::{ConnectionKind, ConnectionParams, EventSink, MeterSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), iec62056_rs::MeterError> {
//!     let params = ConnectionParams::new(ConnectionKind::Optical, "/dev/ttyUSB0");
//!     let mut session = MeterSession::open_serial(params, EventSink::disabled())?;
//!     let identity = session.connect().await?;
//!     println!("meter: {} {}", identity.manufacturer, identity.model);
//!
//!     let data = session.read_short().await?;
//!     println!("import total: {} kWh", data.active_energy_import_total);
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! Long operations report progress and raw traffic through an
//! [`EventSink`]/[`EventStream`] pair and can be aborted at any time with
//! the session's [`CancelHandle`].

pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod obis;
pub mod protocol;
pub mod records;
pub mod session;

pub use error::MeterError;
pub use events::{Activity, EventSink, EventStream, LogEvent, LogLevel, ProgressEvent, SessionEvent};
pub use obis::{decode_block, DecodedBlock, ObisCode, ObisRecord, RegisterMap};
pub use protocol::frame::ProtocolMode;
pub use protocol::serial::{list_ports, PortInfo, SerialMeterPort};
pub use protocol::tcp::TcpMeterPort;
pub use protocol::transport::{CancelHandle, MeterPort, Transport};
pub use records::{
    BatteryState, ConnectionKind, ConnectionParams, EventCategory, EventRecord, FaultFlags,
    FullReadData, GridFields, LoadProfileData, LoadProfileEntry, MeterIdentity, MonthlyData,
    OutageCategory, OutageRecord, OutageScope, Password, RelayState, ShortReadData,
};
pub use session::{full_read_serial, short_read_serial, MeterSession, ProfileRange};
