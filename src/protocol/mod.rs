//! IEC 62056-21 Mode C protocol plumbing.
//!
//! [`frame`] builds and checks the wire frames, [`handshake`] drives baud
//! negotiation and identification, [`transport`] abstracts the byte pipe,
//! with [`serial`] and [`tcp`] as the real implementations and
//! [`serial_mock`] as the test double.

pub mod frame;
pub mod handshake;
pub mod serial;
pub mod serial_mock;
pub mod tcp;
pub mod transport;

pub use frame::ProtocolMode;
pub use handshake::HandshakeOutcome;
pub use transport::{MeterPort, Transport};
