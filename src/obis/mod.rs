//! OBIS code handling and data-block decoding.
//!
//! Splits into three layers: [`code`] validates and normalizes OBIS register
//! identifiers, [`decoder`] turns a raw readout block into generic records,
//! and [`readout`] maps those records onto the typed results in
//! [`crate::records`].

pub mod code;
pub mod decoder;
pub mod readout;

pub use code::ObisCode;
pub use decoder::{decode_block, DecodedBlock, ObisRecord, RegisterMap};
