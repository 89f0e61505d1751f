//! Typed records produced by the protocol engine.
//!
//! Everything here is plain data: decoded once at the end of an operation and
//! never mutated afterwards. Optional fields model registers that only exist
//! on bidirectional (export) or Kombi (reactive) meters; their absence at the
//! wire level is meter-type information, not a parse failure.

use bitflags::bitflags;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::MeterError;

/// Physical connection kind. Optical heads are pinned to 300 baud for the
/// probe; RS-485 links may probe faster; TCP passthrough ignores baud
/// switching entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Optical,
    Rs485,
    Tcp,
}

/// Meter password, 8 ASCII digits. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    /// Validates and wraps a password. MASS meters use exactly 8 digits.
    pub fn new(raw: &str) -> Result<Password, MeterError> {
        if raw.len() != 8 || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(MeterError::InvalidPassword);
        }
        Ok(Password(raw.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(********)")
    }
}

/// Parameters of one connection attempt. Immutable once the attempt starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    pub kind: ConnectionKind,
    /// Serial device path (`/dev/ttyUSB0`, `COM5`) or `host:port` for TCP.
    pub port: String,
    /// Initial baud rate; 0 selects automatic probing.
    pub baud_rate: u32,
    pub timeout_ms: u64,
    /// Optional device address placed inside the `/?<address>!` request.
    pub address: Option<String>,
    pub password: Option<Password>,
}

impl ConnectionParams {
    pub fn new(kind: ConnectionKind, port: &str) -> Self {
        ConnectionParams {
            kind,
            port: port.to_string(),
            baud_rate: 0,
            timeout_ms: crate::constants::DEFAULT_TIMEOUT_MS,
            address: None,
            password: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        let ms = if self.timeout_ms == 0 {
            crate::constants::DEFAULT_TIMEOUT_MS
        } else {
            self.timeout_ms
        };
        Duration::from_millis(ms)
    }
}

/// Meter identity produced by a successful handshake. Read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterIdentity {
    /// Three-letter manufacturer flag, e.g. `MKS`.
    pub manufacturer: String,
    /// Distribution-company id carried in the extended identification form.
    pub utility_id: String,
    pub model: String,
    /// Baud indicator character from the identification string.
    pub baud_rate_char: char,
    /// Protocol generation marker (`<2>` in the extended form).
    pub generation: String,
    /// Highest baud rate the meter advertises.
    pub max_baud_rate: u32,
    /// Filled in after the first readout (register 0.0.0 / 96.1.0).
    pub serial_number: Option<String>,
}

bitflags! {
    /// FF fault-flag word. Bit assignments per the MASS profile.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultFlags: u64 {
        const CLOCK_FAILURE     = 1 << 0;
        const BATTERY_LOW       = 1 << 1;
        const MEMORY_ERROR      = 1 << 2;
        const COVER_OPENED      = 1 << 3;
        const TERMINAL_OPENED   = 1 << 4;
        const MAGNETIC_TAMPER   = 1 << 5;
        const REVERSE_ENERGY    = 1 << 6;
        const PHASE_FAILURE     = 1 << 7;
        const CALIBRATION_LOST  = 1 << 8;
        const RELAY_FAULT       = 1 << 9;
    }
}

impl FaultFlags {
    /// Parses the hex status word as reported in register F.F.0, keeping
    /// unassigned bits.
    pub fn from_register(value: &str) -> Option<FaultFlags> {
        u64::from_str_radix(value.trim(), 16)
            .ok()
            .map(FaultFlags::from_bits_retain)
    }
}

/// GF grid/geography word decoded into its bit fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridFields {
    pub utility_id: u8,
    pub utility_name: String,
    pub substation_id: u16,
    pub transformer_id: u8,
    pub feeder_id: u8,
    pub phase_id: u8,
    pub branch_id: u8,
    pub max_current: u16,
}

/// Distribution-company lookup table for the GF utility id.
static UTILITY_NAMES: Lazy<HashMap<u8, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (1, "AKDENİZ EDAŞ"),
        (2, "AKEDAŞ"),
        (3, "ARAS EDAŞ"),
        (4, "AYDEM"),
        (5, "AYEDAŞ"),
        (6, "BAŞKENT EDAŞ"),
        (7, "BOĞAZİÇİ EDAŞ"),
        (8, "ÇAMLIBEL EDAŞ"),
        (9, "ÇORUH EDAŞ"),
        (10, "DİCLE EDAŞ"),
        (11, "FIRAT EDAŞ"),
        (12, "GEDİZ EDAŞ"),
        (13, "KCETAŞ"),
        (14, "MERAM EDAŞ"),
        (15, "OSMANGAZİ EDAŞ"),
        (16, "SAKARYA EDAŞ"),
        (17, "TOROSLAR EDAŞ"),
        (18, "TRAKYA EDAŞ"),
        (19, "ULUDAĞ EDAŞ"),
        (20, "VANGÖLÜ EDAŞ"),
        (21, "YEŞİLIRMAK EDAŞ"),
    ])
});

impl GridFields {
    /// Unpacks the 44-bit GF word.
    pub fn from_word(code: u64) -> GridFields {
        let utility_id = (code & 0x1F) as u8;
        GridFields {
            utility_id,
            utility_name: UTILITY_NAMES
                .get(&utility_id)
                .copied()
                .unwrap_or("Unknown")
                .to_string(),
            substation_id: ((code >> 5) & 0x7FFF) as u16,
            transformer_id: ((code >> 20) & 0x0F) as u8,
            feeder_id: ((code >> 24) & 0x3F) as u8,
            phase_id: ((code >> 30) & 0x03) as u8,
            branch_id: ((code >> 32) & 0x03) as u8,
            max_current: ((code >> 34) & 0x3FF) as u16,
        }
    }

    /// Parses the register string (hex word) reported in F.F.1.
    pub fn from_register(value: &str) -> Option<GridFields> {
        u64::from_str_radix(value.trim(), 16)
            .ok()
            .map(GridFields::from_word)
    }
}

/// Battery condition reported by register 96.6.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryState {
    Full,
    Low,
    Unknown,
}

/// Disconnect-relay position reported by register 96.3.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    Connected,
    Disconnected,
    Unknown,
}

/// Flat snapshot produced by one short read (packet 6). Created atomically at
/// the end of the operation; never partially visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortReadData {
    // Identity registers
    pub serial_number: String,
    pub program_version: String,
    pub production_date: String,
    pub calibration_date: String,

    // Clock
    pub meter_date: String,
    pub meter_time: String,
    pub day_of_week: u8,
    /// Host epoch milliseconds captured when the clock registers arrived,
    /// for drift comparison against the meter clock.
    pub read_at_ms: Option<u64>,

    // Active energy, import
    pub active_energy_import_total: f64,
    pub active_energy_import_t1: f64,
    pub active_energy_import_t2: f64,
    pub active_energy_import_t3: f64,
    pub active_energy_import_t4: f64,

    // Active energy, export (bidirectional meters only)
    pub active_energy_export_total: Option<f64>,
    pub active_energy_export_t1: Option<f64>,
    pub active_energy_export_t2: Option<f64>,
    pub active_energy_export_t3: Option<f64>,
    pub active_energy_export_t4: Option<f64>,

    // Reactive energy quadrants (Kombi meters only)
    pub reactive_inductive_import: Option<f64>,
    pub reactive_capacitive_import: Option<f64>,
    pub reactive_inductive_export: Option<f64>,
    pub reactive_capacitive_export: Option<f64>,

    // Maximum demand
    pub max_demand_import: f64,
    pub max_demand_import_timestamp: String,
    pub max_demand_export: Option<f64>,
    pub max_demand_export_timestamp: Option<String>,

    // Instantaneous values
    pub voltage_l1: f64,
    pub voltage_l2: Option<f64>,
    pub voltage_l3: Option<f64>,
    pub current_l1: f64,
    pub current_l2: Option<f64>,
    pub current_l3: Option<f64>,
    pub frequency: f64,
    pub power_factor_l1: f64,
    pub power_factor_l2: Option<f64>,
    pub power_factor_l3: Option<f64>,

    // Status words
    pub ff_code: String,
    pub gf_code: String,
    #[serde(skip)]
    pub fault_flags: Option<FaultFlags>,
    pub grid_fields: Option<GridFields>,
    pub battery: BatteryState,
    pub relay: RelayState,
}

/// One calendar month of billing history (packet 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyData {
    /// Billing period index, 1 = most recent closed month.
    pub month: u8,
    pub energy_import_total: f64,
    pub energy_import_t1: f64,
    pub energy_import_t2: f64,
    pub energy_import_t3: f64,
    pub energy_import_t4: f64,
    pub max_demand: f64,
    pub max_demand_timestamp: String,
    pub demand_reset_date: String,
    pub cover_open_count: u32,
}

/// Warning categories delivered by packet 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Voltage,
    Current,
    Magnetic,
    Cover,
}

impl EventCategory {
    pub const ALL: [EventCategory; 4] = [
        EventCategory::Voltage,
        EventCategory::Current,
        EventCategory::Magnetic,
        EventCategory::Cover,
    ];

    /// Final OBIS group under `99.98.<n>`.
    pub fn register_index(self) -> u8 {
        match self {
            EventCategory::Voltage => 1,
            EventCategory::Current => 2,
            EventCategory::Magnetic => 3,
            EventCategory::Cover => 4,
        }
    }

    pub fn from_register_index(n: u8) -> Option<EventCategory> {
        Self::ALL.into_iter().find(|c| c.register_index() == n)
    }
}

/// Outage list selector delivered by packet 9: scope crossed with the
/// long/short duration class. Serializes as a string key like `l1Long` so it
/// can index a JSON map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutageCategory {
    pub scope: OutageScope,
    pub long: bool,
}

impl Serialize for OutageCategory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for OutageCategory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        OutageCategory::from_key(&key)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown outage category: {key}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutageScope {
    ThreePhase,
    L1,
    L2,
    L3,
}

impl OutageCategory {
    pub const ALL: [OutageCategory; 8] = [
        OutageCategory { scope: OutageScope::ThreePhase, long: true },
        OutageCategory { scope: OutageScope::ThreePhase, long: false },
        OutageCategory { scope: OutageScope::L1, long: true },
        OutageCategory { scope: OutageScope::L1, long: false },
        OutageCategory { scope: OutageScope::L2, long: true },
        OutageCategory { scope: OutageScope::L2, long: false },
        OutageCategory { scope: OutageScope::L3, long: true },
        OutageCategory { scope: OutageScope::L3, long: false },
    ];

    /// Final OBIS group under `99.97.<n>`, 1-based in declaration order.
    pub fn register_index(self) -> u8 {
        Self::ALL
            .iter()
            .position(|c| *c == self)
            .map(|i| i as u8 + 1)
            .unwrap_or(0)
    }

    pub fn from_register_index(n: u8) -> Option<OutageCategory> {
        if (1..=8).contains(&n) {
            Some(Self::ALL[(n - 1) as usize])
        } else {
            None
        }
    }

    /// Stable string form used as a JSON map key.
    pub fn key(self) -> &'static str {
        match (self.scope, self.long) {
            (OutageScope::ThreePhase, true) => "threePhaseLong",
            (OutageScope::ThreePhase, false) => "threePhaseShort",
            (OutageScope::L1, true) => "l1Long",
            (OutageScope::L1, false) => "l1Short",
            (OutageScope::L2, true) => "l2Long",
            (OutageScope::L2, false) => "l2Short",
            (OutageScope::L3, true) => "l3Long",
            (OutageScope::L3, false) => "l3Short",
        }
    }

    pub fn from_key(key: &str) -> Option<OutageCategory> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

/// One warning event with optional end time and free-text detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub start: String,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub detail: String,
}

/// One supply interruption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutageRecord {
    pub start: String,
    pub end: Option<String>,
    pub duration: Option<String>,
}

/// Full read result: snapshot + 12 months of history + warning and outage
/// lists. Built incrementally from many blocks but only committed once every
/// expected category validated; a failed category discards the whole read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullReadData {
    pub snapshot: ShortReadData,
    pub months: Vec<MonthlyData>,
    pub events: HashMap<EventCategory, Vec<EventRecord>>,
    pub outages: HashMap<OutageCategory, Vec<OutageRecord>>,
}

/// One load-profile sample row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProfileEntry {
    pub timestamp: String,
    pub values: Vec<f64>,
    /// Meter status nibble attached to some profile rows, hex-encoded.
    pub status: Option<String>,
}

/// Load-profile read result. Entries keep device order; the device guarantees
/// monotonic timestamps within one read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProfileData {
    pub profile_number: u8,
    /// Capture period in minutes, read from register 0.8.4.
    pub period_minutes: Option<u32>,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Column labels from the profile header, when the meter sends one.
    pub columns: Vec<String>,
    pub entries: Vec<LoadProfileEntry>,
}
