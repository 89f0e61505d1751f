//! IEC 62056-21 Protocol Constants
//!
//! Control characters, timing parameters and well-known OBIS registers used
//! by the Mode C implementation. Register assignments beyond the standard
//! clock/energy set follow the Turkish MASS meter profile.

/// Start of header, opens every command frame
pub const SOH: u8 = 0x01;

/// Start of text, opens a data block
pub const STX: u8 = 0x02;

/// End of text, terminates the final data block
pub const ETX: u8 = 0x03;

/// End of transmission, terminates a non-final (partial) data block
pub const EOT: u8 = 0x04;

/// Acknowledge
pub const ACK: u8 = 0x06;

/// Negative acknowledge
pub const NAK: u8 = 0x15;

/// Carriage return
pub const CR: u8 = 0x0D;

/// Line feed
pub const LF: u8 = 0x0A;

/// Probe baud rate mandated for optical heads by IEC 62056-21
pub const OPTICAL_PROBE_BAUD: u32 = 300;

/// Default response timeout when the caller passes zero
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Settle delay after the mode ACK before reconfiguring the UART.
/// Some meters need this long to switch their own baud rate.
pub const BAUD_SWITCH_SETTLE_MS: u64 = 300;

/// Delay between sending the identification request and reading the reply
pub const IDENT_RESPONSE_DELAY_MS: u64 = 500;

/// Quiet period after a break so the meter returns to idle
pub const BREAK_SETTLE_MS: u64 = 300;

/// Polling interval while waiting for bytes
pub const READ_POLL_INTERVAL_MS: u64 = 10;

/// Automatic retries of a single step after a checksum error or timeout
pub const STEP_RETRY_LIMIT: u32 = 1;

/// Consecutive empty non-final blocks before the device counts as stalled
pub const STALL_EMPTY_BLOCK_LIMIT: u32 = 3;

/// Idle timeout while receiving a short-read packet
pub const SHORT_READ_IDLE_TIMEOUT_MS: u64 = 3000;

/// Idle timeout while receiving full-read category blocks
pub const FULL_READ_IDLE_TIMEOUT_MS: u64 = 5000;

/// Idle timeout while receiving load-profile blocks
pub const LOAD_PROFILE_IDLE_TIMEOUT_MS: u64 = 15000;

/// Receive buffer cap for a short-read packet
pub const SHORT_READ_BUFFER: usize = 8 * 1024;

/// Receive buffer cap for a full-read block
pub const FULL_READ_BUFFER: usize = 128 * 1024;

/// Receive buffer cap for one load-profile block
pub const LOAD_PROFILE_BUFFER: usize = 512 * 1024;

// ----------------------------------------------------------------------------
// Well-known OBIS registers (MASS profile)
// ----------------------------------------------------------------------------

/// Meter time (hh:mm:ss)
pub const OBIS_TIME: &str = "0.9.1";
/// Meter date (yy-mm-dd)
pub const OBIS_DATE: &str = "0.9.2";
/// Day of week (1 = Monday)
pub const OBIS_DAY_OF_WEEK: &str = "0.9.5";
/// Serial number (primary register; 96.1.0 is the fallback)
pub const OBIS_SERIAL_NUMBER: &str = "0.0.0";
pub const OBIS_SERIAL_NUMBER_ALT: &str = "96.1.0";
/// Firmware / program version
pub const OBIS_PROGRAM_VERSION: &str = "0.2.0";
/// Production date
pub const OBIS_PRODUCTION_DATE: &str = "96.1.3";
/// Calibration date
pub const OBIS_CALIBRATION_DATE: &str = "96.2.5";
/// Load-profile capture period in minutes
pub const OBIS_PROFILE_PERIOD: &str = "0.8.4";
/// Billing-period (demand) reset date
pub const OBIS_DEMAND_RESET_DATE: &str = "0.1.2";
/// Terminal-cover opening counter
pub const OBIS_COVER_COUNT: &str = "96.15.0";
/// Battery status register
pub const OBIS_BATTERY_STATUS: &str = "96.6.1";
/// Relay status register
pub const OBIS_RELAY_STATUS: &str = "96.3.10";
/// FF fault-flag status word
pub const OBIS_FF_CODE: &str = "F.F.0";
/// GF grid/geography status word
pub const OBIS_GF_CODE: &str = "F.F.1";

/// Warning event lists, packet 8: `99.98.<category>` with
/// 1 = voltage, 2 = current, 3 = magnetic field, 4 = cover.
pub const OBIS_EVENT_BASE: &str = "99.98";

/// Outage lists, packet 9: `99.97.<n>` with n = 1..8 covering
/// 3-phase/L1/L2/L3 crossed with long/short interruptions.
pub const OBIS_OUTAGE_BASE: &str = "99.97";
