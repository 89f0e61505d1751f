//! Frame construction, parsing and BCC verification.
//!
//! Command frames are `SOH <cmd> <sub> STX <payload> ETX BCC`; the block
//! check character XORs everything after the command id, STX through ETX
//! inclusive. Received data blocks are checked over the span between STX
//! (exclusive) and the terminator (inclusive) against the byte that follows.

use base64::Engine;

use crate::constants::*;
use crate::error::MeterError;

/// Packet selector placed in the Y position of the mode-select message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    /// Mode 0: full data readout.
    Readout,
    /// Mode 1: programming session (commands, writes, load profile).
    Programming,
    /// Mode 6: abbreviated billing readout.
    ShortRead,
    /// Mode 7: monthly billing history.
    Monthly,
    /// Mode 8: warning event lists.
    Events,
    /// Mode 9: outage lists.
    Outages,
}

impl ProtocolMode {
    pub fn as_char(self) -> char {
        match self {
            ProtocolMode::Readout => '0',
            ProtocolMode::Programming => '1',
            ProtocolMode::ShortRead => '6',
            ProtocolMode::Monthly => '7',
            ProtocolMode::Events => '8',
            ProtocolMode::Outages => '9',
        }
    }
}

/// XOR block check character.
pub fn bcc(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b)
}

/// `/?<address>!\r\n` identification request.
pub fn build_ident_request(address: Option<&str>) -> Vec<u8> {
    let mut msg = Vec::with_capacity(16);
    msg.push(b'/');
    msg.push(b'?');
    if let Some(addr) = address {
        msg.extend_from_slice(addr.as_bytes());
    }
    msg.push(b'!');
    msg.push(CR);
    msg.push(LF);
    msg
}

/// `ACK 0 Z Y CR LF` mode-select message; Z is the baud character the meter
/// should switch to, Y the packet selector.
pub fn build_mode_select(mode: ProtocolMode, baud_char: char) -> Vec<u8> {
    vec![ACK, b'0', baud_char as u8, mode.as_char() as u8, CR, LF]
}

fn finish_command(mut msg: Vec<u8>) -> Vec<u8> {
    msg.push(ETX);
    let check = bcc(&msg[3..]);
    msg.push(check);
    msg
}

/// `P1` plaintext or `P2` encrypted password command.
pub fn build_password_command(kind: char, secret: &[u8]) -> Vec<u8> {
    let mut msg = vec![SOH, b'P', kind as u8, STX, b'('];
    msg.extend_from_slice(secret);
    msg.push(b')');
    finish_command(msg)
}

/// `R2` register read command.
pub fn build_read_command(obis: &str) -> Vec<u8> {
    let mut msg = vec![SOH, b'R', b'2', STX];
    msg.extend_from_slice(obis.as_bytes());
    msg.push(b'(');
    msg.push(b')');
    finish_command(msg)
}

/// `W2` register write command.
pub fn build_write_command(obis: &str, value: &str) -> Vec<u8> {
    let mut msg = vec![SOH, b'W', b'2', STX];
    msg.extend_from_slice(obis.as_bytes());
    msg.push(b'(');
    msg.extend_from_slice(value.as_bytes());
    msg.push(b')');
    finish_command(msg)
}

/// `R2 P.nn(range)` load-profile read. The range is either
/// `yy-mm-dd,hh:mm;yy-mm-dd,hh:mm` or `;` for everything the meter holds.
pub fn build_profile_command(profile_number: u8, range: &str) -> Vec<u8> {
    let mut msg = vec![SOH, b'R', b'2', STX];
    msg.extend_from_slice(format!("P.{profile_number:02}").as_bytes());
    msg.push(b'(');
    msg.extend_from_slice(range.as_bytes());
    msg.push(b')');
    finish_command(msg)
}

/// `B0` break command ending the session.
pub fn build_break_command() -> Vec<u8> {
    let msg = vec![SOH, b'B', b'0'];
    finish_command(msg)
}

/// A received data block with its pagination marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedBlock {
    pub payload: Vec<u8>,
    /// True when the block ended in EOT: the device holds more blocks and
    /// expects an ACK before sending the next one.
    pub more_follows: bool,
}

/// Verifies the BCC of a buffered block and extracts its payload.
///
/// The buffer must span from (at least) the STX through the terminator and
/// its trailing BCC byte. Readout blocks that arrive without an STX (pure
/// line data) pass through unchecked.
pub fn decode_block(buf: &[u8]) -> Result<ReceivedBlock, MeterError> {
    // Scan forward from the STX for the terminator. Scanning backwards would
    // mistake a trailing BCC byte of value 0x03 or 0x04 for the terminator
    // itself.
    let stx_idx = buf.iter().position(|&b| b == STX);
    let search_from = stx_idx.map(|i| i + 1).unwrap_or(0);
    let term_idx = search_from
        + buf[search_from..]
            .iter()
            .position(|&b| b == ETX || b == EOT)
            .ok_or_else(|| MeterError::Other("data block without terminator".into()))?;
    let more_follows = buf[term_idx] == EOT;

    let payload_start = match stx_idx {
        Some(stx_idx) => {
            let received = *buf
                .get(term_idx + 1)
                .ok_or_else(|| MeterError::Other("data block without BCC byte".into()))?;
            let calculated = bcc(&buf[stx_idx + 1..=term_idx]);
            if calculated != received {
                return Err(MeterError::Checksum {
                    expected: received,
                    calculated,
                });
            }
            stx_idx + 1
        }
        None => 0,
    };

    Ok(ReceivedBlock {
        payload: buf[payload_start..term_idx].to_vec(),
        more_follows,
    })
}

/// Extracts the Base64 seed from a `SOH P0 STX (seed) ETX BCC` challenge.
pub fn parse_seed_frame(buf: &[u8]) -> Option<Vec<u8>> {
    let soh = buf.iter().position(|&b| b == SOH)?;
    if buf.get(soh + 1) != Some(&b'P') || buf.get(soh + 2) != Some(&b'0') {
        return None;
    }
    let open = soh + buf[soh..].iter().position(|&b| b == b'(')?;
    let close = soh + buf[soh..].iter().position(|&b| b == b')')?;
    if open >= close {
        return None;
    }
    Some(buf[open + 1..close].to_vec())
}

/// Challenge-response password encryption: Base64-decode the seed, XOR it
/// with the password cyclically, hex-encode the result. The outcome goes out
/// as a `P2` command. A seed that is not valid Base64 is used as raw bytes.
pub fn encrypt_password(password: &[u8], seed: &[u8]) -> String {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(seed)
        .unwrap_or_else(|_| seed.to_vec());
    if password.is_empty() {
        return hex::encode_upper(decoded);
    }
    let mixed: Vec<u8> = decoded
        .iter()
        .enumerate()
        .map(|(i, &b)| b ^ password[i % password.len()])
        .collect();
    hex::encode_upper(mixed)
}

/// Formats raw bytes for communication logs, naming control characters:
/// `[0x01, 0x50, 0x31, 0x02]` becomes `<SOH>P1<STX>`.
pub fn format_bytes(bytes: &[u8]) -> String {
    let mut result = String::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            SOH => result.push_str("<SOH>"),
            STX => result.push_str("<STX>"),
            ETX => result.push_str("<ETX>"),
            EOT => result.push_str("<EOT>"),
            ACK => result.push_str("<ACK>"),
            NAK => result.push_str("<NAK>"),
            CR => {
                result.push_str("<CR>");
                if bytes.get(i + 1) == Some(&LF) {
                    result.push_str("<LF>");
                    i += 1;
                    if i + 1 < bytes.len() {
                        result.push('\n');
                    }
                }
            }
            LF => result.push_str("<LF>"),
            b if b.is_ascii_graphic() || b == b' ' => result.push(b as char),
            b => result.push_str(&format!("<0x{b:02X}>")),
        }
        i += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_request_with_and_without_address() {
        assert_eq!(build_ident_request(None), b"/?!\r\n");
        assert_eq!(build_ident_request(Some("12345678")), b"/?12345678!\r\n");
    }

    #[test]
    fn mode_select_bytes() {
        let msg = build_mode_select(ProtocolMode::ShortRead, '5');
        assert_eq!(msg, vec![ACK, b'0', b'5', b'6', CR, LF]);
    }

    #[test]
    fn read_command_has_valid_bcc() {
        let msg = build_read_command("1.8.0");
        assert_eq!(&msg[..4], &[SOH, b'R', b'2', STX]);
        assert_eq!(msg[msg.len() - 2], ETX);
        let check = bcc(&msg[3..msg.len() - 1]);
        assert_eq!(msg[msg.len() - 1], check);
    }

    #[test]
    fn break_command_shape() {
        let msg = build_break_command();
        assert_eq!(&msg[..3], &[SOH, b'B', b'0']);
        assert_eq!(msg[3], ETX);
        assert_eq!(msg[4], ETX); // BCC over [ETX] alone
    }

    #[test]
    fn decode_block_round_trip() {
        let payload = b"1.8.0(123456.789*kWh)\r\n!\r\n";
        let mut frame = vec![STX];
        frame.extend_from_slice(payload);
        frame.push(ETX);
        frame.push(bcc(&frame[1..]));

        let block = decode_block(&frame).unwrap();
        assert_eq!(block.payload, payload);
        assert!(!block.more_follows);
    }

    #[test]
    fn decode_block_flags_eot_continuation() {
        let mut frame = vec![STX];
        frame.extend_from_slice(b"partial data\r\n");
        frame.push(EOT);
        frame.push(bcc(&frame[1..]));

        let block = decode_block(&frame).unwrap();
        assert!(block.more_follows);
    }

    #[test]
    fn decode_block_accepts_bcc_colliding_with_terminator_values() {
        // Pad the payload so the block check lands exactly on the ETX value;
        // the decoder must still take the byte after EOT as the BCC.
        let mut payload = b"0.0.0(12345678)\r\n".to_vec();
        let filler = bcc(&payload) ^ EOT ^ ETX;
        payload.push(filler);

        let mut frame = vec![STX];
        frame.extend_from_slice(&payload);
        frame.push(EOT);
        frame.push(bcc(&frame[1..]));
        assert_eq!(frame[frame.len() - 1], ETX); // the collision under test

        let block = decode_block(&frame).unwrap();
        assert_eq!(block.payload, payload);
        assert!(block.more_follows);
    }

    #[test]
    fn decode_block_rejects_corrupt_bcc() {
        let mut frame = vec![STX];
        frame.extend_from_slice(b"1.8.0(1.0)\r\n");
        frame.push(ETX);
        let good = bcc(&frame[1..]);
        frame.push(good ^ 0xFF);

        match decode_block(&frame) {
            Err(MeterError::Checksum {
                expected,
                calculated,
            }) => {
                assert_eq!(expected, good ^ 0xFF);
                assert_eq!(calculated, good);
            }
            other => panic!("expected checksum error, got {other:?}"),
        }
    }

    #[test]
    fn seed_frame_extraction() {
        let mut frame = vec![SOH, b'P', b'0', STX, b'('];
        frame.extend_from_slice(b"QUJDREVGR0g=");
        frame.push(b')');
        frame.push(ETX);
        frame.push(bcc(&frame[3..frame.len()]));
        assert_eq!(parse_seed_frame(&frame).unwrap(), b"QUJDREVGR0g=");
        assert_eq!(parse_seed_frame(b"\x01B0\x03\x03"), None);
    }

    #[test]
    fn password_encryption_xors_decoded_seed() {
        // Seed decodes to "ABCDEFGH"; password of zeros XORs to identity.
        let enc = encrypt_password(b"00000000", b"QUJDREVGR0g=");
        let expected: Vec<u8> = b"ABCDEFGH".iter().map(|b| b ^ b'0').collect();
        assert_eq!(enc, hex::encode_upper(expected));
    }
}
