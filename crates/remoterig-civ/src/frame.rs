//! CI-V frame encoding and the BCD frequency codec.
//!
//! The CI-V protocol uses binary frames on a half-duplex byte stream,
//! tunnelled here inside the serial session's datagrams:
//!
//! ```text
//! 0xFE 0xFE <dst> <src> <cmd> [<sub>] [<data>...] 0xFD
//! ```
//!
//! - Preamble: two `0xFE` bytes
//! - `dst`: target CI-V address (`0xA4` for the IC-705 by default)
//! - `src`: controller address (`0xE0`)
//! - `cmd`: command byte, optionally followed by a sub-command
//! - Terminator: `0xFD`
//!
//! Byte sequences that do not carry the sentinels are not CI-V traffic and
//! are passed through to the external serial consumer untouched.

use bytes::{BufMut, BytesMut};

/// Preamble byte repeated twice at the start of every CI-V frame.
pub const PREAMBLE: u8 = 0xFE;

/// Frame terminator byte.
pub const TERMINATOR: u8 = 0xFD;

/// Standard PC controller CI-V address.
pub const CONTROLLER_ADDR: u8 = 0xE0;

/// Factory-default CI-V address of the IC-705.
pub const DEFAULT_CIV_ADDR: u8 = 0xA4;

/// Returns `true` if `data` carries a complete CI-V frame: at least six
/// bytes, double preamble, and the terminator.
pub fn is_civ_frame(data: &[u8]) -> bool {
    data.len() >= 6
        && data[0] == PREAMBLE
        && data[1] == PREAMBLE
        && data[data.len() - 1] == TERMINATOR
}

/// Encode a controller-to-radio CI-V frame.
///
/// `body` is everything between the address pair and the terminator:
/// the command byte, optional sub-command, and data.
pub fn encode_frame(civ_addr: u8, body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(5 + body.len());
    buf.put_u8(PREAMBLE);
    buf.put_u8(PREAMBLE);
    buf.put_u8(civ_addr);
    buf.put_u8(CONTROLLER_ADDR);
    buf.put_slice(body);
    buf.put_u8(TERMINATOR);
    buf.to_vec()
}

/// The payload of a received frame: everything after the command byte,
/// up to (not including) the terminator.
///
/// Returns `None` when `data` is not a CI-V frame.
pub fn payload(data: &[u8]) -> Option<&[u8]> {
    if !is_civ_frame(data) {
        return None;
    }
    Some(&data[5..data.len() - 1])
}

/// The command byte of a received frame.
pub fn command(data: &[u8]) -> Option<u8> {
    if !is_civ_frame(data) {
        return None;
    }
    Some(data[4])
}

/// Convert a frequency in hertz to 5-byte BCD encoding (LSB first).
///
/// CI-V represents frequencies as 10 BCD digits with the least significant
/// byte transmitted first; each byte holds two digits. Exact for
/// frequencies up to 9,999,999,999 Hz.
pub fn encode_frequency(freq_hz: u64) -> [u8; 5] {
    let mut result = [0u8; 5];
    let mut freq = freq_hz;

    for byte in &mut result {
        let lo = (freq % 10) as u8;
        freq /= 10;
        let hi = (freq % 10) as u8;
        freq /= 10;
        *byte = (hi << 4) | lo;
    }

    result
}

/// Convert 5-byte BCD encoding (LSB first) back to frequency in hertz.
///
/// This is the inverse of [`encode_frequency`]. Shorter slices decode the
/// digits that are present.
pub fn decode_frequency(bcd: &[u8]) -> u64 {
    let mut freq: u64 = 0;
    let mut multiplier: u64 = 1;

    for &byte in bcd {
        let lo = (byte & 0x0F) as u64;
        let hi = ((byte >> 4) & 0x0F) as u64;
        freq += lo * multiplier;
        multiplier *= 10;
        freq += hi * multiplier;
        multiplier *= 10;
    }

    freq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_14_250_mhz() {
        // 14,250,000 Hz => 10 digits: 0014250000
        // LSB-first wire order: [0x00, 0x00, 0x25, 0x14, 0x00]
        let bcd = encode_frequency(14_250_000);
        assert_eq!(bcd, [0x00, 0x00, 0x25, 0x14, 0x00]);
        assert_eq!(decode_frequency(&bcd), 14_250_000);
    }

    #[test]
    fn bcd_7_mhz() {
        let bcd = encode_frequency(7_000_000);
        assert_eq!(bcd, [0x00, 0x00, 0x00, 0x07, 0x00]);
        assert_eq!(decode_frequency(&bcd), 7_000_000);
    }

    #[test]
    fn bcd_432_100_mhz() {
        let bcd = encode_frequency(432_100_000);
        assert_eq!(bcd, [0x00, 0x00, 0x10, 0x32, 0x04]);
        assert_eq!(decode_frequency(&bcd), 432_100_000);
    }

    #[test]
    fn bcd_round_trip_zero_and_max() {
        assert_eq!(decode_frequency(&encode_frequency(0)), 0);
        let max = 9_999_999_999u64;
        assert_eq!(encode_frequency(max), [0x99; 5]);
        assert_eq!(decode_frequency(&encode_frequency(max)), max);
    }

    #[test]
    fn bcd_1hz_resolution() {
        let freq = 14_074_123;
        assert_eq!(decode_frequency(&encode_frequency(freq)), freq);
    }

    #[test]
    fn encode_frame_wire_format() {
        let bytes = encode_frame(DEFAULT_CIV_ADDR, &[0x03]);
        assert_eq!(bytes, vec![0xFE, 0xFE, 0xA4, 0xE0, 0x03, 0xFD]);
    }

    #[test]
    fn frame_sentinel_detection() {
        assert!(is_civ_frame(&[0xFE, 0xFE, 0xE0, 0xA4, 0x03, 0xFD]));
        // Too short.
        assert!(!is_civ_frame(&[0xFE, 0xFE, 0xE0, 0xFD]));
        // Missing terminator.
        assert!(!is_civ_frame(&[0xFE, 0xFE, 0xE0, 0xA4, 0x03, 0x00]));
        // Missing preamble.
        assert!(!is_civ_frame(&[0x00, 0xFE, 0xE0, 0xA4, 0x03, 0xFD]));
        assert!(!is_civ_frame(&[]));
    }

    #[test]
    fn payload_extraction() {
        let frame = [0xFE, 0xFE, 0xE0, 0xA4, 0x15, 0x02, 0x01, 0x20, 0xFD];
        assert_eq!(command(&frame), Some(0x15));
        assert_eq!(payload(&frame), Some(&[0x02, 0x01, 0x20][..]));
        assert_eq!(payload(&[0x01, 0x02]), None);
    }
}
