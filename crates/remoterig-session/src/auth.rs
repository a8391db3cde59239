//! Credential obfuscation for the login packet.
//!
//! The radio expects the username and password XOR-ed byte-for-byte
//! against a fixed key table. The table is not a secret: it falls
//! straight out of XOR-ing the documented example credentials ("beer" /
//! "beerbeer") with their wire bytes. The capture only exercises the
//! first eight positions; the table repeats cyclically for longer
//! credentials.

/// Per-position XOR key, re-derived from the reference capture:
/// plaintext `beer` maps to wire bytes `2B 3F 55 5C`.
pub const CREDENTIAL_XOR_KEY: [u8; 8] = [0x49, 0x5A, 0x30, 0x2E, 0x5D, 0x40, 0x12, 0x2A];

/// Encodes a credential into its 16-byte login-packet field.
///
/// Input bytes beyond 16 are truncated; unused trailing positions stay
/// zero. Applying the function twice restores the input, since XOR is
/// its own inverse.
pub fn encode_credential(plain: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (i, b) in plain.bytes().take(16).enumerate() {
        out[i] = b ^ CREDENTIAL_XOR_KEY[i % CREDENTIAL_XOR_KEY.len()];
    }
    out
}
