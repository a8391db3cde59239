//! Wire layouts for the session protocol.
//!
//! Every control packet starts with the same 16-byte header:
//!
//! ```text
//! offset 0..4   u32 LE  total packet length
//! offset 4..6   u16 LE  packet type
//! offset 6..8   u16 LE  sequence number
//! offset 8..12  u32 BE  sender session ID
//! offset 12..16 u32 BE  peer session ID
//! ```
//!
//! Replies mirror the incoming packet with the session IDs swapped.
//! Specific packet kinds extend the header; builders here produce the
//! exact byte sequences the radio expects and parsers pick apart its
//! replies. All functions are pure.

use bytes::{BufMut, BytesMut};

use crate::auth::encode_credential;

/// Idle keepalive.
pub const TYPE_IDLE: u16 = 0x00;
/// Connection request.
pub const TYPE_CONNECT: u16 = 0x03;
/// Connection accept carrying the peer's session ID.
pub const TYPE_CONNECT_ACK: u16 = 0x04;
/// Ready/confirm exchange completing the connection.
pub const TYPE_READY: u16 = 0x06;
/// Sequenced ping carrying a 4-byte echo ID.
pub const TYPE_PING: u16 = 0x07;

/// Magic byte of the first authenticated packet after login.
pub const FIRST_AUTH_MAGIC: u8 = 0x02;
/// Magic byte of the second auth, reauth, and logout packets.
pub const SECOND_AUTH_MAGIC: u8 = 0x05;

/// Client name the radio expects from the vendor's PC application.
const CLIENT_NAME: &[u8] = b"icom-pc";
/// Model string sent in the stream request.
const MODEL_NAME: &[u8] = b"IC-705";

const HEADER_LEN: usize = 16;
const PING_LEN: usize = 21;
const LOGIN_LEN: usize = 128;
const AUTH_LEN: usize = 64;
const CONNINFO_LEN: usize = 144;
const LOGIN_REPLY_LEN: usize = 96;
const AUTH_REJECT_LEN: usize = 80;
const SERIAL_OPEN_LEN: usize = 40;
const SERIAL_DATA_HEADER_LEN: usize = 21;
const AUDIO_DATA_HEADER_LEN: usize = 24;

/// Marker byte introducing serial stream payloads.
const SERIAL_DATA_MARKER: u8 = 0xC1;
/// Marker byte introducing the serial stream-open request.
const SERIAL_OPEN_MARKER: u8 = 0xC0;
/// Marker byte introducing audio stream payloads.
const AUDIO_DATA_MARKER: u8 = 0x80;

fn header(total_len: usize, typ: u16, seq: u16, sid_a: u32, sid_b: u32) -> BytesMut {
    let mut b = BytesMut::with_capacity(total_len);
    b.put_u32_le(total_len as u32);
    b.put_u16_le(typ);
    b.put_u16_le(seq);
    b.put_u32(sid_a);
    b.put_u32(sid_b);
    b
}

fn packet_type(d: &[u8]) -> Option<u16> {
    if d.len() < HEADER_LEN {
        return None;
    }
    Some(u16::from_le_bytes([d[4], d[5]]))
}

// ---------------------------------------------------------------------------
// Connection establishment
// ---------------------------------------------------------------------------

/// Connection request (pkt3). The peer session ID is still unknown.
pub fn connect_req(local_sid: u32) -> Vec<u8> {
    header(HEADER_LEN, TYPE_CONNECT, 0, local_sid, 0).to_vec()
}

/// Extracts the radio's session ID from a connection accept (pkt4).
pub fn connect_ack_remote_sid(d: &[u8]) -> Option<u32> {
    if d.len() != HEADER_LEN || packet_type(d) != Some(TYPE_CONNECT_ACK) {
        return None;
    }
    Some(u32::from_be_bytes([d[8], d[9], d[10], d[11]]))
}

/// Ready confirm (pkt6), sent once the peer session ID is known.
pub fn ready(local_sid: u32, remote_sid: u32) -> Vec<u8> {
    header(HEADER_LEN, TYPE_READY, 1, local_sid, remote_sid).to_vec()
}

/// True for the radio's pkt6 acknowledgement.
pub fn is_ready_ack(d: &[u8]) -> bool {
    d.len() == HEADER_LEN && packet_type(d) == Some(TYPE_READY)
}

// ---------------------------------------------------------------------------
// Idle keepalive (pkt0)
// ---------------------------------------------------------------------------

/// Idle keepalive.
pub fn idle(seq: u16, local_sid: u32, remote_sid: u32) -> Vec<u8> {
    header(HEADER_LEN, TYPE_IDLE, seq, local_sid, remote_sid).to_vec()
}

/// True for a peer idle packet.
pub fn is_idle(d: &[u8]) -> bool {
    d.len() == HEADER_LEN && packet_type(d) == Some(TYPE_IDLE)
}

/// The answer to a peer idle packet: same sequence, session IDs swapped.
pub fn idle_reply(d: &[u8], local_sid: u32, remote_sid: u32) -> Option<Vec<u8>> {
    if !is_idle(d) {
        return None;
    }
    let seq = u16::from_le_bytes([d[6], d[7]]);
    Some(header(HEADER_LEN, TYPE_IDLE, seq, remote_sid, local_sid).to_vec())
}

// ---------------------------------------------------------------------------
// Ping (pkt7)
// ---------------------------------------------------------------------------

/// A parsed pkt7: request or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    /// Sender sequence number.
    pub seq: u16,
    /// True for a reply (ack marker 0x01), false for a request.
    pub reply: bool,
    /// Opaque 4-byte echo ID, mirrored by the reply.
    pub echo: [u8; 4],
}

/// Ping request carrying a fresh echo ID.
pub fn ping_req(seq: u16, local_sid: u32, remote_sid: u32, echo: [u8; 4]) -> Vec<u8> {
    let mut b = header(PING_LEN, TYPE_PING, seq, local_sid, remote_sid);
    b.put_u8(0x00);
    b.put_slice(&echo);
    b.to_vec()
}

/// Parses a pkt7 in either direction.
pub fn parse_ping(d: &[u8]) -> Option<Ping> {
    if d.len() != PING_LEN || packet_type(d) != Some(TYPE_PING) {
        return None;
    }
    Some(Ping {
        seq: u16::from_le_bytes([d[6], d[7]]),
        reply: d[16] == 0x01,
        echo: [d[17], d[18], d[19], d[20]],
    })
}

/// The mirror-image answer to a ping request: same sequence and echo ID,
/// session IDs swapped, ack marker set.
pub fn ping_reply(req: &Ping, local_sid: u32, remote_sid: u32) -> Vec<u8> {
    let mut b = header(PING_LEN, TYPE_PING, req.seq, remote_sid, local_sid);
    b.put_u8(0x01);
    b.put_slice(&req.echo);
    b.to_vec()
}

// ---------------------------------------------------------------------------
// Login and auth
// ---------------------------------------------------------------------------

/// The 128-byte login packet: XOR-encoded credentials, the client name,
/// and the outer/inner auth sequence counters.
pub fn login(
    seq: u16,
    inner_seq: u16,
    local_sid: u32,
    remote_sid: u32,
    rand_id: [u8; 2],
    username: &str,
    password: &str,
) -> Vec<u8> {
    let mut b = header(LOGIN_LEN, TYPE_IDLE, seq, local_sid, remote_sid);
    b.put_slice(&[0x00, 0x00, 0x00, 0x70, 0x01, 0x00, 0x00]);
    b.put_u16_le(inner_seq);
    b.put_u8(0x00);
    // The radio repeats these two bytes as the auth-ID prefix.
    b.put_slice(&rand_id);
    b.put_bytes(0x00, 64 - 28);
    b.put_slice(&encode_credential(username));
    b.put_slice(&encode_credential(password));
    b.put_slice(CLIENT_NAME);
    b.put_bytes(0x00, LOGIN_LEN - 96 - CLIENT_NAME.len());
    debug_assert_eq!(b.len(), LOGIN_LEN);
    b.to_vec()
}

/// The radio's answer to login.
#[derive(Debug, Clone, Copy)]
pub struct LoginReply {
    /// True when the credentials were rejected.
    pub rejected: bool,
    /// Token that must accompany every later authenticated packet.
    pub auth_id: [u8; 6],
}

/// Parses the 96-byte login response. Offsets 48..52 carry `0xFFFFFFFE`
/// on rejection; the auth ID sits at 26..32.
pub fn parse_login_reply(d: &[u8]) -> Option<LoginReply> {
    if d.len() != LOGIN_REPLY_LEN || d[0] != 0x60 || packet_type(d) != Some(TYPE_IDLE) {
        return None;
    }
    let mut auth_id = [0u8; 6];
    auth_id.copy_from_slice(&d[26..32]);
    Some(LoginReply {
        rejected: d[48..52] == [0xFF, 0xFF, 0xFF, 0xFE],
        auth_id,
    })
}

/// The 64-byte auth packet. `magic` is [`FIRST_AUTH_MAGIC`] right after
/// login and [`SECOND_AUTH_MAGIC`] for the second auth, periodic reauth,
/// and logout.
pub fn auth(
    seq: u16,
    inner_seq: u16,
    local_sid: u32,
    remote_sid: u32,
    magic: u8,
    auth_id: &[u8; 6],
) -> Vec<u8> {
    let mut b = header(AUTH_LEN, TYPE_IDLE, seq, local_sid, remote_sid);
    b.put_slice(&[0x00, 0x00, 0x00, 0x30, 0x01, magic, 0x00]);
    b.put_u16_le(inner_seq);
    b.put_u8(0x00);
    b.put_slice(auth_id);
    b.put_bytes(0x00, AUTH_LEN - 32);
    debug_assert_eq!(b.len(), AUTH_LEN);
    b.to_vec()
}

/// True for the 64-byte auth reply confirming the connection (byte 21
/// echoes the second-auth magic).
pub fn is_auth_confirmed(d: &[u8]) -> bool {
    d.len() == AUTH_LEN
        && d[0] == 0x40
        && packet_type(d) == Some(TYPE_IDLE)
        && d[21] == SECOND_AUTH_MAGIC
}

/// True for the 80-byte rejection the radio sends when an auth packet
/// carries a stale or unknown token.
pub fn is_auth_rejected(d: &[u8]) -> bool {
    d.len() == AUTH_REJECT_LEN
        && d[0] == 0x50
        && packet_type(d) == Some(TYPE_IDLE)
        && d[48..51] == [0xFF, 0xFF, 0xFF]
}

// ---------------------------------------------------------------------------
// Serial/audio stream request (conninfo)
// ---------------------------------------------------------------------------

/// The 144-byte request for the serial and audio sub-streams: model
/// string, username, and the audio parameter block (48 kHz both ways).
pub fn conninfo_request(
    seq: u16,
    inner_seq: u16,
    local_sid: u32,
    remote_sid: u32,
    auth_id: &[u8; 6],
    username: &str,
) -> Vec<u8> {
    let mut b = header(CONNINFO_LEN, TYPE_IDLE, seq, local_sid, remote_sid);
    b.put_slice(&[0x00, 0x00, 0x00, 0x80, 0x01, 0x03, 0x00]);
    b.put_u16_le(inner_seq);
    b.put_u8(0x00);
    b.put_slice(auth_id);
    b.put_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10]);
    // Capability block echoed from the radio's conninfo broadcasts.
    b.put_slice(&[0x80, 0x00, 0x00, 0x90, 0xC7, 0x0E, 0x86, 0x01]);
    b.put_bytes(0x00, 16);
    b.put_slice(MODEL_NAME);
    b.put_bytes(0x00, 16 - MODEL_NAME.len());
    b.put_bytes(0x00, 16);
    b.put_slice(&encode_credential(username));
    // Audio parameters: RX/TX enable, codec selectors, 48000 Hz sample
    // rate both directions, and the latency/port words.
    b.put_slice(&[0x01, 0x01, 0x04, 0x04, 0x00, 0x00, 0xBB, 0x80]);
    b.put_slice(&[0x00, 0x00, 0xBB, 0x80, 0x00, 0x00, 0xC3, 0x52]);
    b.put_slice(&[0x00, 0x00, 0xC3, 0x53, 0x00, 0x00, 0x00, 0xA0]);
    b.put_slice(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    debug_assert_eq!(b.len(), CONNINFO_LEN);
    b.to_vec()
}

/// The radio's answer to the stream request.
#[derive(Debug, Clone)]
pub struct ConnInfo {
    /// Device name to open the serial stream with.
    pub device_name: String,
    /// True when the radio granted the streams.
    pub ready: bool,
}

/// Parses the 144-byte conninfo reply: NUL-terminated device name at
/// 64..96, grant flag at 96.
pub fn parse_conninfo_reply(d: &[u8]) -> Option<ConnInfo> {
    if d.len() != CONNINFO_LEN || d[0] != 0x90 || packet_type(d) != Some(TYPE_IDLE) {
        return None;
    }
    Some(ConnInfo {
        device_name: nul_terminated(&d[64..96]),
        ready: d[96] == 1,
    })
}

// ---------------------------------------------------------------------------
// Serial and audio data
// ---------------------------------------------------------------------------

/// The serial stream-open request carrying the device name learned from
/// the conninfo reply.
pub fn serial_open(seq: u16, local_sid: u32, remote_sid: u32, device_name: &str) -> Vec<u8> {
    let mut b = header(SERIAL_OPEN_LEN, TYPE_IDLE, seq, local_sid, remote_sid);
    b.put_u8(SERIAL_OPEN_MARKER);
    b.put_u8(0x01);
    let name = device_name.as_bytes();
    let take = name.len().min(16);
    b.put_slice(&name[..take]);
    b.put_bytes(0x00, 16 - take);
    b.put_bytes(0x00, SERIAL_OPEN_LEN - 34);
    debug_assert_eq!(b.len(), SERIAL_OPEN_LEN);
    b.to_vec()
}

/// Wraps one CI-V message for the serial stream: marker, payload length,
/// and the big-endian serial sequence, then the payload.
pub fn serial_data(
    seq: u16,
    local_sid: u32,
    remote_sid: u32,
    data_seq: u16,
    payload: &[u8],
) -> Vec<u8> {
    let total = SERIAL_DATA_HEADER_LEN + payload.len();
    let mut b = header(total, TYPE_IDLE, seq, local_sid, remote_sid);
    b.put_u8(SERIAL_DATA_MARKER);
    b.put_u8(payload.len() as u8);
    b.put_u8(0x00);
    b.put_u16(data_seq);
    b.put_slice(payload);
    b.to_vec()
}

/// Unwraps a serial data packet, returning the CI-V payload.
pub fn parse_serial_data(d: &[u8]) -> Option<&[u8]> {
    if d.len() < SERIAL_DATA_HEADER_LEN
        || packet_type(d) != Some(TYPE_IDLE)
        || d[16] != SERIAL_DATA_MARKER
    {
        return None;
    }
    let payload = &d[SERIAL_DATA_HEADER_LEN..];
    if usize::from(d[17]) != payload.len() {
        return None;
    }
    Some(payload)
}

/// Wraps one opaque PCM buffer for the audio stream.
pub fn audio_data(
    seq: u16,
    local_sid: u32,
    remote_sid: u32,
    data_seq: u16,
    payload: &[u8],
) -> Vec<u8> {
    let total = AUDIO_DATA_HEADER_LEN + payload.len();
    let mut b = header(total, TYPE_IDLE, seq, local_sid, remote_sid);
    b.put_u8(AUDIO_DATA_MARKER);
    b.put_u8(0x00);
    b.put_u16(payload.len() as u16);
    b.put_u16(0x0000);
    b.put_u16(data_seq);
    b.put_slice(payload);
    b.to_vec()
}

/// Unwraps an audio data packet, returning the opaque PCM payload.
pub fn parse_audio_data(d: &[u8]) -> Option<&[u8]> {
    if d.len() < AUDIO_DATA_HEADER_LEN
        || packet_type(d) != Some(TYPE_IDLE)
        || d[16] != AUDIO_DATA_MARKER
        || d[17] != 0x00
    {
        return None;
    }
    let payload = &d[AUDIO_DATA_HEADER_LEN..];
    if usize::from(u16::from_be_bytes([d[18], d[19]])) != payload.len() {
        return None;
    }
    Some(payload)
}

fn nul_terminated(d: &[u8]) -> String {
    let end = d.iter().position(|&b| b == 0).unwrap_or(d.len());
    String::from_utf8_lossy(&d[..end]).into_owned()
}
