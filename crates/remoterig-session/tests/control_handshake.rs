//! Full control handshake against a scripted radio on loopback sockets:
//! connect exchange, login, two-step auth, stream grant, serial data
//! round-trip, and teardown.

use std::net::{IpAddr, Ipv4Addr};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use remoterig_core::error::Error;
use remoterig_session::packet;
use remoterig_session::{ControlConfig, ControlStream};

const RADIO_SID: u32 = 0xAABB_CCDD;
const AUTH_ID: [u8; 6] = [0x5D, 0x37, 0x12, 0x82, 0x3B, 0xDE];

/// Answers the session-level machinery: connect accept, ready echo, and
/// ping replies. Returns true when the packet was consumed.
async fn answer_session_packet(socket: &UdpSocket, d: &[u8], peer: std::net::SocketAddr) -> bool {
    if d.len() == 16 && d[4] == 0x03 {
        let peer_sid = u32::from_be_bytes([d[8], d[9], d[10], d[11]]);
        let mut ack = vec![0u8; 16];
        ack[0] = 0x10;
        ack[4] = 0x04;
        ack[8..12].copy_from_slice(&RADIO_SID.to_be_bytes());
        ack[12..16].copy_from_slice(&peer_sid.to_be_bytes());
        let _ = socket.send_to(&ack, peer).await;
        return true;
    }
    if d.len() == 16 && d[4] == 0x06 {
        let _ = socket.send_to(d, peer).await;
        return true;
    }
    if let Some(ping) = packet::parse_ping(d) {
        if !ping.reply {
            let _ = socket.send_to(&packet::ping_reply(&ping, 0, 0), peer).await;
        }
        return true;
    }
    // Idle keepalives need no answer from the radio side.
    d.len() == 16 && d[4] == 0x00
}

/// The control-port script: login reply, auth confirm, stream grant.
fn spawn_control_script(socket: UdpSocket, reject_login: bool) {
    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let d = buf[..n].to_vec();
            if answer_session_packet(&socket, &d, peer).await {
                continue;
            }
            match d.len() {
                128 => {
                    let mut reply = vec![0u8; 96];
                    reply[0] = 0x60;
                    reply[6] = 0x01;
                    reply[26..32].copy_from_slice(&AUTH_ID);
                    if reject_login {
                        reply[48..52].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFE]);
                    }
                    let _ = socket.send_to(&reply, peer).await;
                }
                64 if d[21] == 0x05 => {
                    let mut reply = vec![0u8; 64];
                    reply[0] = 0x40;
                    reply[21] = 0x05;
                    let _ = socket.send_to(&reply, peer).await;
                }
                144 => {
                    let mut reply = vec![0u8; 144];
                    reply[0] = 0x90;
                    reply[64..70].copy_from_slice(b"IC-705");
                    reply[96] = 1;
                    let _ = socket.send_to(&reply, peer).await;
                }
                _ => {}
            }
        }
    });
}

/// The serial-port script: unwraps inbound serial data, reports it to
/// the test, and wraps one canned CI-V reply back.
fn spawn_serial_script(socket: UdpSocket, seen_tx: mpsc::Sender<Vec<u8>>) {
    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let d = buf[..n].to_vec();
            if answer_session_packet(&socket, &d, peer).await {
                continue;
            }
            if let Some(payload) = packet::parse_serial_data(&d) {
                let _ = seen_tx.send(payload.to_vec()).await;
                let reply = packet::serial_data(
                    0,
                    RADIO_SID,
                    0,
                    0,
                    &[0xFE, 0xFE, 0xE0, 0xA4, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD],
                );
                let _ = socket.send_to(&reply, peer).await;
            }
        }
    });
}

/// The audio-port script only services the session machinery.
fn spawn_audio_script(socket: UdpSocket) {
    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let d = buf[..n].to_vec();
            answer_session_packet(&socket, &d, peer).await;
        }
    });
}

async fn radio_config(reject_login: bool) -> (ControlConfig, mpsc::Receiver<Vec<u8>>) {
    let control = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let serial = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let audio = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let cfg = ControlConfig {
        radio_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        control_port: control.local_addr().unwrap().port(),
        serial_port: serial.local_addr().unwrap().port(),
        audio_port: audio.local_addr().unwrap().port(),
        username: "beer".into(),
        password: "beerbeer".into(),
    };

    let (seen_tx, seen_rx) = mpsc::channel(16);
    spawn_control_script(control, reject_login);
    spawn_serial_script(serial, seen_tx);
    spawn_audio_script(audio);
    (cfg, seen_rx)
}

#[tokio::test]
async fn full_handshake_and_serial_round_trip() {
    let (cfg, mut seen_rx) = radio_config(false).await;
    let (err_tx, _err_rx) = mpsc::channel(8);

    let (control, mut serial_rx, _audio_rx) = ControlStream::connect(&cfg, err_tx)
        .await
        .expect("handshake");

    // Outbound CI-V reaches the radio unwrapped.
    let civ = [0xFE, 0xFE, 0xA4, 0xE0, 0x03, 0xFD];
    control.serial().send_civ(&civ).await.unwrap();
    assert_eq!(seen_rx.recv().await.expect("radio saw the frame"), civ);

    // The radio's wrapped reply arrives unwrapped on the CI-V channel.
    let inbound = serial_rx.recv().await.expect("civ reply");
    assert_eq!(
        inbound,
        vec![0xFE, 0xFE, 0xE0, 0xA4, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]
    );

    control.disconnect().await;
    // A second disconnect is a no-op.
    control.disconnect().await;
}

#[tokio::test]
async fn rejected_credentials_fail_the_connect() {
    let (cfg, _seen_rx) = radio_config(true).await;
    let (err_tx, _err_rx) = mpsc::channel(8);

    let result = ControlStream::connect(&cfg, err_tx).await;
    assert!(matches!(result, Err(Error::AuthenticationFailed)));
}

#[tokio::test]
async fn passthrough_rejects_unframed_bytes() {
    let (cfg, _seen_rx) = radio_config(false).await;
    let (err_tx, _err_rx) = mpsc::channel(8);

    let (control, _serial_rx, _audio_rx) = ControlStream::connect(&cfg, err_tx)
        .await
        .expect("handshake");

    let result = control.serial().send_passthrough(b"garbage").await;
    assert!(matches!(result, Err(Error::InvalidParameter(_))));

    control.disconnect().await;
}
