//! End-to-end engine scenarios against the mock link.
//!
//! These tests drive the public engine API, inject radio replies through
//! the inbound channel, and assert on the exact wire bytes. Time is
//! paused so retry and safety-timer behavior is deterministic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use remoterig_civ::engine::{CivEngine, COMMAND_RETRY_TIMEOUT, PTT_TIMEOUT};
use remoterig_civ::frame::DEFAULT_CIV_ADDR;
use remoterig_core::{FrameSink, ReportEvent, SplitMode};
use remoterig_test_harness::MockLink;

async fn start_engine() -> (
    Arc<MockLink>,
    CivEngine,
    mpsc::Sender<Vec<u8>>,
    mpsc::Receiver<Vec<u8>>,
) {
    let link = MockLink::new();
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let sink: Arc<dyn FrameSink> = link.clone() as Arc<dyn FrameSink>;
    let (engine, passthrough_rx) = CivEngine::start(sink, DEFAULT_CIV_ADDR, inbound_rx)
        .await
        .expect("engine start");
    // Drop the initial bulk-read burst from the log; the scenarios assert
    // on what they send themselves.
    link.clear();
    (link, engine, inbound_tx, passthrough_rx)
}

/// Send a radio frame into the engine and let the loop process it.
async fn inject(tx: &mpsc::Sender<Vec<u8>>, frame: &[u8]) {
    tx.send(frame.to_vec()).await.expect("engine loop alive");
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn initial_sync_reads_full_state() {
    let link = MockLink::new();
    let (_inbound_tx, inbound_rx) = mpsc::channel(64);
    let sink: Arc<dyn FrameSink> = link.clone() as Arc<dyn FrameSink>;
    let (engine, _passthrough) = CivEngine::start(sink, DEFAULT_CIV_ADDR, inbound_rx)
        .await
        .expect("engine start");

    // Both VFO freqs, both modes, and every status getter, once each.
    assert_eq!(link.sent_count(), 19);
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x25, 0x00, 0xFD]));
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x25, 0x01, 0xFD]));
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x26, 0x00, 0xFD]));
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x0F, 0xFD]));
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x15, 0x15, 0xFD]));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn initial_sync_failure_is_fatal() {
    let link = MockLink::new();
    link.set_failing(true);
    let (_inbound_tx, inbound_rx) = mpsc::channel(64);
    let sink: Arc<dyn FrameSink> = link.clone() as Arc<dyn FrameSink>;
    assert!(
        CivEngine::start(sink, DEFAULT_CIV_ADDR, inbound_rx)
            .await
            .is_err()
    );
}

#[tokio::test(start_paused = true)]
async fn scenario_set_main_vfo_freq() {
    let (link, engine, tx, mut passthrough) = start_engine().await;

    // Answer the initial bulk read's main-frequency getter first, so the
    // scenario's reply maps onto the set command rather than onto it.
    inject(
        &tx,
        &[0xFE, 0xFE, 0xE0, 0xA4, 0x25, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0xFD],
    )
    .await;
    link.clear();

    engine.set_main_vfo_freq(14_250_000).await.unwrap();
    assert_eq!(
        link.sent(),
        vec![vec![
            0xFE, 0xFE, 0xA4, 0xE0, 0x25, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD
        ]]
    );

    // The radio acknowledges with the same frequency payload.
    inject(
        &tx,
        &[0xFE, 0xFE, 0xE0, 0xA4, 0x25, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD],
    )
    .await;

    let state = engine.device_state().await;
    assert_eq!(state.freq, 14_250_000);
    assert_eq!(state.band_idx, 4);

    // The reply was absorbed by the pending command: nothing reaches the
    // pass-through consumer, and the command is not retried.
    assert!(passthrough.try_recv().is_err());
    link.clear();
    tokio::time::sleep(COMMAND_RETRY_TIMEOUT + Duration::from_millis(50)).await;
    assert_eq!(
        link.count_of(&[0xFE, 0xFE, 0xA4, 0xE0, 0x25, 0x00, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]),
        0
    );

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_s_meter_decode() {
    let (_link, engine, tx, _passthrough) = start_engine().await;
    let mut reports = engine.subscribe();

    inject(&tx, &[0xFE, 0xFE, 0xE0, 0xA4, 0x15, 0x02, 0x01, 0x20, 0xFD]).await;

    // Raw 0x0120 on the 18-step ladder rounds to S9.
    let event = reports.try_recv().expect("s-meter report");
    match event {
        ReportEvent::SMeter { label } => assert_eq!(label, "S9"),
        other => panic!("expected SMeter, got {other:?}"),
    }
    assert!(engine.device_state().await.last_s_received_at.is_some());

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_ptt_timeout_forces_release() {
    let (link, engine, _tx, _passthrough) = start_engine().await;

    engine.set_ptt(true).await.unwrap();
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x1C, 0x00, 0x01, 0xFD]));

    // No transmit-status reply ever arrives; the safety timer must key off.
    tokio::time::sleep(PTT_TIMEOUT + Duration::from_secs(1)).await;
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x1C, 0x00, 0x00, 0xFD]));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_split_toggle_cycle() {
    let (link, engine, tx, _passthrough) = start_engine().await;

    let expected_codes = [0x01u8, 0x11, 0x12, 0x10];
    let echoes = [0x01u8, 0x11, 0x12, 0x00];
    for (code, echo) in expected_codes.iter().zip(echoes) {
        link.clear();
        engine.toggle_split().await.unwrap();
        let sent = link.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][5], *code, "split body byte");
        // Radio echoes the new split state so the next toggle advances.
        inject(&tx, &[0xFE, 0xFE, 0xE0, 0xA4, 0x0F, echo, 0xFD]).await;
    }
    assert_eq!(engine.device_state().await.split, SplitMode::Off);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_tuning_step_wrap() {
    let (link, engine, tx, _passthrough) = start_engine().await;

    // Fresh state has step code 0: stepping down wraps to 13.
    engine.dec_ts().await.unwrap();
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x10, 0x0D, 0xFD]));

    // Radio reports step code 13; stepping up wraps to 0.
    inject(&tx, &[0xFE, 0xFE, 0xE0, 0xA4, 0x10, 0x0D, 0xFD]).await;
    link.clear();
    engine.inc_ts().await.unwrap();
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x10, 0x00, 0xFD]));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_unanswered_command_retries() {
    let (link, engine, _tx, _passthrough) = start_engine().await;

    engine.set_squelch(40).await.unwrap();
    let frame = link.sent().pop().expect("squelch frame");
    assert_eq!(link.count_of(&frame), 1);

    // Drop the reply; the identical bytes go out again after the retry
    // window, and again after the next one.
    tokio::time::sleep(COMMAND_RETRY_TIMEOUT + Duration::from_millis(50)).await;
    assert_eq!(link.count_of(&frame), 2);
    tokio::time::sleep(COMMAND_RETRY_TIMEOUT).await;
    assert!(link.count_of(&frame) >= 3);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn tune_request_while_transmitting_is_dropped() {
    let (link, engine, tx, _passthrough) = start_engine().await;

    inject(&tx, &[0xFE, 0xFE, 0xE0, 0xA4, 0x1C, 0x00, 0x01, 0xFD]).await;
    assert!(engine.device_state().await.ptt);

    link.clear();
    engine.set_tune(true).await.unwrap();
    assert_eq!(link.sent_count(), 0);
    assert!(!engine.device_state().await.tune);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn power_nudges_stop_at_the_rails() {
    let (link, engine, tx, _passthrough) = start_engine().await;

    // Radio reports full power: inc is a no-op.
    inject(&tx, &[0xFE, 0xFE, 0xE0, 0xA4, 0x14, 0x0A, 0x02, 0x55, 0xFD]).await;
    link.clear();
    engine.inc_power().await.unwrap();
    assert_eq!(link.sent_count(), 0);

    // Radio reports zero power: dec is a no-op.
    inject(&tx, &[0xFE, 0xFE, 0xE0, 0xA4, 0x14, 0x0A, 0x00, 0x00, 0xFD]).await;
    link.clear();
    engine.dec_power().await.unwrap();
    assert_eq!(link.sent_count(), 0);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn band_step_from_gene_wraps_to_first_band() {
    let (link, engine, _tx, _passthrough) = start_engine().await;

    // Fresh state sits on the GENE row; stepping up wraps to 1.9 MHz,
    // whose midpoint is the target since the band has no memory yet.
    engine.inc_band().await.unwrap();
    let mid = (1_800_000u64 + 1_999_999) / 2;
    let sent = link.sent();
    assert_eq!(sent.len(), 1);
    let mut expected = vec![0xFE, 0xFE, 0xA4, 0xE0, 0x25, 0x00];
    expected.extend_from_slice(&remoterig_civ::frame::encode_frequency(mid));
    expected.push(0xFD);
    assert_eq!(sent[0], expected);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn spontaneous_frames_reach_the_passthrough() {
    let (_link, engine, tx, mut passthrough) = start_engine().await;

    // The first reply answers the initial bulk read's getter and is
    // absorbed.
    inject(
        &tx,
        &[0xFE, 0xFE, 0xE0, 0xA4, 0x25, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0xFD],
    )
    .await;
    assert!(passthrough.try_recv().is_err());

    // The same broadcast with nothing pending still updates state and is
    // forwarded.
    inject(
        &tx,
        &[0xFE, 0xFE, 0xE0, 0xA4, 0x25, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0xFD],
    )
    .await;
    assert_eq!(engine.device_state().await.freq, 7_000_000);
    assert_eq!(
        passthrough.try_recv().expect("forwarded frame"),
        vec![0xFE, 0xFE, 0xE0, 0xA4, 0x25, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0xFD]
    );

    // Bytes without CI-V sentinels pass through untouched.
    inject(&tx, b"not a civ frame").await;
    assert_eq!(
        passthrough.try_recv().expect("forwarded bytes"),
        b"not a civ frame".to_vec()
    );

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn tune_start_polls_status_after_a_second() {
    let (link, engine, tx, _passthrough) = start_engine().await;

    inject(&tx, &[0xFE, 0xFE, 0xE0, 0xA4, 0x1C, 0x01, 0x02, 0xFD]).await;
    assert!(engine.device_state().await.tune);

    link.clear();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x1C, 0x00, 0xFD]));
    assert!(link.was_sent(&[0xFE, 0xFE, 0xA4, 0xE0, 0x1C, 0x01, 0xFD]));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let (_link, engine, _tx, _passthrough) = start_engine().await;
    engine.shutdown().await;
    engine.shutdown().await;
}
