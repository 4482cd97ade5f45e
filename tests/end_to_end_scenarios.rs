//! End-to-end scenarios exercised against the public API: a full PTP
//! session reaching `Synced`, the missing-t4 fix, a sequence-mismatched
//! Delay_Resp, a sync timeout from `Synced`, a golden Delay_Req capture,
//! and a full six-frame health cycle.

use ptp_vmc_slave::domain::session::{Session, SessionState, TickAction};
use ptp_vmc_slave::wire::health::{classify, DeviceIdentity, FrameKind};
use ptp_vmc_slave::wire::ptp::{build_delay_req, parse_ptp_header, MessageType, PortIdentity, PtpHeader, Timestamp};
use ptp_vmc_slave::{HealthConfig, PtpConfig};

fn sync_header(seq: u16) -> PtpHeader {
    PtpHeader {
        message_type: MessageType::Sync,
        transport_specific: 0,
        version: 2,
        message_length: 44,
        domain_number: 10,
        flags: 0,
        correction: 0,
        source_port_identity: PortIdentity::ZERO,
        sequence_id: seq,
        control: 0,
        log_message_interval: 0,
    }
}

fn delay_resp_header(seq: u16) -> PtpHeader {
    PtpHeader {
        message_type: MessageType::DelayResp,
        transport_specific: 0,
        version: 2,
        message_length: 54,
        domain_number: 10,
        flags: 0,
        correction: 0,
        source_port_identity: PortIdentity::ZERO,
        sequence_id: seq,
        control: 3,
        log_message_interval: 0,
    }
}

/// Scenario 1: a session walks Init -> Listening -> SyncReceived ->
/// DelayReqSent -> Synced and comes out with a nonzero computed delay.
#[test]
fn scenario_one_full_session_reaches_synced() {
    let config = PtpConfig::default();
    let tick_hz = 1_000_000;
    let mut session = Session::new(2, 97, 2, 97, 4420);

    assert_eq!(session.tick(0, tick_hz, &config), TickAction::None);
    assert_eq!(session.state, SessionState::Listening);

    session.handle_sync(
        &sync_header(11),
        Timestamp {
            ns_since_epoch: 5_000_000_000,
        },
        1_000,
        5_000_060_000,
    );
    assert_eq!(session.state, SessionState::SyncReceived);

    let after_dwell = 1_000 + 200_000; // > 100ms dwell at 1 MHz
    let action = session.tick(after_dwell, tick_hz, &config);
    let TickAction::SendDelayReq { sequence_id } = action else {
        panic!("expected SendDelayReq, got {action:?}");
    };
    session.record_delay_req_sent(after_dwell, 5_000_090_000);
    assert_eq!(session.state, SessionState::DelayReqSent);

    session.handle_delay_resp(
        &delay_resp_header(sequence_id),
        Timestamp {
            ns_since_epoch: 5_000_130_000,
        },
        PortIdentity::ZERO,
        after_dwell + 10,
        &config,
    );

    assert_eq!(session.state, SessionState::Synced);
    assert!(session.is_synced);
    assert_eq!(session.stats.sync_count, 1);
    assert_eq!(session.delay_ns, 50_000);
}

/// Scenario 2: a Delay_Resp carrying the all-zero sentinel timestamp
/// still synchronizes the session but preserves the prior offset/delay
/// and tallies `missing_t4` rather than computing against zero.
#[test]
fn scenario_two_missing_t4_preserves_prior_offset() {
    let config = PtpConfig::default();
    let mut session = Session::new(0, 97, 0, 97, 4420);
    session.offset_ns = 777;
    session.delay_ns = 888;
    session.state = SessionState::DelayReqSent;

    session.handle_delay_resp(
        &delay_resp_header(0),
        Timestamp::new(0, 0),
        PortIdentity::ZERO,
        42,
        &config,
    );

    assert_eq!(session.state, SessionState::Synced);
    assert_eq!(session.offset_ns, 777);
    assert_eq!(session.delay_ns, 888);
    assert_eq!(session.stats.missing_t4, 1);
}

/// Scenario 3: a Delay_Resp whose sequence id doesn't match the last
/// Delay_Req sent is discounted, not treated as synchronization.
#[test]
fn scenario_three_sequence_mismatch_is_discounted() {
    let config = PtpConfig::default();
    let tick_hz = 1_000_000;
    let mut session = Session::new(0, 97, 0, 97, 4420);

    session.handle_sync(
        &sync_header(1),
        Timestamp {
            ns_since_epoch: 1_000_000_000,
        },
        0,
        1_000_000_000,
    );
    let after_dwell = 200_000;
    let action = session.tick(after_dwell, tick_hz, &config);
    let TickAction::SendDelayReq { sequence_id } = action else {
        panic!("expected SendDelayReq, got {action:?}");
    };
    session.record_delay_req_sent(after_dwell, 1_000_050_000);
    assert_eq!(session.state, SessionState::DelayReqSent);

    session.handle_delay_resp(
        &delay_resp_header(sequence_id.wrapping_add(1)),
        Timestamp::new(100, 0),
        PortIdentity::ZERO,
        after_dwell + 5,
        &config,
    );

    assert_eq!(session.state, SessionState::DelayReqSent);
    assert_eq!(session.stats.delay_resp_mismatch_count, 1);
    assert!(!session.is_synced);
}

/// Scenario 4: a synced session that stops hearing Sync reverts to
/// Listening once `sync_timeout` elapses since the last Sync.
#[test]
fn scenario_four_synced_session_times_out_back_to_listening() {
    let config = PtpConfig::default();
    let tick_hz = 1_000_000;
    let mut session = Session::new(0, 97, 0, 97, 4420);
    session.state = SessionState::Synced;
    session.is_synced = true;
    session.last_sync_tick = 0;

    let timeout_ticks = (config.sync_timeout.as_secs_f64() * tick_hz as f64) as u64;
    let action = session.tick(timeout_ticks + 1, tick_hz, &config);

    assert_eq!(action, TickAction::None);
    assert_eq!(session.state, SessionState::Listening);
    assert!(!session.is_synced);
    assert_eq!(session.stats.sync_timeout_count, 1);
}

/// Scenario 5: the observed-peer Delay_Req is byte-identical to the
/// deployment's known-good capture (106-byte padded PTP payload).
#[test]
fn scenario_five_observed_peer_delay_req_matches_golden_bytes() {
    let config = PtpConfig::observed_peer();
    let source_port_identity = config.local_port_identity;
    let frame = build_delay_req(97, 4420, 5, &source_port_identity, &config);

    assert_eq!(frame.len(), 14 + 4 + 106);
    assert_eq!(&frame[0..6], &[0x03, 0x00, 0x00, 0x00, 0x11, 0x44]);
    assert_eq!(&frame[14..16], &[0x00, 0x61]);

    let header = parse_ptp_header(&frame).unwrap();
    assert!(matches!(header.message_type, MessageType::DelayReq));
    assert_eq!(header.domain_number, 10);
    assert_eq!(header.flags, 0x0102);
    assert_eq!(header.sequence_id, 5);
    assert_eq!(header.message_length as usize, 106);
}

/// Scenario 6: six heterogeneous response frames classify and
/// accumulate into the expected per-FPGA port counts and a valid MCU
/// record, matching the deployment's known cycle tally.
#[test]
fn scenario_six_health_cycle_classification_tallies() {
    use ptp_vmc_slave::health::HealthCycle;

    let mut assistant_full = vec![0u8; ptp_vmc_slave::wire::health::FULL_FRAME_LEN];
    assistant_full[6] = 0x03;
    let mut manager_full = vec![0u8; ptp_vmc_slave::wire::health::FULL_FRAME_LEN];
    manager_full[6] = 0x01;

    let frames: Vec<Vec<u8>> = vec![
        assistant_full,
        vec![0u8; ptp_vmc_slave::wire::health::CONTINUATION_8PORT_LEN],
        manager_full,
        vec![0u8; ptp_vmc_slave::wire::health::CONTINUATION_8PORT_LEN],
        vec![0u8; ptp_vmc_slave::wire::health::CONTINUATION_3PORT_LEN],
        vec![0u8; 94],
    ];

    let mut cycle = HealthCycle::new();
    for frame in &frames {
        let kind = classify(frame).unwrap();
        cycle.accept(kind).unwrap();
    }

    assert_eq!(cycle.assistant.port_count_received(), 16);
    assert_eq!(cycle.manager.port_count_received(), 19);
    assert!(cycle.mcu_valid());
    assert_eq!(cycle.responses_received, 6);

    match classify(&frames[0]).unwrap() {
        FrameKind::FullDevice(header, _) => assert_eq!(header.identity, DeviceIdentity::Assistant),
        other => panic!("expected FullDevice, got {other:?}"),
    }

    assert_eq!(HealthConfig::default().responses_per_cycle, frames.len());
}
