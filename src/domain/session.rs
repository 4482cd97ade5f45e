//! The PTP slave session: one VLAN-scoped state machine per `(rx_port,
//! rx_vlan)` pair (spec §4.1/§4.4). Grounded in `ptp_state.c`'s
//! `ptp_handle_sync`/`ptp_handle_delay_resp`/`ptp_calculate_offset_delay`/
//! `ptp_state_machine_tick`, with one deliberate divergence: see
//! `compute_offset_delay` below and DESIGN.md.

use std::time::Duration;

use crate::config::PtpConfig;
use crate::wire::ptp::{PortIdentity, PtpHeader, Timestamp};

/// Lifecycle state of one session (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Listening,
    SyncReceived,
    DelayReqSent,
    Synced,
    Error,
}

/// What a tick wants the worker to do. Sending the frame is the worker's
/// job (it owns the `PacketIo`); the session only decides *whether*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    None,
    SendDelayReq { sequence_id: u16 },
}

/// Cumulative counters surfaced in the status report (spec §4.6,
/// `ptp_print_stats`'s column set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SessionStats {
    pub sync_rx_count: u64,
    pub delay_req_tx_count: u64,
    pub delay_resp_rx_count: u64,
    pub sync_count: u64,
    pub sync_errors: u64,
    pub sync_timeout_count: u64,
    pub delay_resp_mismatch_count: u64,
    pub missing_t4: u64,
}

fn duration_to_ticks(d: Duration, tick_hz: u64) -> u64 {
    (d.as_secs_f64() * tick_hz as f64) as u64
}

/// One PTP slave session bound to a receive VLAN and a transmit
/// (port, VLAN, VL-IDX) triple used to build its Delay_Req frames.
#[derive(Debug, Clone)]
pub struct Session {
    pub rx_port: u16,
    pub rx_vlan: u16,
    pub tx_port: u16,
    pub tx_vlan: u16,
    pub tx_vl_idx: u16,

    pub state: SessionState,
    pub is_synced: bool,

    pub master_port_identity: PortIdentity,
    pub master_domain: u8,
    pub last_sync_seq_id: u16,
    pub last_sync_tick: u64,

    t1_ns: u64,
    t2_tick: u64,
    t2_realtime_ns: u64,
    t3_realtime_ns: u64,
    t4_ns: u64,

    next_delay_req_seq_id: u16,
    last_delay_req_seq_id: u16,
    delay_req_pending: bool,

    pub offset_ns: i64,
    pub delay_ns: i64,

    last_state_change: u64,
    pub stats: SessionStats,
}

impl Session {
    pub fn new(rx_port: u16, rx_vlan: u16, tx_port: u16, tx_vlan: u16, tx_vl_idx: u16) -> Self {
        Session {
            rx_port,
            rx_vlan,
            tx_port,
            tx_vlan,
            tx_vl_idx,
            state: SessionState::Init,
            is_synced: false,
            master_port_identity: PortIdentity::ZERO,
            master_domain: 0,
            last_sync_seq_id: 0,
            last_sync_tick: 0,
            t1_ns: 0,
            t2_tick: 0,
            t2_realtime_ns: 0,
            t3_realtime_ns: 0,
            t4_ns: 0,
            next_delay_req_seq_id: 0,
            last_delay_req_seq_id: 0,
            delay_req_pending: false,
            offset_ns: 0,
            delay_ns: 0,
            last_state_change: 0,
            stats: SessionStats::default(),
        }
    }

    /// Process a received Sync. Master identity, domain, and sequence id
    /// are tracked unconditionally; t1/t2 are only latched — and the
    /// state machine only advances to `SyncReceived` — from `Listening`,
    /// `Synced`, or `Error` (spec §4.4 transition table).
    pub fn handle_sync(
        &mut self,
        header: &PtpHeader,
        origin_timestamp: Timestamp,
        rx_tick: u64,
        rx_realtime_ns: u64,
    ) {
        self.master_port_identity = header.source_port_identity;
        self.master_domain = header.domain_number;
        self.last_sync_seq_id = header.sequence_id;
        self.last_sync_tick = rx_tick;

        if matches!(
            self.state,
            SessionState::Listening | SessionState::Synced | SessionState::Error
        ) {
            self.t1_ns = origin_timestamp.ns_since_epoch;
            self.t2_tick = rx_tick;
            self.t2_realtime_ns = rx_realtime_ns;
            self.state = SessionState::SyncReceived;
            self.last_state_change = rx_tick;
            self.stats.sync_rx_count += 1;
        }
    }

    /// Process a received Delay_Resp. A sequence id mismatch (stale or
    /// for a different session sharing the VLAN) is silently discounted
    /// except for a mismatch counter — it is not a transport error (spec
    /// §4.3).
    pub fn handle_delay_resp(
        &mut self,
        header: &PtpHeader,
        receive_timestamp: Timestamp,
        requesting_port_id: PortIdentity,
        now_tick: u64,
        config: &PtpConfig,
    ) {
        if header.sequence_id != self.last_delay_req_seq_id {
            self.stats.delay_resp_mismatch_count += 1;
            return;
        }
        if config.verify_requesting_port_id && requesting_port_id != config.local_port_identity {
            self.stats.delay_resp_mismatch_count += 1;
            return;
        }

        self.t4_ns = receive_timestamp.ns_since_epoch;
        self.stats.delay_resp_rx_count += 1;

        if self.state == SessionState::DelayReqSent {
            self.compute_offset_delay();
            self.state = SessionState::Synced;
            self.is_synced = true;
            self.stats.sync_count += 1;
            self.last_state_change = now_tick;
        }
    }

    /// Recompute `offset_ns`/`delay_ns` from the latched t1..t4.
    ///
    /// Divergence from `ptp_calculate_offset_delay` in `ptp_state.c`: the
    /// original zeroes both fields when t4 is the all-zero sentinel. This
    /// crate instead skips the recompute and preserves the last good
    /// values, counting the occurrence in `stats.missing_t4` — the
    /// resolved Open Question in SPEC_FULL.md §7.
    fn compute_offset_delay(&mut self) {
        if self.t4_ns == 0 {
            self.stats.missing_t4 += 1;
            return;
        }
        let t2_minus_t1 = self.t2_realtime_ns as i64 - self.t1_ns as i64;
        let t4_minus_t3 = self.t4_ns as i64 - self.t3_realtime_ns as i64;
        self.offset_ns = (t2_minus_t1 - t4_minus_t3) / 2;
        self.delay_ns = (t2_minus_t1 + t4_minus_t3) / 2;
    }

    /// Advance the state machine by one worker iteration. Returns the
    /// action the worker must perform; the worker reports the outcome
    /// back via [`Session::record_delay_req_sent`] or
    /// [`Session::record_delay_req_failed`].
    pub fn tick(&mut self, now: u64, tick_hz: u64, config: &PtpConfig) -> TickAction {
        match self.state {
            SessionState::Init => {
                self.state = SessionState::Listening;
                self.last_state_change = now;
                TickAction::None
            }
            SessionState::Listening => {
                let timeout_ticks = duration_to_ticks(config.sync_timeout, tick_hz);
                if self.last_sync_tick > 0 && now.saturating_sub(self.last_sync_tick) >= timeout_ticks {
                    self.stats.sync_timeout_count += 1;
                    self.last_state_change = now;
                }
                TickAction::None
            }
            SessionState::SyncReceived => {
                if self.delay_req_pending {
                    return TickAction::None;
                }
                let dwell_ticks = duration_to_ticks(config.delay_req_interval, tick_hz);
                if now.saturating_sub(self.last_state_change) >= dwell_ticks {
                    self.next_delay_req_seq_id = self.next_delay_req_seq_id.wrapping_add(1);
                    self.delay_req_pending = true;
                    TickAction::SendDelayReq {
                        sequence_id: self.next_delay_req_seq_id,
                    }
                } else {
                    TickAction::None
                }
            }
            SessionState::DelayReqSent => {
                let timeout_ticks = duration_to_ticks(config.delay_resp_timeout, tick_hz);
                if now.saturating_sub(self.last_state_change) >= timeout_ticks {
                    self.state = SessionState::Listening;
                    self.last_state_change = now;
                    self.stats.sync_timeout_count += 1;
                }
                TickAction::None
            }
            SessionState::Synced => {
                let timeout_ticks = duration_to_ticks(config.sync_timeout, tick_hz);
                if now.saturating_sub(self.last_sync_tick) >= timeout_ticks {
                    self.state = SessionState::Listening;
                    self.last_state_change = now;
                    self.is_synced = false;
                    self.stats.sync_timeout_count += 1;
                }
                TickAction::None
            }
            SessionState::Error => {
                let timeout_ticks = duration_to_ticks(config.sync_timeout, tick_hz);
                if now.saturating_sub(self.last_state_change) >= timeout_ticks {
                    self.state = SessionState::Listening;
                    self.last_state_change = now;
                }
                TickAction::None
            }
        }
    }

    /// Report a successful Delay_Req transmission. `t3_realtime_ns` is the
    /// wall-clock timestamp the worker derived from the TX-straddling tick
    /// pair (spec §4.2: `(tsc_before + tsc_after) / 2`).
    pub fn record_delay_req_sent(&mut self, now: u64, t3_realtime_ns: u64) {
        self.t3_realtime_ns = t3_realtime_ns;
        self.last_delay_req_seq_id = self.next_delay_req_seq_id;
        self.state = SessionState::DelayReqSent;
        self.last_state_change = now;
        self.delay_req_pending = false;
        self.stats.delay_req_tx_count += 1;
    }

    /// Report a failed Delay_Req transmission (spec §4.4: TX failure
    /// moves the session to `Error`, not back to `Listening` directly).
    pub fn record_delay_req_failed(&mut self, now: u64) {
        self.state = SessionState::Error;
        self.last_state_change = now;
        self.delay_req_pending = false;
        self.stats.sync_errors += 1;
    }

    pub fn reset_stats(&mut self) {
        self.stats = SessionStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ptp::MessageType;

    fn sync_header(seq: u16, domain: u8) -> PtpHeader {
        PtpHeader {
            message_type: MessageType::Sync,
            transport_specific: 0,
            version: 2,
            message_length: 44,
            domain_number: domain,
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

    #[test]
    fn happy_path_reaches_synced_with_computed_offset_and_delay() {
        let config = PtpConfig::default();
        let mut session = Session::new(0, 97, 0, 97, 4420);
        assert_eq!(session.tick(0, 1_000_000, &config), TickAction::None); // INIT -> LISTENING

        // Scenario values use directly-injected nanosecond timestamps rather
        // than routing literal seconds/nanoseconds fields through the wire
        // codec, so the scales line up: t1=1_000_000_000ns (~"1000s" in the
        // narrative), t2=1_000_050_000ns, t3=1_000_150_000ns, t4=1_000_200_000ns.
        session.handle_sync(
            &sync_header(1, 10),
            Timestamp {
                ns_since_epoch: 1_000_000_000,
            },
            100,
            1_000_050_000,
        );
        assert_eq!(session.state, SessionState::SyncReceived);

        let action = session.tick(100 + 1_000_000 /* well past dwell */, 1_000_000, &config);
        assert_eq!(action, TickAction::SendDelayReq { sequence_id: 1 });
        session.record_delay_req_sent(100 + 1_000_000, 1_000_150_000);
        assert_eq!(session.state, SessionState::DelayReqSent);

        session.handle_delay_resp(
            &delay_resp_header(1),
            Timestamp {
                ns_since_epoch: 1_000_200_000,
            },
            PortIdentity::ZERO,
            200,
            &config,
        );
        assert_eq!(session.state, SessionState::Synced);
        assert!(session.is_synced);
        assert_eq!(session.stats.sync_count, 1);
        assert_eq!(session.offset_ns, 0);
        assert_eq!(session.delay_ns, 50_000);
    }

    #[test]
    fn missing_t4_preserves_prior_offset_but_still_synchronizes() {
        let config = PtpConfig::default();
        let mut session = Session::new(0, 97, 0, 97, 4420);
        session.offset_ns = 123;
        session.delay_ns = 456;
        session.state = SessionState::DelayReqSent;
        session.handle_delay_resp(
            &delay_resp_header(0),
            Timestamp::new(0, 0),
            PortIdentity::ZERO,
            10,
            &config,
        );
        assert_eq!(session.state, SessionState::Synced);
        assert_eq!(session.stats.missing_t4, 1);
        assert_eq!(session.offset_ns, 123);
        assert_eq!(session.delay_ns, 456);
    }

    #[test]
    fn sequence_mismatched_delay_resp_is_discounted() {
        let config = PtpConfig::default();
        let mut session = Session::new(0, 97, 0, 97, 4420);
        session.state = SessionState::DelayReqSent;
        session.last_delay_req_seq_id = 5;
        session.handle_delay_resp(
            &delay_resp_header(6),
            Timestamp::new(1000, 0),
            PortIdentity::ZERO,
            10,
            &config,
        );
        assert_eq!(session.state, SessionState::DelayReqSent);
        assert_eq!(session.stats.delay_resp_mismatch_count, 1);
        assert_eq!(session.stats.delay_resp_rx_count, 0);
    }

    #[test]
    fn synced_session_reverts_to_listening_after_sync_timeout() {
        let config = PtpConfig::default();
        let mut session = Session::new(0, 97, 0, 97, 4420);
        session.state = SessionState::Synced;
        session.is_synced = true;
        session.last_sync_tick = 0;

        let timeout_ticks = duration_to_ticks(config.sync_timeout, 1_000_000);
        let action = session.tick(timeout_ticks + 1, 1_000_000, &config);
        assert_eq!(action, TickAction::None);
        assert_eq!(session.state, SessionState::Listening);
        assert!(!session.is_synced);
        assert_eq!(session.stats.sync_timeout_count, 1);
    }

    #[test]
    fn delay_req_failure_moves_to_error_then_back_to_listening() {
        let config = PtpConfig::default();
        let mut session = Session::new(0, 97, 0, 97, 4420);
        session.state = SessionState::SyncReceived;
        session.last_state_change = 0;
        let dwell = duration_to_ticks(config.delay_req_interval, 1_000_000);
        let action = session.tick(dwell + 1, 1_000_000, &config);
        assert_eq!(action, TickAction::SendDelayReq { sequence_id: 1 });

        session.record_delay_req_failed(dwell + 1);
        assert_eq!(session.state, SessionState::Error);
        assert_eq!(session.stats.sync_errors, 1);

        let timeout_ticks = duration_to_ticks(config.sync_timeout, 1_000_000);
        let action = session.tick(dwell + 1 + timeout_ticks + 1, 1_000_000, &config);
        assert_eq!(action, TickAction::None);
        assert_eq!(session.state, SessionState::Listening);
    }
}
