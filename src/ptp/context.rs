//! Global PTP context: port/session ownership, init and running flags.
//!
//! Grounded in `ptp_worker.c`'s `g_ptp_ctx`/`ptp_init`/
//! `ptp_configure_split_sessions`/`ptp_start`/`ptp_stop`/`ptp_get_stats`/
//! `ptp_print_stats`, reshaped from a single static struct into an
//! explicit value the host constructs and tears down (spec §9 "Global
//! state").
//!
//! Each port's sessions live behind an `Arc<Mutex<PtpPort>>`: the owning
//! [`crate::ptp::worker::PtpWorker`] holds the only clone that ever calls
//! `rx_burst`/`tick`, so contention is never more than a reporter taking
//! a brief snapshot between worker iterations (spec §5's "reporter
//! thread sees a consistent snapshot" requirement).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::PtpConfig;
use crate::domain::session::{Session, SessionState, SessionStats};
use crate::error::ConfigError;
use crate::io::FlowApi;
use crate::ptp::flow;
use crate::ptp::PTP_RX_QUEUE_ID;

/// One RX-port's worth of sessions (spec §3 `PTPPort`). The transmit
/// buffer pool and worker identifier named in spec §3 are external
/// collaborators (`io::PacketIo`, the host's thread handle) and are not
/// modeled as fields here.
#[derive(Debug, Default)]
pub struct PtpPort {
    pub port_id: u16,
    pub sessions: Vec<Session>,
}

/// Static description of one session to configure, mirroring
/// `ptp_session_config` in the original `ptp_configure_split_sessions`.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub rx_port: u16,
    pub rx_vlan: u16,
    pub tx_port: u16,
    pub tx_vlan: u16,
    pub tx_vl_idx: u16,
}

/// One row of the aggregated statistics snapshot (spec §3 "Statistics
/// counters readable from a reporting thread").
#[derive(Debug, Clone, Copy)]
pub struct SessionSnapshot {
    pub rx_port: u16,
    pub rx_vlan: u16,
    pub state: SessionState,
    pub offset_ns: i64,
    pub delay_ns: i64,
    pub is_synced: bool,
    pub stats: SessionStats,
}

/// Process-wide PTP context (spec §3 `PTPContext`): the mapping from
/// port index to `PTPPort`, the initialization and running flags, the
/// monotonic-tick frequency, and the locally-visible MAC.
pub struct PtpContext {
    ports: HashMap<u16, Arc<Mutex<PtpPort>>>,
    initialized: bool,
    running: Arc<AtomicBool>,
    tick_hz: u64,
    local_mac: [u8; 6],
    max_sessions_per_port: usize,
}

impl Default for PtpContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PtpContext {
    pub fn new() -> Self {
        Self {
            ports: HashMap::new(),
            initialized: false,
            running: Arc::new(AtomicBool::new(false)),
            tick_hz: 0,
            local_mac: [0; 6],
            max_sessions_per_port: PtpConfig::default().max_sessions_per_port,
        }
    }

    /// Mark the context ready to accept session configuration (spec
    /// §4.5/§9: replaces `ptp_init`'s TSC-frequency and MAC-address
    /// reads, taken here from the caller's already-resolved
    /// `TimeSource`/`PacketIo` rather than queried internally).
    pub fn init(&mut self, tick_hz: u64, local_mac: [u8; 6], config: &PtpConfig) {
        self.tick_hz = tick_hz;
        self.local_mac = local_mac;
        self.max_sessions_per_port = config.max_sessions_per_port;
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn tick_hz(&self) -> u64 {
        self.tick_hz
    }

    pub fn local_mac(&self) -> [u8; 6] {
        self.local_mac
    }

    /// Add one session to its `rx_port`'s port entry, creating the port
    /// entry on first use (spec §4.5 `ptp_configure_split_sessions`).
    /// Rejects a port that has already reached `max_sessions_per_port`
    /// (spec §7 "Configuration" error kind — returned to the caller,
    /// no runtime effect).
    pub fn configure_session(&mut self, cfg: SessionConfig) -> Result<(), ConfigError> {
        if !self.initialized {
            return Err(ConfigError::Uninitialized);
        }
        let port = self
            .ports
            .entry(cfg.rx_port)
            .or_insert_with(|| {
                Arc::new(Mutex::new(PtpPort {
                    port_id: cfg.rx_port,
                    sessions: Vec::new(),
                }))
            })
            .clone();
        let mut guard = port.lock().expect("ptp port mutex poisoned");
        if guard.sessions.len() >= self.max_sessions_per_port {
            return Err(ConfigError::TooManySessions {
                port: cfg.rx_port,
                count: guard.sessions.len(),
                max: self.max_sessions_per_port,
            });
        }
        let index = guard.sessions.len();
        guard.sessions.push(Session::new(
            cfg.rx_port,
            cfg.rx_vlan,
            cfg.tx_port,
            cfg.tx_vlan,
            cfg.tx_vl_idx,
        ));
        let _ = index; // session_index is implicit in Vec position
        Ok(())
    }

    /// Enabled RX port ids, sorted for deterministic reporting order.
    pub fn enabled_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.ports.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Hand out the shared handle for one port's sessions, for a worker
    /// to move into its own thread.
    pub fn port_handle(&self, port_id: u16) -> Option<Arc<Mutex<PtpPort>>> {
        self.ports.get(&port_id).cloned()
    }

    /// The shared running flag a worker polls once per loop iteration
    /// (spec §5 cancellation: "a single process-wide flag set by
    /// signal").
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Install flow rules for every enabled port and flip the running
    /// flag (spec §4.5/§9 `ptp_start`). Workers are spawned by the host
    /// using [`PtpContext::port_handle`] and [`PtpContext::running_flag`];
    /// this context does not own `std::thread::JoinHandle`s itself.
    pub fn start<F: FlowApi>(&mut self, flow_api: &mut F) -> Result<HashMap<u16, F::Handle>, ConfigError> {
        if !self.initialized {
            return Err(ConfigError::Uninitialized);
        }
        let mut handles = HashMap::new();
        for port_id in self.enabled_ports() {
            if let Some(handle) = flow::install_port(flow_api, port_id, PTP_RX_QUEUE_ID) {
                handles.insert(port_id, handle);
            }
        }
        self.running.store(true, Ordering::Release);
        Ok(handles)
    }

    /// Clear the running flag and destroy installed flow rules (spec §5:
    /// "shutdown waits for all workers before reclaiming resources" — the
    /// host is responsible for joining the worker threads it spawned
    /// before the flow rules they depended on are torn down).
    pub fn stop<F: FlowApi>(&mut self, flow_api: &mut F, handles: HashMap<u16, F::Handle>) {
        self.running.store(false, Ordering::Release);
        for (port_id, handle) in handles {
            flow::remove_port(flow_api, port_id, Some(handle));
        }
    }

    /// Consistent per-session snapshot across every configured port
    /// (spec §4.3 `snapshot_stats`, aggregated — spec §4.5/§9
    /// `ptp_get_stats`).
    pub fn snapshot_stats(&self) -> Vec<SessionSnapshot> {
        let mut out = Vec::new();
        for port_id in self.enabled_ports() {
            let handle = &self.ports[&port_id];
            let guard = handle.lock().expect("ptp port mutex poisoned");
            for session in &guard.sessions {
                out.push(SessionSnapshot {
                    rx_port: port_id,
                    rx_vlan: session.rx_vlan,
                    state: session.state,
                    offset_ns: session.offset_ns,
                    delay_ns: session.delay_ns,
                    is_synced: session.is_synced,
                    stats: session.stats,
                });
            }
        }
        out
    }

    /// Reset every session's statistics counters (spec §4.5/§9
    /// `ptp_reset_stats`).
    pub fn reset_all_stats(&mut self) {
        for handle in self.ports.values() {
            let mut guard = handle.lock().expect("ptp port mutex poisoned");
            for session in guard.sessions.iter_mut() {
                session.reset_stats();
            }
        }
    }

    /// Render the aligned statistics table (spec §4.5/§9
    /// `ptp_print_stats`'s column set: port, VLAN, state, offset, delay,
    /// counters, sync flag).
    pub fn render_stats_table(&self) -> String {
        let mut out = String::from("--- PTP Statistics ---\n");
        out.push_str(&format!(
            "{:<6} {:<6} {:<14} {:>12} {:>12} {:>8} {:>8} {:>8} {:>7}\n",
            "Port", "VLAN", "State", "Offset(ns)", "Delay(ns)", "SyncRX", "ReqTX", "RespRX", "Synced"
        ));
        for snapshot in self.snapshot_stats() {
            out.push_str(&format!(
                "{:<6} {:<6} {:<14} {:>12} {:>12} {:>8} {:>8} {:>8} {:>7}\n",
                snapshot.rx_port,
                snapshot.rx_vlan,
                format!("{:?}", snapshot.state),
                snapshot.offset_ns,
                snapshot.delay_ns,
                snapshot.stats.sync_rx_count,
                snapshot.stats.delay_req_tx_count,
                snapshot.stats.delay_resp_rx_count,
                if snapshot.is_synced { "YES" } else { "NO" },
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopFlow;
    impl crate::io::FlowHandle for () {}
    impl FlowApi for NoopFlow {
        type Handle = ();
        fn install_vlan_any(&mut self, _port: u16, _queue: u16) -> Option<()> {
            Some(())
        }
        fn install_vlan_explicit(&mut self, _port: u16, _queue: u16) -> Option<()> {
            Some(())
        }
        fn install_untagged(&mut self, _port: u16, _queue: u16) -> Option<()> {
            Some(())
        }
        fn destroy(&mut self, _port: u16, _handle: ()) {}
    }

    #[test]
    fn configure_session_before_init_is_rejected() {
        let mut ctx = PtpContext::new();
        let err = ctx
            .configure_session(SessionConfig {
                rx_port: 0,
                rx_vlan: 97,
                tx_port: 0,
                tx_vlan: 97,
                tx_vl_idx: 4420,
            })
            .unwrap_err();
        assert_eq!(err, ConfigError::Uninitialized);
    }

    #[test]
    fn configure_session_respects_max_sessions_per_port() {
        let mut ctx = PtpContext::new();
        let mut config = PtpConfig::default();
        config.max_sessions_per_port = 2;
        ctx.init(1_000_000, [0; 6], &config);

        for vlan in [10, 11] {
            ctx.configure_session(SessionConfig {
                rx_port: 0,
                rx_vlan: vlan,
                tx_port: 0,
                tx_vlan: vlan,
                tx_vl_idx: 0,
            })
            .unwrap();
        }

        let err = ctx
            .configure_session(SessionConfig {
                rx_port: 0,
                rx_vlan: 12,
                tx_port: 0,
                tx_vlan: 12,
                tx_vl_idx: 0,
            })
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::TooManySessions {
                port: 0,
                count: 2,
                max: 2
            }
        );
    }

    #[test]
    fn start_installs_flow_rules_and_sets_running() {
        let mut ctx = PtpContext::new();
        ctx.init(1_000_000, [0; 6], &PtpConfig::default());
        ctx.configure_session(SessionConfig {
            rx_port: 3,
            rx_vlan: 97,
            tx_port: 3,
            tx_vlan: 97,
            tx_vl_idx: 4420,
        })
        .unwrap();

        let mut flow = NoopFlow;
        let handles = ctx.start(&mut flow).unwrap();
        assert!(ctx.is_running());
        assert_eq!(handles.len(), 1);

        ctx.stop(&mut flow, handles);
        assert!(!ctx.is_running());
    }

    #[test]
    fn snapshot_and_reset_stats_round_trip() {
        let mut ctx = PtpContext::new();
        ctx.init(1_000_000, [0; 6], &PtpConfig::default());
        ctx.configure_session(SessionConfig {
            rx_port: 0,
            rx_vlan: 97,
            tx_port: 0,
            tx_vlan: 97,
            tx_vl_idx: 4420,
        })
        .unwrap();

        let snapshot = ctx.snapshot_stats();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].rx_vlan, 97);

        ctx.reset_all_stats();
        let snapshot = ctx.snapshot_stats();
        assert_eq!(snapshot[0].stats.sync_rx_count, 0);
    }
}
