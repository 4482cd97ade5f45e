//! Periodic query/response cycle driver (spec §4.7).
//!
//! Single-threaded: one raw socket, one outbound template, up to six
//! inbound frames per cycle, classified and fed into a fresh
//! [`HealthCycle`] each time. Grounded in the query/response shape
//! implied by spec §4.7 and §6 — `health_monitor.c`/`.h` in
//! `original_source/` are stubs with no cycle logic to carry forward.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::config::HealthConfig;
use crate::health::cycle::HealthCycle;
use crate::health::report;
use crate::io::RawSocket;
use crate::wire::health::classify;

/// Owns the raw socket and outbound template; runs one cycle at a time.
pub struct HealthQueryEngine<S: RawSocket> {
    socket: S,
    config: HealthConfig,
    sequence: u8,
    cycle_timeout_count: u64,
    cycles_run: u64,
}

impl<S: RawSocket> HealthQueryEngine<S> {
    pub fn new(socket: S, config: HealthConfig) -> Self {
        Self {
            socket,
            config,
            sequence: 1,
            cycle_timeout_count: 0,
            cycles_run: 0,
        }
    }

    pub fn cycle_timeout_count(&self) -> u64 {
        self.cycle_timeout_count
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    /// Run cycles back to back until `running` clears, sleeping so each
    /// cycle's wall-clock length is `query_interval` (spec §4.7 step 7).
    pub fn run(&mut self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            let (cycle, _report) = self.run_cycle();
            debug!(
                responses = cycle.responses_received,
                timeouts = self.cycle_timeout_count,
                "health cycle complete"
            );
            let elapsed = cycle_start.elapsed();
            if elapsed < self.config.query_interval {
                std::thread::sleep(self.config.query_interval - elapsed);
            }
        }
    }

    /// Run exactly one query/collect/classify/report cycle (spec §4.7
    /// steps 1-6). Exposed separately from [`Self::run`] so a test or a
    /// host-driven scheduler can step cycles one at a time.
    #[instrument(skip(self))]
    pub fn run_cycle(&mut self) -> (HealthCycle, String) {
        let query = self.stamp_and_build_query();
        if let Err(err) = self.socket.send(&query) {
            warn!(error = %err, "health query send failed");
        }

        let deadline = Instant::now() + self.config.response_timeout;
        let mut cycle = HealthCycle::new();

        while cycle.responses_received < self.config.responses_per_cycle {
            if Instant::now() >= deadline {
                break;
            }
            match self.socket.recv_until(deadline) {
                Ok(Some(frame)) => {
                    if !Self::is_health_response(&frame, &self.config) {
                        continue;
                    }
                    match classify(&frame) {
                        Ok(kind) => {
                            if let Err(err) = cycle.accept(kind) {
                                debug!(error = %err, "health frame discarded");
                            }
                        }
                        Err(err) => debug!(error = %err, "health frame classification failed"),
                    }
                }
                Ok(None) => break, // deadline reached mid-recv
                Err(err) => {
                    warn!(error = %err, "health socket recv failed");
                    break;
                }
            }
        }

        if cycle.responses_received < self.config.responses_per_cycle {
            self.cycle_timeout_count += 1;
        }
        self.cycles_run += 1;

        let report = report::render(&cycle);
        (cycle, report)
    }

    /// Stamp the current sequence value into the fixed template (spec
    /// §4.7 step 1) and advance it, wrapping 1..255 and skipping zero
    /// (the health-engine's own wrap rule — distinct from the PTP
    /// Delay_Req sequence, see SPEC_FULL.md §9 / DESIGN.md).
    fn stamp_and_build_query(&mut self) -> [u8; 64] {
        self.config.query_template[63] = self.sequence;
        let query = self.config.query_template;
        self.sequence = if self.sequence >= 255 { 1 } else { self.sequence + 1 };
        query
    }

    /// Spec §6 inbound filter: destination MAC bytes [4..6] must equal
    /// the configured sentinel.
    fn is_health_response(frame: &[u8], config: &HealthConfig) -> bool {
        frame.len() > 5
            && frame[4] == config.dest_mac_sentinel[0]
            && frame[5] == config.dest_mac_sentinel[1]
    }
}
