//! Per-cycle accumulation of classified health-monitor response frames.
//!
//! The original sources never implemented this layer (`health_monitor.c`
//! is a 12-line stub) — `HealthCycle` is this crate's own accounting
//! structure, built to satisfy spec §3's `HealthCycle` data model and
//! the classification/attribution invariant in spec §4.7/§8: a
//! continuation frame must never be attributed without a preceding
//! full-device frame.

use crate::error::HealthError;
use crate::wire::health::{DeviceIdentity, FrameKind, HealthDeviceFrame, HealthMcuFrame, HealthPortFrame};

#[cfg(feature = "json")]
use serde::Serialize;

/// One FPGA personality's accumulated device header and port blocks
/// across a cycle's full-device frame plus any continuation frames.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct FpgaAccumulator {
    pub device: Option<HealthDeviceFrame>,
    pub ports: Vec<HealthPortFrame>,
}

impl FpgaAccumulator {
    pub fn port_count_received(&self) -> usize {
        self.ports.len()
    }
}

/// Two FPGA accumulators (ASSISTANT and MANAGER) and one MCU record,
/// plus the "last FPGA identified" marker that routes continuation
/// frames to the right accumulator (spec §3 `HealthCycle`).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct HealthCycle {
    pub assistant: FpgaAccumulator,
    pub manager: FpgaAccumulator,
    pub mcu: Option<HealthMcuFrame>,
    last_fpga_identified: Option<DeviceIdentity>,
    pub responses_received: usize,
}

impl HealthCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one classified response frame into the cycle (spec §4.7
    /// steps 3-5). A continuation frame arriving before any full-device
    /// frame is rejected without mutating the cycle (spec §8 boundary
    /// case) — the caller is expected to log and discard it.
    pub fn accept(&mut self, kind: FrameKind) -> Result<(), HealthError> {
        match kind {
            FrameKind::FullDevice(device, ports) => {
                self.last_fpga_identified = Some(device.identity);
                let accumulator = self.accumulator_mut(device.identity);
                accumulator.device = Some(device);
                accumulator.ports.extend(ports);
            }
            FrameKind::Continuation8(ports) => {
                let identity = self.last_fpga_identified.ok_or(HealthError::NoFpgaIdentified)?;
                self.accumulator_mut(identity).ports.extend(ports);
            }
            FrameKind::Continuation3(ports) => {
                let identity = self.last_fpga_identified.ok_or(HealthError::NoFpgaIdentified)?;
                self.accumulator_mut(identity).ports.extend(ports);
            }
            FrameKind::Mcu(mcu) => {
                self.mcu = Some(mcu);
            }
        }
        self.responses_received += 1;
        Ok(())
    }

    fn accumulator_mut(&mut self, identity: DeviceIdentity) -> &mut FpgaAccumulator {
        match identity {
            DeviceIdentity::Assistant => &mut self.assistant,
            DeviceIdentity::Manager => &mut self.manager,
        }
    }

    pub fn mcu_valid(&self) -> bool {
        self.mcu.is_some()
    }
}
