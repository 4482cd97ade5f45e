//! Crate-wide error types.
//!
//! Each concern gets its own `thiserror` enum rather than one catch-all,
//! so callers can match on the kind that actually matters to them. None
//! of these appear on the worker hot path — parse-time failures there are
//! handled as counters, not `Result::Err` (see `wire::ptp`).

use thiserror::Error;

/// Wire codec parse errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    #[error("frame too short for the field being read")]
    ShortFrame,
    #[error("unrecognized EtherType")]
    UnknownEtherType,
    #[error("unrecognized PTP message type")]
    UnknownMessageType,
}

/// Configuration-time errors, returned only to the caller wiring up a
/// `PTPContext` — never produced on the worker hot path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port id: {0}")]
    InvalidPort(u16),
    #[error("port {port} already has {count} sessions (max {max})")]
    TooManySessions { port: u16, count: usize, max: usize },
    #[error("PTP context not initialized")]
    Uninitialized,
}

/// Health-engine classification and decode errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthError {
    #[error("response frame length {0} does not match any known classification")]
    UnclassifiedLength(usize),
    #[error("continuation frame arrived before any full FPGA header frame")]
    NoFpgaIdentified,
    #[error("frame too short to decode")]
    ShortFrame,
    #[error("unrecognized FPGA status_enable byte: 0x{0:02X}")]
    UnknownDeviceIdentity(u8),
}
