//! PTP (IEEE 1588v2) software slave clock and device health-monitor
//! query/response engine.
//!
//! The two subsystems share one crate because they share a design
//! discipline (per-port/per-device worker loops, byte-exact wire
//! framing, mutex-guarded statistics snapshots) but not runtime state:
//! [`ptp`] synchronizes this host's clock to a master switch, [`health`]
//! polls a separate hardware device for telemetry. Neither depends on
//! the other.
//!
//! Packet I/O, flow-rule control, and raw sockets are external
//! collaborators this crate only depends on through the trait seams in
//! [`io`]; see that module's docs for the boundary.

pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod io;
pub mod ptp;
pub mod time;
pub mod wire;

pub use config::{HealthConfig, PtpConfig};
pub use domain::session::{Session, SessionState, SessionStats};
pub use error::{ConfigError, HealthError, WireError};
pub use ptp::context::PtpContext;
pub use time::TimeSource;
