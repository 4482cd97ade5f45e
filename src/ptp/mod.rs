//! PTP slave runtime: the per-port worker loop, flow-rule installation,
//! and the context that owns sessions and spawns worker threads.

pub mod context;
pub mod flow;
pub mod worker;

pub use context::PtpContext;
pub use worker::PtpWorker;

/// Receive queue PTP traffic is steered into by the installed flow rule
/// (grounded in `ptp_worker.c`'s fixed `PTP_RX_QUEUE_ID`).
pub const PTP_RX_QUEUE_ID: u16 = 5;
/// Transmit queue Delay_Req frames are sent on.
pub const PTP_TX_QUEUE_ID: u16 = 0;
