//! External collaborator seams.
//!
//! Packet I/O, flow-rule installation, and the health engine's raw
//! socket are all provided by the host process. This crate only depends
//! on the trait surface; DMA-based packet frameworks, raw L2 sockets,
//! and the flow API itself live outside this crate (spec §1, §6).

use crate::error::WireError;

/// A single packet buffer. The core writes payload bytes, sets `l2_len`,
/// and may request a VLAN-insert offload hint; it never allocates or
/// frees the backing memory itself.
pub trait PacketBuffer {
    /// Mutable access to the raw frame bytes.
    fn payload_mut(&mut self) -> &mut [u8];
    /// Read-only access to the raw frame bytes.
    fn payload(&self) -> &[u8];
    /// Number of valid bytes currently in the buffer.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Grow the buffer to `len` bytes, zero-filling new bytes. Returns
    /// `Err(WireError::ShortFrame)` if the backing allocation is too
    /// small to hold `len` bytes.
    fn set_len(&mut self, len: usize) -> Result<(), WireError>;
    /// Record the Ethernet+VLAN header length, for offload bookkeeping.
    fn set_l2_len(&mut self, l2_len: u16);
    /// Ask the NIC to insert a VLAN TCI equal to `vlan_id` on transmit,
    /// instead of the tag already present in the payload bytes.
    fn request_vlan_insert(&mut self, vlan_id: u16);
}

/// Packet receive/transmit burst interface for one port+queue pair.
pub trait PacketIo {
    type Buffer: PacketBuffer;

    /// Poll up to `max` frames from `port`'s `queue`. Returns the frames
    /// actually received (may be fewer than `max`, including zero).
    fn rx_burst(&mut self, port: u16, queue: u16, max: usize) -> Vec<Self::Buffer>;

    /// Submit `buffers` for transmission on `port`'s `queue`. Returns the
    /// number actually accepted by the NIC (the rest are the caller's to
    /// release).
    fn tx_burst(&mut self, port: u16, queue: u16, buffers: Vec<Self::Buffer>) -> usize;

    /// Allocate an empty transmit buffer from the port's pool. `None`
    /// signals pool exhaustion (a resource error per spec §7).
    fn alloc_frame(&mut self, port: u16) -> Option<Self::Buffer>;

    /// Return a buffer to its pool.
    fn release(&mut self, buffer: Self::Buffer);

    /// Informational MAC of a local port, used only for diagnostics —
    /// the slave's wire identity is a fixed configured value (spec §3).
    fn port_mac(&self, port: u16) -> [u8; 6];
}

/// A flow-steering rule handle, opaque to this crate.
pub trait FlowHandle {}

/// Flow-rule control plane: install-and-validate, or destroy.
pub trait FlowApi {
    type Handle: FlowHandle;

    /// Attempt to install a rule matching VLAN-tagged PTP traffic (any
    /// VID) into `queue` on `port`.
    fn install_vlan_any(&mut self, port: u16, queue: u16) -> Option<Self::Handle>;

    /// Attempt to install a rule matching outer EtherType 0x8100 plus
    /// inner PTP EtherType into `queue` on `port`.
    fn install_vlan_explicit(&mut self, port: u16, queue: u16) -> Option<Self::Handle>;

    /// Attempt to install a rule matching untagged PTP EtherType frames
    /// into `queue` on `port`.
    fn install_untagged(&mut self, port: u16, queue: u16) -> Option<Self::Handle>;

    /// Destroy a previously installed rule.
    fn destroy(&mut self, port: u16, handle: Self::Handle);
}

/// Raw L2 socket used by the health query engine: bind to one interface,
/// promiscuous, send a query template, and receive with a deadline.
pub trait RawSocket {
    /// Send `frame` out the bound interface.
    fn send(&mut self, frame: &[u8]) -> std::io::Result<()>;

    /// Receive one frame, blocking up to `deadline` from now. Returns
    /// `Ok(None)` on timeout, `Ok(Some(frame))` on a received frame.
    fn recv_until(&mut self, deadline: std::time::Instant) -> std::io::Result<Option<Vec<u8>>>;
}
