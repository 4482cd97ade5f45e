//! PTP (IEEE 1588v2) packet codec: Ethernet+VLAN framing, the common PTP
//! header, timestamps, port identities, Sync/Delay_Resp parsing, and
//! Delay_Req construction.
//!
//! Grounded in `ptp_packet.c`'s `ptp_is_ptp_packet`/`ptp_get_msg_type`/
//! `ptp_get_vlan_id`/`ptp_send_delay_req`, generalized from DPDK mbufs to
//! plain `&[u8]`/`&mut [u8]` per the portability note in spec §9.

use crate::config::PtpConfig;
use crate::error::WireError;

#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

/// EtherType of an 802.1Q VLAN tag.
pub const ETHERTYPE_VLAN: u16 = 0x8100;
/// EtherType carrying PTP event/general messages over L2.
pub const ETHERTYPE_PTP: u16 = 0x88F7;

/// Fixed source MAC stamped on every outbound PTP frame (spec §4.2).
pub const PTP_SRC_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x20];

const ETH_HDR_LEN: usize = 14;
const VLAN_HDR_LEN: usize = 4;
const PTP_HEADER_LEN: usize = 34;
const TIMESTAMP_LEN: usize = 10;
const PORT_IDENTITY_LEN: usize = 10;

const MSG_TYPE_SYNC: u8 = 0x0;
const MSG_TYPE_DELAY_REQ: u8 = 0x1;
const MSG_TYPE_FOLLOW_UP: u8 = 0x8;
const MSG_TYPE_DELAY_RESP: u8 = 0x9;
const MSG_TYPE_ANNOUNCE: u8 = 0xB;
const MSG_TYPE_SIGNALING: u8 = 0xC;

/// PTP message types this slave distinguishes (IEEE 1588-2019 table 35).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub enum MessageType {
    Sync,
    DelayReq,
    FollowUp,
    DelayResp,
    Announce,
    Signaling,
    Other(u8),
}

impl MessageType {
    fn from_nibble(low_nibble: u8) -> Self {
        match low_nibble & 0x0F {
            MSG_TYPE_SYNC => MessageType::Sync,
            MSG_TYPE_DELAY_REQ => MessageType::DelayReq,
            MSG_TYPE_FOLLOW_UP => MessageType::FollowUp,
            MSG_TYPE_DELAY_RESP => MessageType::DelayResp,
            MSG_TYPE_ANNOUNCE => MessageType::Announce,
            MSG_TYPE_SIGNALING => MessageType::Signaling,
            other => MessageType::Other(other),
        }
    }
}

/// 8-byte clock identity + 16-bit port number, network byte order on the
/// wire (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub struct PortIdentity {
    pub clock_identity: [u8; 8],
    pub port_number: u16,
}

impl PortIdentity {
    pub const ZERO: PortIdentity = PortIdentity {
        clock_identity: [0; 8],
        port_number: 0,
    };

    fn read(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < PORT_IDENTITY_LEN {
            return Err(WireError::ShortFrame);
        }
        let mut clock_identity = [0u8; 8];
        clock_identity.copy_from_slice(&buf[0..8]);
        let port_number = u16::from_be_bytes([buf[8], buf[9]]);
        Ok(PortIdentity {
            clock_identity,
            port_number,
        })
    }

    fn write(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.clock_identity);
        buf[8..10].copy_from_slice(&self.port_number.to_be_bytes());
    }
}

/// Internal timestamp representation: unsigned nanoseconds since the
/// configured epoch (Unix epoch in this deployment, spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct Timestamp {
    pub ns_since_epoch: u64,
}

impl Timestamp {
    pub fn new(seconds: u64, nanoseconds: u32) -> Self {
        debug_assert!(nanoseconds < 1_000_000_000, "nanoseconds field out of range");
        Timestamp {
            ns_since_epoch: seconds * 1_000_000_000 + nanoseconds as u64,
        }
    }

    /// `true` if this timestamp is the all-zero sentinel the observed
    /// peer sends in place of a populated Delay_Resp receive timestamp
    /// (spec §4.3 "missing t4").
    pub fn is_zero(&self) -> bool {
        self.ns_since_epoch == 0
    }

    fn read(buf: &[u8], strict_seconds: bool) -> Result<Self, WireError> {
        if buf.len() < TIMESTAMP_LEN {
            return Err(WireError::ShortFrame);
        }
        let seconds_msb = u16::from_be_bytes([buf[0], buf[1]]);
        let seconds_lsb = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        let nanoseconds = u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]);
        let seconds = if strict_seconds {
            ((seconds_msb as u64) << 32) | seconds_lsb as u64
        } else {
            // Interop note (spec §3): the observed peer ignores the top 2
            // bytes of the 48-bit seconds field. Treat them as don't-care.
            seconds_lsb as u64
        };
        Ok(Timestamp {
            ns_since_epoch: seconds * 1_000_000_000 + nanoseconds as u64,
        })
    }

    fn write(&self, buf: &mut [u8]) {
        let seconds = self.ns_since_epoch / 1_000_000_000;
        let nanoseconds = (self.ns_since_epoch % 1_000_000_000) as u32;
        buf[0..2].copy_from_slice(&[0, 0]); // high 2 bytes: zero on transmit
        buf[2..6].copy_from_slice(&(seconds as u32).to_be_bytes());
        buf[6..10].copy_from_slice(&nanoseconds.to_be_bytes());
    }
}

/// Parsed common PTP header (34 bytes, spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpHeader {
    pub message_type: MessageType,
    pub transport_specific: u8,
    pub version: u8,
    pub message_length: u16,
    pub domain_number: u8,
    pub flags: u16,
    pub correction: i64,
    pub source_port_identity: PortIdentity,
    pub sequence_id: u16,
    pub control: u8,
    pub log_message_interval: i8,
}

/// Result of recognizing an Ethernet frame with an optional single
/// 802.1Q tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthVlan {
    pub payload_offset: usize,
    pub vlan_id: Option<u16>,
    pub inner_ethertype: u16,
}

/// Recognize an Ethernet frame, optionally tagged with one 802.1Q VLAN
/// header, and report the inner EtherType and payload offset.
pub fn parse_eth_vlan(buf: &[u8]) -> Result<EthVlan, WireError> {
    if buf.len() < ETH_HDR_LEN {
        return Err(WireError::ShortFrame);
    }
    let ethertype = u16::from_be_bytes([buf[12], buf[13]]);
    if ethertype == ETHERTYPE_VLAN {
        if buf.len() < ETH_HDR_LEN + VLAN_HDR_LEN {
            return Err(WireError::ShortFrame);
        }
        let tci = u16::from_be_bytes([buf[14], buf[15]]);
        let inner_ethertype = u16::from_be_bytes([buf[16], buf[17]]);
        Ok(EthVlan {
            payload_offset: ETH_HDR_LEN + VLAN_HDR_LEN,
            vlan_id: Some(tci & 0x0FFF),
            inner_ethertype,
        })
    } else {
        Ok(EthVlan {
            payload_offset: ETH_HDR_LEN,
            vlan_id: None,
            inner_ethertype: ethertype,
        })
    }
}

/// `true` iff the frame's inner EtherType is the PTP EtherType.
pub fn is_ptp(buf: &[u8]) -> bool {
    matches!(parse_eth_vlan(buf), Ok(ev) if ev.inner_ethertype == ETHERTYPE_PTP)
}

/// Alias matching the original C entry point's name (`ptp_is_ptp_packet`),
/// kept so the worker's dispatch code reads the same way the source does.
pub fn is_ptp_packet(buf: &[u8]) -> bool {
    is_ptp(buf)
}

/// Raw PTP message-type nibble (byte 0, low 4 bits) without a full header
/// parse, mirroring `ptp_get_msg_type`. `None` if the frame isn't PTP.
pub fn msg_type(buf: &[u8]) -> Option<u8> {
    let (payload, _) = ptp_payload(buf).ok()?;
    payload.first().map(|b| b & 0x0F)
}

/// VLAN id of the frame, or 0 if untagged, mirroring `ptp_get_vlan_id`.
pub fn vlan_id(buf: &[u8]) -> u16 {
    parse_eth_vlan(buf)
        .ok()
        .and_then(|ev| ev.vlan_id)
        .unwrap_or(0)
}

fn ptp_payload(buf: &[u8]) -> Result<(&[u8], EthVlan), WireError> {
    let ev = parse_eth_vlan(buf)?;
    if ev.inner_ethertype != ETHERTYPE_PTP {
        return Err(WireError::UnknownEtherType);
    }
    Ok((&buf[ev.payload_offset..], ev))
}

fn parse_header_fields(payload: &[u8]) -> Result<PtpHeader, WireError> {
    if payload.len() < PTP_HEADER_LEN {
        return Err(WireError::ShortFrame);
    }
    let message_type = MessageType::from_nibble(payload[0]);
    let transport_specific = (payload[0] >> 4) & 0x0F;
    let version = payload[1] & 0x0F;
    let message_length = u16::from_be_bytes([payload[2], payload[3]]);
    let domain_number = payload[4];
    let flags = u16::from_be_bytes([payload[6], payload[7]]);
    let correction = i64::from_be_bytes(payload[8..16].try_into().unwrap());
    let source_port_identity = PortIdentity::read(&payload[20..30])?;
    let sequence_id = u16::from_be_bytes([payload[30], payload[31]]);
    let control = payload[32];
    let log_message_interval = payload[33] as i8;
    Ok(PtpHeader {
        message_type,
        transport_specific,
        version,
        message_length,
        domain_number,
        flags,
        correction,
        source_port_identity,
        sequence_id,
        control,
        log_message_interval,
    })
}

/// Parse the 34-byte common PTP header out of a full Ethernet frame.
pub fn parse_ptp_header(buf: &[u8]) -> Result<PtpHeader, WireError> {
    let (payload, _) = ptp_payload(buf)?;
    parse_header_fields(payload)
}

/// Parse a Sync message: header plus its 10-byte origin timestamp.
pub fn parse_sync(buf: &[u8]) -> Result<(PtpHeader, Timestamp), WireError> {
    let (payload, _) = ptp_payload(buf)?;
    let header = parse_header_fields(payload)?;
    if !matches!(header.message_type, MessageType::Sync) {
        return Err(WireError::UnknownMessageType);
    }
    if payload.len() < PTP_HEADER_LEN + TIMESTAMP_LEN {
        return Err(WireError::ShortFrame);
    }
    let ts = Timestamp::read(&payload[PTP_HEADER_LEN..PTP_HEADER_LEN + TIMESTAMP_LEN], false)?;
    Ok((header, ts))
}

/// Parse a Delay_Resp message: header, 10-byte receive timestamp, and
/// the (unverified — spec §4.3) requesting port identity.
pub fn parse_delay_resp(buf: &[u8]) -> Result<(PtpHeader, Timestamp, PortIdentity), WireError> {
    let (payload, _) = ptp_payload(buf)?;
    let header = parse_header_fields(payload)?;
    if !matches!(header.message_type, MessageType::DelayResp) {
        return Err(WireError::UnknownMessageType);
    }
    let ts_end = PTP_HEADER_LEN + TIMESTAMP_LEN;
    let port_end = ts_end + PORT_IDENTITY_LEN;
    if payload.len() < port_end {
        return Err(WireError::ShortFrame);
    }
    let ts = Timestamp::read(&payload[PTP_HEADER_LEN..ts_end], false)?;
    let requesting_port_id = PortIdentity::read(&payload[ts_end..port_end])?;
    Ok((header, ts, requesting_port_id))
}

/// Build an outbound Delay_Req frame (Ethernet + single VLAN tag + PTP
/// payload padded to `config.delay_req_pad_len` bytes, spec §4.2/§9).
///
/// `sequence_id` is the value to stamp on the wire — callers pass the
/// session's next-to-send id, not yet the "last sent" bookkeeping value.
pub fn build_delay_req(
    tx_vlan: u16,
    tx_vl_idx: u16,
    sequence_id: u16,
    source_port_identity: &PortIdentity,
    config: &PtpConfig,
) -> Vec<u8> {
    let total_len = ETH_HDR_LEN + VLAN_HDR_LEN + config.delay_req_pad_len;
    let mut frame = vec![0u8; total_len];

    // Dst MAC: 03:00:00:00:VH:VL (VL-IDX in the last two bytes, big-endian).
    frame[0] = 0x03;
    frame[4] = (tx_vl_idx >> 8) as u8;
    frame[5] = (tx_vl_idx & 0xFF) as u8;
    frame[6..12].copy_from_slice(&PTP_SRC_MAC);
    frame[12..14].copy_from_slice(&ETHERTYPE_VLAN.to_be_bytes());

    frame[14..16].copy_from_slice(&(tx_vlan & 0x0FFF).to_be_bytes());
    frame[16..18].copy_from_slice(&ETHERTYPE_PTP.to_be_bytes());

    let ptp = &mut frame[18..];
    ptp[0] = MSG_TYPE_DELAY_REQ; // transport_specific = 0 (Layer 2)
    ptp[1] = 2; // versionPTP
    ptp[2..4].copy_from_slice(&(config.delay_req_pad_len as u16).to_be_bytes());
    ptp[4] = config.domain;
    ptp[6..8].copy_from_slice(&config.delay_req_flags.to_be_bytes());
    // correction (8..16) and the reserved word (16..20) stay zero.
    source_port_identity.write(&mut ptp[20..30]);
    ptp[30..32].copy_from_slice(&sequence_id.to_be_bytes());
    ptp[32] = 1; // controlField: Delay_Req
    ptp[33] = 0xFFu8; // logMessageInterval = -1
    // Origin timestamp (34..44): left zeroed, the slave uses a software TX
    // timestamp recorded out of band (spec §4.2).

    frame
}
