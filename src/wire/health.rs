//! Health-monitor telemetry frame decoder.
//!
//! The monitored devices are two FPGAs ("ASSISTANT" and "MANAGER") and one
//! MCU, each answering a broadcast query with one or more fixed-length
//! frames. Frame length alone determines how a frame is decoded (spec
//! §4.7); there is no message-type byte the way there is in `wire::ptp`.
//!
//! The original implementation never defined this layout in code (its
//! health-monitor sources are empty stubs) — the offsets below are this
//! crate's own byte-for-byte scheme, built to satisfy the frame-length
//! constants and decoded values spec §4.7/§8 state, and recorded in
//! DESIGN.md.

use crate::error::HealthError;

#[cfg(feature = "json")]
use serde::Serialize;

/// Full device header + 8 port blocks.
pub const FULL_FRAME_LEN: usize = 1187;
/// Continuation frame carrying 8 more port blocks, no device header.
pub const CONTINUATION_8PORT_LEN: usize = 1083;
/// Continuation frame carrying the last 3 port blocks.
pub const CONTINUATION_3PORT_LEN: usize = 438;

const DEVICE_HEADER_LEN: usize = 155;
const CONTINUATION_HEADER_LEN: usize = 51;
const PORT_BLOCK_LEN: usize = 129;

const STATUS_ASSISTANT: u8 = 0x03;
const STATUS_MANAGER: u8 = 0x01;

/// Which FPGA personality a device header/continuation frame belongs to,
/// decoded from the `status_enable` byte (spec §4.7 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub enum DeviceIdentity {
    Assistant,
    Manager,
}

impl DeviceIdentity {
    fn from_status_byte(byte: u8) -> Result<Self, HealthError> {
        match byte {
            STATUS_ASSISTANT => Ok(DeviceIdentity::Assistant),
            STATUS_MANAGER => Ok(DeviceIdentity::Manager),
            other => Err(HealthError::UnknownDeviceIdentity(other)),
        }
    }
}

/// Decoded FPGA device header (the first 155 bytes of a full frame).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct HealthDeviceFrame {
    pub identity: DeviceIdentity,
    pub operation_code: u8,
    pub configuration_code: u8,
    pub total_tx_count: u64,
    pub total_rx_count: u64,
    pub total_error_count: u64,
    pub heartbeat: u64,
    pub rail_status: [u8; 8],
    pub fw_version_major: u32,
    pub fw_version_minor: u32,
    pub fifo_tx_size: u32,
    pub fifo_rx_size: u32,
    pub time_of_day_seconds: u64,
    pub time_of_day_nanoseconds: u32,
    pub voltage_volts: f64,
    pub temperature_celsius: f64,
    pub configuration_id: u32,
}

/// Decoded per-port statistics block (129 bytes).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct HealthPortFrame {
    pub port_index: u8,
    pub link_up: bool,
    pub tx_count: u64,
    pub rx_count: u64,
    pub error_count: u64,
    pub crc_error_count: u32,
    pub drop_count: u32,
}

/// Decoded MCU telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct HealthMcuFrame {
    pub fw_version: u16,
    pub component_status: u32,
    pub voltage_volts: [f64; 3],
    pub current_amps: [f64; 3],
    pub temperature_celsius: [f64; 2],
    pub transceiver_temperature_celsius: f64,
}

/// Named byte offsets for the MCU frame, exposed so callers can validate
/// raw captures against this crate's layout (spec §9: "named constants,
/// not magic numbers"). `MCU_MIN_LEN` is the deployment-observed boundary:
/// any response at least this long is classified as an MCU frame.
pub mod mcu_offsets {
    pub const FW_VERSION: usize = 0;
    pub const COMPONENT_STATUS: usize = 2;
    pub const VOLTAGE: [usize; 3] = [6, 8, 10];
    pub const CURRENT: [usize; 3] = [12, 14, 16];
    pub const TEMPERATURE: [usize; 2] = [18, 20];
    pub const FO_TRANSCEIVER_TEMPERATURE: usize = 66;
    pub const MCU_MIN_LEN: usize = FO_TRANSCEIVER_TEMPERATURE + 2;
}

use mcu_offsets::MCU_MIN_LEN;

/// A classified health-monitor response frame (spec §4.7 step 3).
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    FullDevice(HealthDeviceFrame, [HealthPortFrame; 8]),
    Continuation8([HealthPortFrame; 8]),
    Continuation3([HealthPortFrame; 3]),
    Mcu(HealthMcuFrame),
}

fn read_u48(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[2..8].copy_from_slice(&buf[0..6]);
    u64::from_be_bytes(bytes)
}

fn decode_fpga_voltage(raw: u16) -> f64 {
    let whole = ((raw >> 3) & 0xFFF) as f64;
    let frac = (raw & 0x7) as f64 / 10.0;
    (whole + frac) / 1000.0
}

fn decode_fpga_temperature_celsius(raw: u16) -> f64 {
    let whole = ((raw >> 4) & 0xFFF) as f64;
    let frac_digit = (raw & 0xF) as f64;
    let frac_divisor = if (raw & 0xF) >= 10 { 100.0 } else { 10.0 };
    whole + frac_digit / frac_divisor - 273.15
}

fn decode_mcu_voltage(raw: u16) -> f64 {
    raw as f64 / 1000.0
}

fn decode_mcu_current(raw: u16) -> f64 {
    raw as f64 / 1000.0
}

fn decode_mcu_temperature(raw: u16) -> f64 {
    raw as f64 / 100.0
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
}

/// Parse the 155-byte device header at the start of a full-device frame.
pub fn parse_device_header(buf: &[u8]) -> Result<HealthDeviceFrame, HealthError> {
    if buf.len() < DEVICE_HEADER_LEN {
        return Err(HealthError::ShortFrame);
    }
    let identity = DeviceIdentity::from_status_byte(buf[6])?;
    let voltage_raw = read_u16(buf, 66);
    let temperature_raw = read_u16(buf, 68);
    Ok(HealthDeviceFrame {
        identity,
        operation_code: buf[4],
        configuration_code: buf[5],
        total_tx_count: read_u48(&buf[7..13]),
        total_rx_count: read_u48(&buf[13..19]),
        total_error_count: read_u48(&buf[19..25]),
        heartbeat: u64::from_be_bytes(buf[25..33].try_into().unwrap()),
        rail_status: buf[33..41].try_into().unwrap(),
        fw_version_major: read_u32(buf, 41),
        fw_version_minor: read_u32(buf, 45),
        fifo_tx_size: read_u32(buf, 49),
        fifo_rx_size: read_u32(buf, 53),
        time_of_day_seconds: 0, // filled in by fix_time_of_day below
        time_of_day_nanoseconds: read_u32(buf, 62),
        voltage_volts: decode_fpga_voltage(voltage_raw),
        temperature_celsius: decode_fpga_temperature_celsius(temperature_raw),
        configuration_id: read_u32(buf, 70),
    }
    .fix_time_of_day(buf))
}

impl HealthDeviceFrame {
    fn fix_time_of_day(mut self, buf: &[u8]) -> Self {
        // 40-bit seconds field at bytes 57..62.
        let mut bytes = [0u8; 8];
        bytes[3..8].copy_from_slice(&buf[57..62]);
        self.time_of_day_seconds = u64::from_be_bytes(bytes);
        self
    }
}

/// Parse one 129-byte port statistics block.
pub fn parse_port_block(buf: &[u8]) -> Result<HealthPortFrame, HealthError> {
    if buf.len() < PORT_BLOCK_LEN {
        return Err(HealthError::ShortFrame);
    }
    Ok(HealthPortFrame {
        port_index: buf[0],
        link_up: buf[1] != 0,
        tx_count: read_u48(&buf[2..8]),
        rx_count: read_u48(&buf[8..14]),
        error_count: read_u48(&buf[14..20]),
        crc_error_count: read_u32(buf, 20),
        drop_count: read_u32(buf, 24),
    })
}

/// Parse a standalone MCU telemetry frame.
pub fn parse_mcu(buf: &[u8]) -> Result<HealthMcuFrame, HealthError> {
    if buf.len() < MCU_MIN_LEN {
        return Err(HealthError::ShortFrame);
    }
    Ok(HealthMcuFrame {
        fw_version: read_u16(buf, mcu_offsets::FW_VERSION),
        component_status: read_u32(buf, mcu_offsets::COMPONENT_STATUS),
        voltage_volts: [
            decode_mcu_voltage(read_u16(buf, mcu_offsets::VOLTAGE[0])),
            decode_mcu_voltage(read_u16(buf, mcu_offsets::VOLTAGE[1])),
            decode_mcu_voltage(read_u16(buf, mcu_offsets::VOLTAGE[2])),
        ],
        current_amps: [
            decode_mcu_current(read_u16(buf, mcu_offsets::CURRENT[0])),
            decode_mcu_current(read_u16(buf, mcu_offsets::CURRENT[1])),
            decode_mcu_current(read_u16(buf, mcu_offsets::CURRENT[2])),
        ],
        temperature_celsius: [
            decode_mcu_temperature(read_u16(buf, mcu_offsets::TEMPERATURE[0])),
            decode_mcu_temperature(read_u16(buf, mcu_offsets::TEMPERATURE[1])),
        ],
        transceiver_temperature_celsius: decode_mcu_temperature(read_u16(
            buf,
            mcu_offsets::FO_TRANSCEIVER_TEMPERATURE,
        )),
    })
}

fn parse_port_blocks<const N: usize>(buf: &[u8], header_len: usize) -> Result<[HealthPortFrame; N], HealthError> {
    let mut out = [HealthPortFrame {
        port_index: 0,
        link_up: false,
        tx_count: 0,
        rx_count: 0,
        error_count: 0,
        crc_error_count: 0,
        drop_count: 0,
    }; N];
    for (i, slot) in out.iter_mut().enumerate() {
        let start = header_len + i * PORT_BLOCK_LEN;
        *slot = parse_port_block(&buf[start..start + PORT_BLOCK_LEN])?;
    }
    Ok(out)
}

/// Classify a response frame purely by its length and decode it (spec
/// §4.7 step 3/4).
pub fn classify(buf: &[u8]) -> Result<FrameKind, HealthError> {
    match buf.len() {
        FULL_FRAME_LEN => {
            let header = parse_device_header(buf)?;
            let ports = parse_port_blocks::<8>(buf, DEVICE_HEADER_LEN)?;
            Ok(FrameKind::FullDevice(header, ports))
        }
        CONTINUATION_8PORT_LEN => {
            let ports = parse_port_blocks::<8>(buf, CONTINUATION_HEADER_LEN)?;
            Ok(FrameKind::Continuation8(ports))
        }
        CONTINUATION_3PORT_LEN => {
            let ports = parse_port_blocks::<3>(buf, CONTINUATION_HEADER_LEN)?;
            Ok(FrameKind::Continuation3(ports))
        }
        len if len >= MCU_MIN_LEN => Ok(FrameKind::Mcu(parse_mcu(buf)?)),
        len => Err(HealthError::UnclassifiedLength(len)),
    }
}
