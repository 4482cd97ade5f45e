//! Aligned per-cycle health report rendering (spec §4.7 step 6).
//!
//! Styled after `ptp_print_stats`'s fixed-width `printf` table in
//! `ptp_worker.c`: plain `format!` columns, no CLI styling crate — this
//! crate has no CLI surface to style for (spec §6 "no CLI ... belongs
//! to the core").

use chrono::{DateTime, Utc};

use crate::health::cycle::{FpgaAccumulator, HealthCycle};
use crate::wire::health::DeviceIdentity;

fn format_time_of_day(seconds: u64, nanoseconds: u32) -> String {
    match DateTime::<Utc>::from_timestamp(seconds as i64, nanoseconds) {
        Some(ts) => ts.to_rfc3339(),
        None => format!("{seconds}.{nanoseconds:09}s (unrepresentable)"),
    }
}

fn render_fpga(name: &str, acc: &FpgaAccumulator) -> String {
    let mut out = format!("--- {name} ---\n");
    match &acc.device {
        Some(device) => {
            out.push_str(&format!(
                "heartbeat={heartbeat} tx={tx} rx={rx} errors={errors} voltage={voltage:.3}V temp={temp:.2}C fw={maj}.{min} cfg_id=0x{cfg:08X} time={time}\n",
                heartbeat = device.heartbeat,
                tx = device.total_tx_count,
                rx = device.total_rx_count,
                errors = device.total_error_count,
                voltage = device.voltage_volts,
                temp = device.temperature_celsius,
                maj = device.fw_version_major,
                min = device.fw_version_minor,
                cfg = device.configuration_id,
                time = format_time_of_day(device.time_of_day_seconds, device.time_of_day_nanoseconds),
            ));
        }
        None => out.push_str("(no device header received this cycle)\n"),
    }
    out.push_str(&format!(
        "{:<6} {:<6} {:>10} {:>10} {:>10} {:>8} {:>8}\n",
        "Port", "Link", "TX", "RX", "Errors", "CRC", "Drop"
    ));
    for port in &acc.ports {
        out.push_str(&format!(
            "{:<6} {:<6} {:>10} {:>10} {:>10} {:>8} {:>8}\n",
            port.port_index,
            if port.link_up { "UP" } else { "DOWN" },
            port.tx_count,
            port.rx_count,
            port.error_count,
            port.crc_error_count,
            port.drop_count,
        ));
    }
    out
}

/// Render one cycle: an ASSISTANT table, a MANAGER table, the MCU line,
/// and a response-count summary (spec §4.7 step 6, §8 scenario 6).
pub fn render(cycle: &HealthCycle) -> String {
    let mut out = String::new();
    out.push_str(&render_fpga("ASSISTANT", &cycle.assistant));
    out.push_str(&render_fpga("MANAGER", &cycle.manager));

    match &cycle.mcu {
        Some(mcu) => out.push_str(&format!(
            "--- MCU ---\nfw=0x{fw:04X} status=0x{status:08X} voltages={v:?} currents={i:?} temps={t:?} transceiver_temp={xt:.2}C\n",
            fw = mcu.fw_version,
            status = mcu.component_status,
            v = mcu.voltage_volts,
            i = mcu.current_amps,
            t = mcu.temperature_celsius,
            xt = mcu.transceiver_temperature_celsius,
        )),
        None => out.push_str("--- MCU ---\n(no MCU frame received this cycle)\n"),
    }

    out.push_str(&format!(
        "responses_received={} (expected 6)\n",
        cycle.responses_received
    ));
    out
}

/// `true` iff `identity`'s accumulator in `cycle` received at least one
/// device header this cycle — used by callers deciding whether to treat
/// a missing FPGA as a fault.
pub fn has_device_header(cycle: &HealthCycle, identity: DeviceIdentity) -> bool {
    match identity {
        DeviceIdentity::Assistant => cycle.assistant.device.is_some(),
        DeviceIdentity::Manager => cycle.manager.device.is_some(),
    }
}
