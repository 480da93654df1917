//! RX dispatcher. Filters incoming frames, mutates the CAN status and the
//! configuration record, and answers commands. Every handler is idempotent
//! with respect to the state it overwrites.

use shared::wbo_hal::{CanFrame, CanTransport, HeaterAllow, SystemController};
use shared::wideband_can::{
    wb_msg_header, WB_BL_ENTER, WB_BL_HEADER, WB_MSG_ECU_STATUS, WB_MSG_SET_INDEX,
};

use super::{internal, linkecu, no_frames, CanStatus, TxFrames};
use crate::config::{ConfigStore, Configuration};
use crate::silprintln;

const ACK_TX_TIMEOUT_MS: u32 = 100;

/// Time to let the ack drain out of the transmit mailbox before the reset
/// vector is taken.
const REBOOT_FLUSH_DELAY_MS: u32 = 50;

pub struct RxDisposition {
    pub acks: TxFrames,
    pub save_config: bool,
    pub reboot_to_bootloader: bool,
}

impl RxDisposition {
    fn none() -> Self {
        Self {
            acks: no_frames(),
            save_config: false,
            reboot_to_bootloader: false,
        }
    }
}

/// Pure dispatch: applies the frame to `config`/`status` and reports what
/// the caller still has to do (send acks, persist, reboot).
pub fn process_frame(
    frame: &CanFrame,
    config: &mut Configuration,
    status: &mut CanStatus,
) -> RxDisposition {
    let mut disposition = RxDisposition::none();

    // Both inbound protocols use extended identifiers only
    if !frame.extended {
        return disposition;
    }

    if wb_msg_header(frame.id) == WB_BL_HEADER {
        process_internal(frame, config, status, &mut disposition);
    } else {
        process_link(frame, config, status, &mut disposition);
    }

    disposition
}

fn process_internal(
    frame: &CanFrame,
    config: &mut Configuration,
    status: &mut CanStatus,
    disposition: &mut RxDisposition,
) {
    if frame.dlc >= 2 && frame.id == WB_MSG_ECU_STATUS {
        // Heater enable bit
        status.heater_allow = if frame.data[1] & 0x01 != 0 {
            HeaterAllow::Allowed
        } else {
            HeaterAllow::NotAllowed
        };

        // Battery voltage in tenths of a volt; a bogus reading defaults to
        // a nominal 14 V
        let vbatt = frame.data[0] as f32 * 0.1;
        status.remote_battery_v = if vbatt < 5.0 { 14.0 } else { vbatt };

        if frame.dlc >= 3 {
            // Pump controller gain in percent
            let gain = frame.data[2] as f32 * 0.01;
            status.pump_gain_adjust = gain.clamp(0.0, 1.0);
        }
    } else if (frame.dlc == 0 || frame.dlc == 1) && frame.id == WB_BL_ENTER {
        // 0xFF forces every device on the bus into the bootloader,
        // otherwise only the one owning the index
        if frame.dlc == 0 || frame.data[0] == 0xFF || frame.data[0] == config.afr[0].rusefi_idx {
            silprintln!("can: bootloader entry requested");
            disposition.acks[0] = Some(internal::ack_frame());
            disposition.reboot_to_bootloader = true;
        }
    } else if frame.dlc == 1 && frame.id == WB_MSG_SET_INDEX {
        config.set_rusefi_indices(frame.data[0]);
        disposition.save_config = true;
        disposition.acks[0] = Some(internal::ack_frame());
    }
}

fn process_link(
    frame: &CanFrame,
    config: &mut Configuration,
    status: &mut CanStatus,
    disposition: &mut RxDisposition,
) {
    if let Some(allowed) = linkecu::process_status_frame(frame) {
        status.heater_allow = if allowed {
            HeaterAllow::Allowed
        } else {
            HeaterAllow::NotAllowed
        };
        return;
    }

    let outcome = linkecu::process_set_index_frame(frame, config);
    if outcome.config_changed {
        disposition.save_config = true;
        disposition.acks[0] = outcome.ack;
    }
}

/// One pass of the RX thread: block for a frame, process it, then carry
/// out the side effects. Returns `false` when the receive timed out.
pub fn service_one_frame(
    can: &mut dyn CanTransport,
    store: &mut ConfigStore,
    status: &mut CanStatus,
    system: &mut dyn SystemController,
    timeout_ms: Option<u32>,
) -> bool {
    let Some(frame) = can.receive(timeout_ms) else {
        return false;
    };

    let disposition = process_frame(&frame, store.config_mut(), status);

    if disposition.save_config {
        // A failed save leaves the old record; the command stays applied
        // in RAM and the next save retries
        let _ = store.save();
    }

    for ack in disposition.acks.iter().flatten() {
        let _ = can.transmit(ack, ACK_TX_TIMEOUT_MS);
    }

    if disposition.reboot_to_bootloader {
        system.delay_ms(REBOOT_FLUSH_DELAY_MS);
        system.reset_to_bootloader();
    }

    true
}
