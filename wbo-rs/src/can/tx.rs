//! Broadcast scheduler.
//!
//! AFR frames go out every cycle, EGT frames on every fifth. Cycles are
//! phase-locked to an absolute deadline so jitter in the caller never
//! accumulates into drift; the target thread sleeps until
//! `next_deadline_ms` and polls again.

use shared::wbo_hal::{CanProtocol, CanTransport};

use super::{
    aemnet, ecumaster, emtron, haltech, internal, linkecu, motec, AfrFrameInputs, EgtFrameInputs,
    TxFrames,
};
use crate::config::Configuration;
use crate::{AFR_CHANNELS, EGT_CHANNELS};

pub const WBO_TX_PERIOD_MS: u64 = 10;

const EGT_CYCLE_DIVIDER: u32 = 5;

/// Mailbox submission timeout; on expiry the frame is dropped and the
/// next cycle tries again.
const TX_TIMEOUT_MS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxTick {
    pub cycle: u32,
    pub egt_due: bool,
}

pub struct TxScheduler {
    next_deadline_ms: u64,
    cycle: u32,
}

impl TxScheduler {
    pub fn new(now_ms: u64) -> Self {
        Self {
            next_deadline_ms: now_ms,
            cycle: 0,
        }
    }

    /// Fires at most one tick per call; late callers catch up on
    /// subsequent calls instead of stretching the schedule.
    pub fn poll(&mut self, now_ms: u64) -> Option<TxTick> {
        if now_ms < self.next_deadline_ms {
            return None;
        }

        let tick = TxTick {
            cycle: self.cycle,
            egt_due: self.cycle % EGT_CYCLE_DIVIDER == 0,
        };

        self.cycle = self.cycle.wrapping_add(1);
        self.next_deadline_ms += WBO_TX_PERIOD_MS;

        Some(tick)
    }

    pub fn next_deadline_ms(&self) -> u64 {
        self.next_deadline_ms
    }
}

fn transmit_all(frames: TxFrames, can: &mut dyn CanTransport) {
    for frame in frames.iter().flatten() {
        // Mailbox full: drop silently, no retry, no buffering
        let _ = can.transmit(frame, TX_TIMEOUT_MS);
    }
}

/// Internal-protocol frames go out per channel flags, then exactly one
/// extra protocol keyed by the channel configuration.
pub fn send_afr_channel(
    config: &Configuration,
    ch: usize,
    inputs: &[AfrFrameInputs],
    can: &mut dyn CanTransport,
) {
    transmit_all(internal::encode_afr(config, ch, inputs), can);

    let frames = match config.afr[ch].extra_protocol {
        CanProtocol::None => return,
        CanProtocol::AemNet => aemnet::encode_afr(config, ch, inputs),
        CanProtocol::EcuMasterClassic | CanProtocol::EcuMasterBlack => {
            ecumaster::encode_afr(config, ch, inputs)
        }
        CanProtocol::Haltech => haltech::encode_afr(config, ch, inputs),
        CanProtocol::LinkEcu => linkecu::encode_afr(config, ch, inputs),
        CanProtocol::Emtron => emtron::encode_afr(config, ch, inputs),
        CanProtocol::Motec => motec::encode_afr(config, ch, inputs),
    };

    transmit_all(frames, can);
}

/// The internal protocol defines no EGT frames; EGT broadcast is purely
/// per the channel's extra protocol.
pub fn send_egt_channel(
    config: &Configuration,
    ch: usize,
    inputs: &EgtFrameInputs,
    can: &mut dyn CanTransport,
) {
    let frames = match config.egt[ch].extra_protocol {
        CanProtocol::None => return,
        CanProtocol::AemNet => aemnet::encode_egt(config, ch, inputs),
        CanProtocol::EcuMasterClassic | CanProtocol::EcuMasterBlack => {
            ecumaster::encode_egt(config, ch, inputs)
        }
        CanProtocol::Haltech => haltech::encode_egt(config, ch, inputs),
        CanProtocol::LinkEcu => linkecu::encode_egt(config, ch, inputs),
        CanProtocol::Emtron => emtron::encode_egt(config, ch, inputs),
        CanProtocol::Motec => motec::encode_egt(config, ch, inputs),
    };

    transmit_all(frames, can);
}

/// One scheduler tick: all AFR channels, plus all EGT channels when due.
pub fn run_tx_cycle(
    tick: TxTick,
    config: &Configuration,
    afr_inputs: &[AfrFrameInputs],
    egt_inputs: &EgtFrameInputs,
    can: &mut dyn CanTransport,
) {
    for ch in 0..AFR_CHANNELS {
        send_afr_channel(config, ch, afr_inputs, can);
    }

    if tick.egt_due {
        for ch in 0..EGT_CHANNELS {
            send_egt_channel(config, ch, egt_inputs, can);
        }
    }
}
